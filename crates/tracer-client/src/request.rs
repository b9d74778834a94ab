use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AuthError, ClientError};
use crate::token::{Session, TokenSource};

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Bytes { content_type: String, bytes: Bytes },
    Text { content_type: String, text: String },
    /// A single file part of a `multipart/form-data` body.
    Multipart {
        field: String,
        file_name: String,
        content_type: String,
        bytes: Bytes,
    },
}

/// Caller-side request options. Headers are passed through untouched except
/// for `Authorization`, which is always set from the current session.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::Validation(format!("could not encode request body: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    pub fn bytes(mut self, content_type: impl Into<String>, bytes: Bytes) -> Self {
        self.body = Some(RequestBody::Bytes {
            content_type: content_type.into(),
            bytes,
        });
        self
    }

    pub fn multipart_file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Bytes,
    ) -> Self {
        self.body = Some(RequestBody::Multipart {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        });
        self
    }

    pub fn text(mut self, content_type: impl Into<String>, text: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text {
            content_type: content_type.into(),
            text: text.into(),
        });
        self
    }
}

/// Adds the session's bearer credential to a caller's header set. This is
/// the only place a token is attached to an outbound request.
pub fn authorize(mut headers: HeaderMap, session: &Session) -> Result<HeaderMap, AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", session.access_token()))
        .map_err(|_| AuthError::Acquisition("access token is not a valid header value".into()))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// HTTP client for the calculation API. Every request goes out with a
/// freshly acquired bearer token; status interpretation is left to callers
/// because endpoints disagree on what success looks like.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    pub fn new(http: Client, base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying client, without credentials. Used for the direct
    /// storage upload, which must never carry the session token.
    pub fn unauthenticated(&self) -> &Client {
        &self.http
    }

    pub async fn session(&self) -> Result<Session, ClientError> {
        Ok(self.tokens.acquire_token().await?)
    }

    /// Resolves an API-relative endpoint. Absolute URLs are refused so the
    /// bearer token can only ever reach the configured host.
    pub fn url(&self, endpoint: &str) -> Result<String, ClientError> {
        if endpoint.contains("://") {
            return Err(ClientError::Validation(format!(
                "authenticated requests take an API-relative path, got '{endpoint}'"
            )));
        }
        Ok(format!("{}/{}", self.base_url, endpoint.trim_start_matches('/')))
    }

    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let url = self.url(endpoint)?;
        // No token, no request.
        let session = self.tokens.acquire_token().await?;
        let mut headers = authorize(options.headers, &session)?;

        let mut form = None;
        let body = match options.body {
            Some(RequestBody::Json(value)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(Bytes::from(serde_json::to_vec(&value).map_err(|e| {
                    ClientError::Validation(format!("could not encode request body: {e}"))
                })?))
            }
            Some(RequestBody::Bytes { content_type, bytes }) => {
                set_content_type(&mut headers, &content_type)?;
                Some(bytes)
            }
            Some(RequestBody::Text { content_type, text }) => {
                set_content_type(&mut headers, &content_type)?;
                Some(Bytes::from(text))
            }
            Some(RequestBody::Multipart {
                field,
                file_name,
                content_type,
                bytes,
            }) => {
                // The boundary belongs in the content type, so reqwest sets it.
                headers.remove(CONTENT_TYPE);
                let part = Part::bytes(bytes.to_vec())
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|_| ClientError::Validation(format!("invalid content type '{content_type}'")))?;
                form = Some(Form::new().part(field, part));
                None
            }
            None => None,
        };

        let mut builder = self.http.request(method.clone(), &url).headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(form) = form {
            builder = builder.multipart(form);
        }

        let resp = builder.send().await.map_err(ClientError::Network)?;
        tracing::debug!(%method, endpoint, status = resp.status().as_u16(), "api response");
        Ok(resp)
    }

    /// GET an endpoint and decode a 2xx JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, endpoint, options).await?;
        read_json(expect_success(resp).await?).await
    }
}

fn set_content_type(headers: &mut HeaderMap, content_type: &str) -> Result<(), ClientError> {
    if headers.contains_key(CONTENT_TYPE) {
        return Ok(());
    }
    let value = HeaderValue::from_str(content_type)
        .map_err(|_| ClientError::Validation(format!("invalid content type '{content_type}'")))?;
    headers.insert(CONTENT_TYPE, value);
    Ok(())
}

/// Passes 2xx responses through; anything else becomes the classified
/// error with the server's body as the message.
pub async fn expect_success(resp: Response) -> Result<Response, ClientError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(ClientError::from_response(resp).await)
    }
}

pub async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let bytes = resp.bytes().await.map_err(ClientError::Network)?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Checks that an opaque id can be spliced into a path as one segment.
pub fn path_segment(id: &str) -> Result<&str, ClientError> {
    if id.is_empty() || id.contains(['/', '?', '#', '%']) || id == "." || id == ".." {
        return Err(ClientError::Validation(format!("'{id}' is not a valid identifier")));
    }
    Ok(id)
}
