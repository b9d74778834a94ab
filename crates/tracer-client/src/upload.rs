use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tracer_common::{UploadReceipt, UploadTicket, UploadTicketResponse};

use crate::error::{ClientError, UploadPhase};
use crate::request::{expect_success, read_json, ApiClient, RequestOptions};

/// What the upload path needs from a file, and nothing else.
#[async_trait]
pub trait UploadSource: Send + Sync {
    fn file_name(&self) -> &str;
    fn content_type(&self) -> &str;
    async fn read_bytes(&self) -> Result<Bytes, ClientError>;
}

pub struct LocalFile {
    path: PathBuf,
    file_name: String,
    content_type: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Validation(format!("{} is not a file path", path.display())))?;
        let content_type = content_type_for(&path).to_string();
        Ok(Self {
            path,
            file_name,
            content_type,
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

#[async_trait]
impl UploadSource for LocalFile {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn read_bytes(&self) -> Result<Bytes, ClientError> {
        tokio::fs::read(&self.path)
            .await
            .map(Bytes::from)
            .map_err(|e| ClientError::Validation(format!("cannot read {}: {e}", self.path.display())))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl InMemoryFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl UploadSource for InMemoryFile {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn read_bytes(&self) -> Result<Bytes, ClientError> {
        Ok(self.bytes.clone())
    }
}

/// Backend resource that issues upload tickets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResource {
    PolicySets,
    ScenarioSets,
    Custom(String),
}

impl UploadResource {
    pub fn ticket_endpoint(&self) -> String {
        match self {
            UploadResource::PolicySets => "/api/policy-sets/get-upload-url".to_string(),
            UploadResource::ScenarioSets => "/api/scenario-sets/get-upload-url".to_string(),
            UploadResource::Custom(path) => path.clone(),
        }
    }
}

impl FromStr for UploadResource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policy-sets" | "policies" => Ok(UploadResource::PolicySets),
            "scenario-sets" | "scenarios" => Ok(UploadResource::ScenarioSets),
            other if other.starts_with('/') => Ok(UploadResource::Custom(other.to_string())),
            other => Err(format!(
                "unknown upload target '{other}', expected policy-sets, scenario-sets or an /api path"
            )),
        }
    }
}

/// Two-phase upload: a ticket from the API, then a direct PUT to storage.
#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    api: ApiClient,
    ticket_ttl: chrono::Duration,
}

impl UploadCoordinator {
    pub fn new(api: ApiClient, ticket_ttl: chrono::Duration) -> Self {
        Self { api, ticket_ttl }
    }

    pub async fn upload(
        &self,
        source: &dyn UploadSource,
        resource: &UploadResource,
    ) -> Result<UploadReceipt, ClientError> {
        let file_name = source.file_name().trim().to_string();
        if file_name.is_empty() {
            return Err(ClientError::Validation("a file name is required".into()));
        }
        // Read first so a missing file never costs a ticket.
        let bytes = source.read_bytes().await?;

        let ticket = self
            .request_ticket(resource, &file_name)
            .await
            .map_err(|e| e.in_phase(UploadPhase::Ticket))?;
        tracing::debug!(file=%file_name, url=%ticket.redacted_url(), expires_at=%ticket.expires_at(), "upload ticket issued");

        self.transfer(ticket, &file_name, source.content_type(), bytes)
            .await
            .map_err(|e| e.in_phase(UploadPhase::Transfer))
    }

    pub async fn request_ticket(
        &self,
        resource: &UploadResource,
        file_name: &str,
    ) -> Result<UploadTicket, ClientError> {
        let issued_at = Utc::now();
        let resp = self
            .api
            .request(
                Method::GET,
                &resource.ticket_endpoint(),
                RequestOptions::new().query("fileName", file_name),
            )
            .await?;
        let body: UploadTicketResponse = read_json(expect_success(resp).await?).await?;
        if body.upload_url.trim().is_empty() {
            return Err(ClientError::Decode("ticket response has an empty uploadUrl".into()));
        }
        Ok(UploadTicket::from_response(body, issued_at, self.ticket_ttl))
    }

    /// Consumes the ticket. The request goes out on the bare HTTP client:
    /// storage authorizes by the signed URL, never the session token.
    pub async fn transfer(
        &self,
        ticket: UploadTicket,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<UploadReceipt, ClientError> {
        if ticket.is_expired_at(Utc::now()) {
            tracing::warn!(file=%file_name, url=%ticket.redacted_url(), "upload ticket expired before transfer");
            return Err(ClientError::UploadExpired);
        }

        let len = bytes.len() as u64;
        let resp = self
            .api
            .unauthenticated()
            .put(ticket.upload_url())
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(ClientError::Network)?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            tracing::warn!(file=%file_name, url=%ticket.redacted_url(), "storage rejected upload ticket");
            return Err(ClientError::UploadExpired);
        }
        let resp = expect_success(resp).await?;
        tracing::info!(file=%file_name, bytes=len, status=resp.status().as_u16(), "upload complete");

        Ok(UploadReceipt {
            file_name: file_name.to_string(),
            bytes: len,
            status: status.as_u16(),
        })
    }
}
