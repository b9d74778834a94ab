use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde::Serialize;

use crate::error::ClientError;
use crate::request::{expect_success, ApiClient, RequestOptions};
use crate::upload::UploadSource;

const CSV_ENDPOINT: &str = "/ingest/policies/csv";
const URL_ENDPOINT: &str = "/ingest/policies/json";
const SCENARIO_ENDPOINT: &str = "/api/ingest/scenarios";

/// Interest-rate granularity of an economic scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateType {
    #[default]
    Monthly,
    Yearly,
}

impl RateType {
    pub fn as_str(self) -> &'static str {
        match self {
            RateType::Monthly => "monthly",
            RateType::Yearly => "yearly",
        }
    }

    fn endpoint(self) -> String {
        format!("{SCENARIO_ENDPOINT}/{}", self.as_str())
    }
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(RateType::Monthly),
            "yearly" => Ok(RateType::Yearly),
            other => Err(format!("unknown rate type '{other}', expected monthly or yearly")),
        }
    }
}

#[derive(Serialize)]
struct UrlSource<'a> {
    source_url: &'a str,
}

/// Synchronous policy and scenario ingestion through the API itself, as
/// opposed to the two-phase storage upload.
#[derive(Debug, Clone)]
pub struct Ingestion {
    api: ApiClient,
}

impl Ingestion {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Posts the file as `text/csv` and returns the server's confirmation.
    pub async fn ingest_csv(&self, source: &dyn UploadSource) -> Result<String, ClientError> {
        let bytes = source.read_bytes().await?;
        let opts = RequestOptions::new().bytes("text/csv", bytes);
        self.send(CSV_ENDPOINT, opts).await
    }

    /// Asks the server to pull a JSON policy file from `url`.
    pub async fn ingest_from_url(&self, url: &str) -> Result<String, ClientError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ClientError::Validation("a source URL is required".into()));
        }
        let opts = RequestOptions::new().json(&UrlSource { source_url: url })?;
        self.send(URL_ENDPOINT, opts).await
    }

    /// Posts a scenario file as the `file` part of a multipart form.
    pub async fn ingest_scenarios_file(
        &self,
        source: &dyn UploadSource,
        rate: RateType,
    ) -> Result<String, ClientError> {
        let bytes = source.read_bytes().await?;
        let opts =
            RequestOptions::new().multipart_file("file", source.file_name(), source.content_type(), bytes);
        self.send(&rate.endpoint(), opts).await
    }

    /// Asks the server to pull scenario data from `url`.
    pub async fn ingest_scenarios_from_url(&self, url: &str, rate: RateType) -> Result<String, ClientError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ClientError::Validation("a source URL is required".into()));
        }
        let opts = RequestOptions::new().json(&UrlSource { source_url: url })?;
        self.send(&rate.endpoint(), opts).await
    }

    async fn send(&self, endpoint: &str, opts: RequestOptions) -> Result<String, ClientError> {
        let resp = self.api.request(Method::POST, endpoint, opts).await?;
        let resp = expect_success(resp).await?;
        let message = resp.text().await.map_err(ClientError::Network)?;
        tracing::info!(endpoint, "ingestion accepted");
        Ok(message)
    }
}
