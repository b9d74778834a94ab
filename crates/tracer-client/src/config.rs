use std::time::Duration;

use reqwest::Client;

use crate::error::ClientError;

pub const DEFAULT_SUBMIT_PATH: &str = "/api/calculate";
pub const DEFAULT_JOBS_PATH: &str = "/api/jobs";
/// Job list refresh period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Assumed ticket lifetime when the backend does not state one.
pub const DEFAULT_UPLOAD_TICKET_TTL: Duration = Duration::from_secs(5 * 60);
/// Tokens this close to expiry are refreshed before use.
pub const DEFAULT_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub submit_path: String,
    pub jobs_path: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub upload_ticket_ttl: Duration,
    /// The calculation page requires a scenario; the older runner form
    /// submits products only.
    pub require_scenario: bool,
    pub token_refresh_margin: Duration,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
            jobs_path: DEFAULT_JOBS_PATH.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_ticket_ttl: DEFAULT_UPLOAD_TICKET_TTL,
            require_scenario: true,
            token_refresh_margin: DEFAULT_TOKEN_REFRESH_MARGIN,
        }
    }

    /// One client per process; both the authenticated path and the direct
    /// storage upload share its connection pool.
    pub fn http_client(&self) -> Result<Client, ClientError> {
        Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(ClientError::Network)
    }

    pub fn upload_ticket_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.upload_ticket_ttl).unwrap_or(chrono::Duration::minutes(5))
    }
}
