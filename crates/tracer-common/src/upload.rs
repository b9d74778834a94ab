use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Body of `GET {resource}/get-upload-url`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadTicketResponse {
    #[serde(rename = "uploadUrl", alias = "upload_url")]
    pub upload_url: String,

    #[serde(
        default,
        rename = "expiresOn",
        alias = "expiry",
        alias = "expiresAt",
        alias = "expires_at"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Short-lived, single-use authorization for one direct-to-storage upload.
///
/// Deliberately not `Clone`: the transfer consumes it.
pub struct UploadTicket {
    upload_url: String,
    expires_at: DateTime<Utc>,
}

impl UploadTicket {
    /// When the server omits an expiry the ticket is assumed to live for
    /// `fallback_ttl` from `issued_at`.
    pub fn from_response(
        resp: UploadTicketResponse,
        issued_at: DateTime<Utc>,
        fallback_ttl: Duration,
    ) -> Self {
        Self {
            expires_at: resp.expires_at.unwrap_or(issued_at + fallback_ttl),
            upload_url: resp.upload_url,
        }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The URL without its query string; signed URLs carry the credential
    /// in the query.
    pub fn redacted_url(&self) -> &str {
        self.upload_url
            .split_once('?')
            .map_or(self.upload_url.as_str(), |(base, _)| base)
    }
}

impl fmt::Debug for UploadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadTicket")
            .field("upload_url", &self.redacted_url())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub file_name: String,
    pub bytes: u64,
    pub status: u16,
}
