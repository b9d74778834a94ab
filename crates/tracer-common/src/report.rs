use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{JobConfig, JobId};

/// Body of `GET /api/jobs/{id}/results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    /// Numerical output; shape is owned by the calculation engine.
    #[serde(default)]
    pub results: Value,

    /// Narrative summary generated alongside the numbers.
    #[serde(default)]
    pub summary: String,

    /// The configuration the job ran with, echoed back by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<JobConfig>,
}

/// Credential for rendering the hosted visualization of one report.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTicket {
    #[serde(alias = "embedToken")]
    pub token: String,

    pub embed_url: String,

    #[serde(default)]
    pub report_id: Option<String>,

    #[serde(default, alias = "expiration", alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for EmbedTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedTicket")
            .field("token", &"<redacted>")
            .field("embed_url", &self.embed_url)
            .field("report_id", &self.report_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Everything the report view needs, assembled from the results and the
/// embed ticket fetched side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportBundle {
    pub job_id: JobId,
    pub results: Value,
    pub summary: String,
    pub config: Option<JobConfig>,
    pub embed: EmbedTicket,
}

impl ReportBundle {
    pub fn new(job_id: JobId, results: JobResults, embed: EmbedTicket) -> Self {
        Self {
            job_id,
            results: results.results,
            summary: results.summary,
            config: results.config,
            embed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_ticket_aliases() {
        let t: EmbedTicket = serde_json::from_str(
            r#"{"embedToken": "tok", "embedUrl": "https://bi/x", "reportId": "r1", "expiration": "2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(t.token, "tok");
        assert_eq!(t.report_id.as_deref(), Some("r1"));
        assert!(t.expires_at.is_some());
        assert!(!format!("{t:?}").contains("\"tok\""));
    }

    #[test]
    fn test_results_defaults() {
        let r: JobResults = serde_json::from_str("{}").unwrap();
        assert_eq!(r.results, Value::Null);
        assert!(r.summary.is_empty());
        assert!(r.config.is_none());
    }
}
