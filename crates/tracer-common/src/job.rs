use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::wire::{lenient_timestamp, string_or_number};

/// Opaque, server-issued job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        string_or_number(d).map(JobId)
    }
}

// ── JobStatus ────────────────────────────────────────────────────────

/// Observed lifecycle state of a job.
///
/// `Pending` covers both the backend's own "Pending" value and any status
/// that is missing, null, empty or unrecognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn from_wire(raw: Option<&str>) -> Self {
        let normalized = raw.map(|s| s.trim().to_ascii_lowercase());
        match normalized.as_deref() {
            Some("queued") => JobStatus::Queued,
            Some("running") => JobStatus::Running,
            Some("complete") | Some("completed") => JobStatus::Complete,
            Some("failed") => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Terminal states never revert; everything else may move freely.
    pub fn allows_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() || self == next
    }

    pub fn display_class(self) -> &'static str {
        match self {
            JobStatus::Pending => "status-pending",
            JobStatus::Queued => "status-queued",
            JobStatus::Running => "status-running",
            JobStatus::Complete => "status-complete",
            JobStatus::Failed => "status-failed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending...",
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Complete => "Complete",
            JobStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(JobStatus::from_wire(raw.as_ref().and_then(Value::as_str)))
    }
}

// ── Job ──────────────────────────────────────────────────────────────

/// A server-tracked calculation job as listed by `GET /api/jobs`.
///
/// The canonical wire schema is `JobID / ProductCode / Status /
/// RequestedTimestamp`; the older `Product_Code / Job_Status /
/// Requested_Timestamp` spellings are accepted when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "JobID", alias = "job_id")]
    pub id: JobId,

    #[serde(
        rename = "ProductCode",
        alias = "Product_Code",
        default,
        deserialize_with = "product_codes"
    )]
    pub product_codes: Vec<String>,

    #[serde(rename = "Status", alias = "Job_Status", default)]
    pub status: JobStatus,

    #[serde(
        rename = "RequestedTimestamp",
        alias = "Requested_Timestamp",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub requested_at: Option<DateTime<Utc>>,

    #[serde(
        rename = "ResultReference",
        alias = "Result_Reference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub result_reference: Option<String>,
}

impl Job {
    pub fn report_available(&self) -> bool {
        self.status == JobStatus::Complete
    }

    /// Only meaningful once the job is complete.
    pub fn result_reference(&self) -> Option<&str> {
        if self.report_available() {
            self.result_reference.as_deref()
        } else {
            None
        }
    }
}

/// `ProductCode` shows up as a plain string, a JSON array, or a JSON array
/// that was stored as text.
fn product_codes<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let codes = match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<String>>(trimmed)
                    .unwrap_or_else(|_| vec![trimmed.to_string()])
            } else if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(codes)
}
