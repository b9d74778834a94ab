pub mod catalog;
pub mod job;
pub mod job_config;
pub mod policy;
pub mod report;
pub mod telemetry;
pub mod upload;
mod wire;

pub use catalog::{CatalogEntry, PolicySetSummary};
pub use job::{Job, JobId, JobStatus};
pub use job_config::{JobConfig, JobConfigBuilder, JobConfigError};
pub use policy::{columns_for, ColumnDef, PolicyRow};
pub use report::{EmbedTicket, JobResults, ReportBundle};
pub use upload::{UploadReceipt, UploadTicket, UploadTicketResponse};
