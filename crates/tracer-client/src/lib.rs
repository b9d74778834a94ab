pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod policy_grid;
pub mod poller;
pub mod report;
pub mod request;
pub mod submit;
pub mod token;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::Catalog;
pub use config::ClientConfig;
pub use error::{AuthError, ClientError, UploadPhase};
pub use identity::{RefreshTokenIdentity, StaticIdentity};
pub use ingest::{Ingestion, RateType};
pub use policy_grid::{PolicyCommand, PolicyGrid};
pub use poller::{JobPoller, JobSource, JobsApi, PollHandle, PollScope, PollSnapshot, PollState};
pub use report::ReportAssembler;
pub use request::{ApiClient, RequestBody, RequestOptions};
pub use submit::JobSubmitter;
pub use token::{Account, IdentityProvider, Session, TokenGrant, TokenProvider, TokenSource};
pub use upload::{InMemoryFile, LocalFile, UploadCoordinator, UploadResource, UploadSource};
