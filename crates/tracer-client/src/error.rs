use reqwest::{Response, StatusCode};
use tracer_common::JobConfigError;

/// Failures on the credential side. None of these are retryable without the
/// user signing in again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no active account, please sign in")]
    NoActiveAccount,
    #[error("session expired, please sign in again")]
    Expired,
    #[error("interactive sign-in required: {0}")]
    InteractionRequired(String),
    #[error("token acquisition failed: {0}")]
    Acquisition(String),
}

/// Which half of the two-phase upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Ticket,
    Transfer,
}

impl UploadPhase {
    fn failure_message(self) -> &'static str {
        match self {
            UploadPhase::Ticket => "could not obtain a secure upload URL",
            UploadPhase::Transfer => "file upload failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No response reached the client.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// A client-side precondition failed; nothing was sent.
    #[error("{0}")]
    Validation(String),

    /// 4xx; the body is the server's explanation, shown verbatim.
    #[error("{message}")]
    ServerValidation { status: u16, message: String },

    #[error("server error ({status}){}", body_suffix(.body))]
    ServerFault { status: u16, body: String },

    /// A non-error status that is still not what the endpoint promises,
    /// e.g. 200 where only 202 Accepted means "queued". The body is shown
    /// verbatim; `status` tells it apart from a rejection.
    #[error("{message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    /// The upload ticket lapsed before the transfer; start over from the
    /// ticket request.
    #[error("upload URL expired, request a new one and retry")]
    UploadExpired,

    #[error("{}: {source}", .phase.failure_message())]
    Upload {
        phase: UploadPhase,
        #[source]
        source: Box<ClientError>,
    },

    #[error("failed to load full report: {0}")]
    Report(#[source] Box<ClientError>),
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl ClientError {
    /// Classifies a response that did not carry the endpoint's success code.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let code = status.as_u16();
        if status.is_server_error() {
            return ClientError::ServerFault { status: code, body };
        }
        let message = if body.trim().is_empty() {
            format!("Server responded with status {code}")
        } else {
            body
        };
        if status.is_client_error() {
            ClientError::ServerValidation { status: code, message }
        } else {
            ClientError::UnexpectedStatus { status: code, message }
        }
    }

    /// Drains the body (plain text by convention) and classifies the status.
    pub async fn from_response(resp: Response) -> Self {
        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(status = status.as_u16(), error=%e, "could not read error body");
                String::new()
            }
        };
        Self::from_status(status, body)
    }

    /// Tags the error with the upload phase it happened in. An expired
    /// ticket keeps its own kind so callers can tell it apart.
    pub fn in_phase(self, phase: UploadPhase) -> Self {
        match self {
            ClientError::UploadExpired | ClientError::Upload { .. } => self,
            other => ClientError::Upload {
                phase,
                source: Box::new(other),
            },
        }
    }

    pub fn upload_phase(&self) -> Option<UploadPhase> {
        match self {
            ClientError::Upload { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Whether retrying the same operation (without signing in again) can
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) | ClientError::ServerFault { .. } | ClientError::UploadExpired => true,
            ClientError::Upload { source, .. } | ClientError::Report(source) => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<JobConfigError> for ClientError {
    fn from(err: JobConfigError) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err)
        }
    }
}
