use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracer_common::{JobConfig, JobId};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::request::{ApiClient, RequestOptions};

#[derive(Debug, Deserialize)]
struct Accepted {
    job_id: JobId,
}

/// Queues calculation jobs. Only `202 Accepted` means the job was queued.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    api: ApiClient,
    submit_path: String,
    require_scenario: bool,
}

impl JobSubmitter {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            submit_path: config.submit_path.clone(),
            require_scenario: config.require_scenario,
        }
    }

    pub async fn submit(&self, config: &JobConfig) -> Result<JobId, ClientError> {
        config.validate(self.require_scenario)?;

        let resp = self
            .api
            .request(Method::POST, &self.submit_path, RequestOptions::new().json(config)?)
            .await?;

        let status = resp.status();
        if status != StatusCode::ACCEPTED {
            let err = ClientError::from_response(resp).await;
            tracing::warn!(status = status.as_u16(), error=%err, "calculation request not accepted");
            return Err(err);
        }

        let body = resp.text().await.map_err(ClientError::Network)?;
        let accepted: Accepted = serde_json::from_str(&body)
            .map_err(|e| ClientError::Decode(format!("submit response: {e}")))?;
        tracing::info!(job_id=%accepted.job_id, products=?config.product_codes, "calculation queued");
        Ok(accepted.job_id)
    }
}
