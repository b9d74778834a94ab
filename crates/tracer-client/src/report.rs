use tracer_common::{EmbedTicket, JobId, JobResults, ReportBundle};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::request::{path_segment, ApiClient, RequestOptions};

/// Loads the two halves of a finished job's report side by side.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    api: ApiClient,
    jobs_path: String,
}

impl ReportAssembler {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            jobs_path: config.jobs_path.trim_end_matches('/').to_string(),
        }
    }

    /// All or nothing: if either fetch fails the whole report fails.
    pub async fn assemble(&self, job_id: &JobId) -> Result<ReportBundle, ClientError> {
        let id = path_segment(job_id.as_str()).map_err(|e| ClientError::Report(Box::new(e)))?;
        let results_endpoint = format!("{}/{id}/results", self.jobs_path);
        let embed_endpoint = format!("{}/{id}/embed-token", self.jobs_path);

        let joined = tokio::try_join!(
            self.api
                .get_json::<JobResults>(&results_endpoint, RequestOptions::new()),
            self.api
                .get_json::<EmbedTicket>(&embed_endpoint, RequestOptions::new()),
        );

        match joined {
            Ok((results, embed)) => Ok(ReportBundle::new(job_id.clone(), results, embed)),
            Err(err) => {
                tracing::warn!(job_id=%job_id, error=%err, "report assembly failed");
                Err(ClientError::Report(Box::new(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use tokio::sync::Barrier;
    use tracer_common::JobConfig;

    use super::*;
    use crate::submit::JobSubmitter;
    use crate::testing::api_for;

    fn embed_json() -> serde_json::Value {
        serde_json::json!({
            "embedToken": "embed-secret",
            "embedUrl": "https://reports.example.com/embed?r=1",
            "reportId": "r-1"
        })
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        // Each handler waits for the other; sequential fetches would hang.
        let barrier = Arc::new(Barrier::new(2));
        let app = Router::new()
            .route(
                "/api/jobs/:id/results",
                get(|State(b): State<Arc<Barrier>>| async move {
                    b.wait().await;
                    Json(serde_json::json!({"results": {"reserve": 1250.5}, "summary": "Reserves up 3%"}))
                }),
            )
            .route(
                "/api/jobs/:id/embed-token",
                get(|State(b): State<Arc<Barrier>>| async move {
                    b.wait().await;
                    Json(embed_json())
                }),
            )
            .with_state(barrier);
        let api = api_for(app).await;
        let assembler = ReportAssembler::new(api.clone(), &ClientConfig::new(api.base_url().to_string()));

        let bundle = tokio::time::timeout(Duration::from_secs(5), assembler.assemble(&JobId::new("17")))
            .await
            .expect("fetches were serialized")
            .unwrap();
        assert_eq!(bundle.job_id.as_str(), "17");
        assert_eq!(bundle.summary, "Reserves up 3%");
        assert_eq!(bundle.results["reserve"], 1250.5);
        assert_eq!(bundle.embed.token, "embed-secret");
        assert_eq!(bundle.embed.report_id.as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn test_embed_failure_fails_whole_report() {
        let app = Router::new()
            .route(
                "/api/jobs/:id/results",
                get(|| async { Json(serde_json::json!({"results": [], "summary": "ok"})) }),
            )
            .route(
                "/api/jobs/:id/embed-token",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "embed service down") }),
            );
        let api = api_for(app).await;
        let assembler = ReportAssembler::new(api.clone(), &ClientConfig::new(api.base_url().to_string()));

        let err = assembler.assemble(&JobId::new("17")).await.unwrap_err();
        assert!(matches!(err, ClientError::Report(_)));
        assert!(err.to_string().starts_with("failed to load full report"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_submitted_config_round_trips_through_results() {
        type Stored = Arc<Mutex<Option<JobConfig>>>;
        let stored: Stored = Arc::default();
        let app = Router::new()
            .route(
                "/api/calculate",
                post(|State(s): State<Stored>, Json(cfg): Json<JobConfig>| async move {
                    *s.lock().unwrap() = Some(cfg);
                    (StatusCode::ACCEPTED, Json(serde_json::json!({"job_id": "abc"})))
                }),
            )
            .route(
                "/api/jobs/:id/results",
                get(|State(s): State<Stored>| async move {
                    let cfg = s.lock().unwrap().clone();
                    Json(serde_json::json!({"results": {}, "summary": "", "config": cfg}))
                }),
            )
            .route("/api/jobs/:id/embed-token", get(|| async { Json(embed_json()) }))
            .with_state(stored);
        let api = api_for(app).await;
        let cfg = ClientConfig::new(api.base_url().to_string());

        let config = JobConfig::builder()
            .products(["TERM10", "UL"])
            .scenario("base")
            .assumptions("double the base lapse rate if treasury > 5%")
            .stochastic(true)
            .attribution(false)
            .build();
        let id = JobSubmitter::new(api.clone(), &cfg).submit(&config).await.unwrap();
        let bundle = ReportAssembler::new(api, &cfg).assemble(&id).await.unwrap();

        let echoed = bundle.config.unwrap();
        assert_eq!(echoed.product_codes, vec!["TERM10", "UL"]);
        assert!(echoed.calculate_stochastic);
        assert!(!echoed.perform_attribution);
        assert_eq!(echoed, config);
    }

    #[tokio::test]
    async fn test_bad_job_id_is_rejected_locally() {
        let api = api_for(Router::new()).await;
        let assembler = ReportAssembler::new(api.clone(), &ClientConfig::new(api.base_url().to_string()));
        let err = assembler.assemble(&JobId::new("../etc")).await.unwrap_err();
        assert!(matches!(err, ClientError::Report(inner) if matches!(*inner, ClientError::Validation(_))));
    }
}
