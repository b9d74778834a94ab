use reqwest::Method;
use tracer_common::{columns_for, ColumnDef, PolicyRow};

use crate::error::ClientError;
use crate::request::{expect_success, path_segment, ApiClient, RequestOptions};

/// An edit the user asked for. Nothing changes locally until the server
/// acknowledges it.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyCommand {
    Update(PolicyRow),
    Delete(String),
}

/// Server-confirmed view of one policy set's rows.
#[derive(Debug, Clone)]
pub struct PolicyGrid {
    api: ApiClient,
    set_id: String,
    rows: Vec<PolicyRow>,
}

impl PolicyGrid {
    pub async fn load(api: ApiClient, set_id: impl Into<String>) -> Result<Self, ClientError> {
        let set_id = set_id.into();
        let rows: Vec<PolicyRow> = api
            .get_json("/api/policies", RequestOptions::new().query("setId", &set_id))
            .await?;
        tracing::debug!(set_id=%set_id, rows=rows.len(), "policy grid loaded");
        Ok(Self { api, set_id, rows })
    }

    pub fn set_id(&self) -> &str {
        &self.set_id
    }

    pub fn rows(&self) -> &[PolicyRow] {
        &self.rows
    }

    pub fn columns(&self) -> Vec<ColumnDef> {
        columns_for(&self.rows)
    }

    pub fn row(&self, id: &str) -> Option<&PolicyRow> {
        self.rows.iter().find(|r| r.id().as_deref() == Some(id))
    }

    /// Sends the command and, only on a 2xx, applies it to the local rows.
    pub async fn apply(&mut self, command: PolicyCommand) -> Result<(), ClientError> {
        match command {
            PolicyCommand::Update(row) => {
                let id = row
                    .id()
                    .ok_or_else(|| ClientError::Validation("policy row has no id".into()))?;
                let idx = self.position(&id)?;
                let resp = self
                    .api
                    .request(Method::POST, "/api/policies/update", RequestOptions::new().json(&row)?)
                    .await?;
                expect_success(resp).await?;
                self.rows[idx] = row;
                tracing::info!(policy_id=%id, "policy updated");
            }
            PolicyCommand::Delete(id) => {
                let idx = self.position(&id)?;
                let endpoint = format!("/api/policies/{}", path_segment(&id)?);
                let resp = self
                    .api
                    .request(Method::DELETE, &endpoint, RequestOptions::new())
                    .await?;
                expect_success(resp).await?;
                self.rows.remove(idx);
                tracing::info!(policy_id=%id, "policy deleted");
            }
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, ClientError> {
        self.rows
            .iter()
            .position(|r| r.id().as_deref() == Some(id))
            .ok_or_else(|| ClientError::Validation(format!("no policy with id '{id}' in this set")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::testing::api_for;

    async fn grid() -> (PolicyGrid, Arc<AtomicUsize>) {
        let writes = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/policies",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("setId").map(String::as_str), Some("set-9"));
                    Json(json!([
                        {"id": 1, "product": "TERM10", "premium": 100},
                        {"id": 2, "product": "UL", "premium": 250}
                    ]))
                }),
            )
            .route(
                "/api/policies/update",
                post(|State(w): State<Arc<AtomicUsize>>, Json(row): Json<Value>| async move {
                    w.fetch_add(1, Ordering::SeqCst);
                    if row["premium"].as_i64().unwrap_or(0) < 0 {
                        (StatusCode::BAD_REQUEST, "premium must be positive")
                    } else {
                        (StatusCode::OK, "ok")
                    }
                }),
            )
            .route(
                "/api/policies/:id",
                delete(|State(w): State<Arc<AtomicUsize>>, Path(id): Path<String>| async move {
                    w.fetch_add(1, Ordering::SeqCst);
                    if id == "2" {
                        StatusCode::CONFLICT
                    } else {
                        StatusCode::NO_CONTENT
                    }
                }),
            )
            .with_state(writes.clone());
        let api = api_for(app).await;
        (PolicyGrid::load(api, "set-9").await.unwrap(), writes)
    }

    #[tokio::test]
    async fn test_load_derives_columns() {
        let (grid, _) = grid().await;
        assert_eq!(grid.rows().len(), 2);
        let cols = grid.columns();
        let id_col = cols.iter().find(|c| c.field == "id").unwrap();
        assert!(!id_col.editable);
        assert!(cols.iter().filter(|c| c.field != "id").all(|c| c.editable));
    }

    #[tokio::test]
    async fn test_update_applies_after_ack() {
        let (mut grid, writes) = grid().await;
        let edited = grid.row("1").unwrap().with_field("premium", json!(120)).unwrap();
        grid.apply(PolicyCommand::Update(edited)).await.unwrap();
        assert_eq!(grid.row("1").unwrap().get("premium"), Some(&json!(120)));
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_rows_untouched() {
        let (mut grid, _) = grid().await;
        let before = grid.rows().to_vec();
        let edited = grid.row("1").unwrap().with_field("premium", json!(-5)).unwrap();
        let err = grid.apply(PolicyCommand::Update(edited)).await.unwrap_err();
        assert_eq!(err.to_string(), "premium must be positive");
        assert_eq!(grid.rows(), before.as_slice());
    }

    #[tokio::test]
    async fn test_delete_only_after_ack() {
        let (mut grid, _) = grid().await;
        grid.apply(PolicyCommand::Delete("1".into())).await.unwrap();
        assert!(grid.row("1").is_none());

        assert!(grid.apply(PolicyCommand::Delete("2".into())).await.is_err());
        assert!(grid.row("2").is_some());
    }

    #[tokio::test]
    async fn test_unknown_row_sends_nothing() {
        let (mut grid, writes) = grid().await;
        let err = grid.apply(PolicyCommand::Delete("99".into())).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(writes.load(Ordering::SeqCst), 0);
    }
}
