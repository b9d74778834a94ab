use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use chrono::{Duration, Utc};

use crate::error::AuthError;
use crate::request::ApiClient;
use crate::token::{Account, Session, TokenSource};

pub(crate) const TEST_TOKEN: &str = "test-token";

pub(crate) struct FixedToken;

#[async_trait]
impl TokenSource for FixedToken {
    async fn acquire_token(&self) -> Result<Session, AuthError> {
        Ok(Session::new(
            Account::new("tester@example.com"),
            TEST_TOKEN,
            Utc::now() + Duration::hours(1),
        ))
    }
}

pub(crate) struct SignedOut;

#[async_trait]
impl TokenSource for SignedOut {
    async fn acquire_token(&self) -> Result<Session, AuthError> {
        Err(AuthError::NoActiveAccount)
    }
}

/// Runs `router` on an ephemeral local port and returns its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) async fn api_for(router: Router) -> ApiClient {
    let base = serve(router).await;
    ApiClient::new(reqwest::Client::new(), base, Arc::new(FixedToken))
}
