use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::AuthError;
use crate::token::{Account, IdentityProvider, TokenGrant};

/// A bearer token issued out of band (CLI `--token`, CI secrets).
///
/// There is nothing to refresh; once `expires_at` passes every acquisition
/// fails with [`AuthError::Expired`].
pub struct StaticIdentity {
    account: Account,
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StaticIdentity {
    pub fn new(account: Account, token: impl Into<String>) -> Self {
        Self {
            account,
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    fn active_account(&self) -> Option<Account> {
        if self.token.trim().is_empty() {
            None
        } else {
            Some(self.account.clone())
        }
    }

    async fn acquire_token_silent(
        &self,
        _account: &Account,
        _scopes: &[String],
    ) -> Result<TokenGrant, AuthError> {
        let now = Utc::now();
        // Without a stated expiry the token is re-granted for an hour at a
        // time; the server is the authority on whether it still works.
        let expires_at = self.expires_at.unwrap_or(now + Duration::hours(1));
        if expires_at <= now {
            return Err(AuthError::Expired);
        }
        Ok(TokenGrant {
            access_token: self.token.clone(),
            expires_at,
        })
    }
}

// ── OAuth2 refresh-token grant ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Silent acquisition against an OAuth2/OIDC authority using a refresh
/// token obtained by an earlier interactive sign-in.
pub struct RefreshTokenIdentity {
    http: Client,
    token_url: String,
    client_id: String,
    account: Option<Account>,
    refresh_token: Mutex<Option<String>>,
    revoked: AtomicBool,
}

impl RefreshTokenIdentity {
    pub fn new(
        http: Client,
        authority: &str,
        client_id: impl Into<String>,
        account: Account,
        refresh_token: Option<String>,
    ) -> Self {
        let refresh_token = refresh_token.filter(|t| !t.trim().is_empty());
        Self {
            http,
            token_url: format!("{}/oauth2/v2.0/token", authority.trim_end_matches('/')),
            client_id: client_id.into(),
            account: refresh_token.as_ref().map(|_| account),
            refresh_token: Mutex::new(refresh_token),
            revoked: AtomicBool::new(false),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// The delegated scope the calculation API is registered with.
    pub fn default_scope(client_id: &str) -> String {
        format!("api://{client_id}/user_impersonation")
    }
}

#[async_trait]
impl IdentityProvider for RefreshTokenIdentity {
    fn active_account(&self) -> Option<Account> {
        if self.revoked.load(Ordering::SeqCst) {
            return None;
        }
        self.account.clone()
    }

    async fn acquire_token_silent(
        &self,
        account: &Account,
        scopes: &[String],
    ) -> Result<TokenGrant, AuthError> {
        let mut refresh = self.refresh_token.lock().await;
        let Some(current) = refresh.clone() else {
            return Err(AuthError::NoActiveAccount);
        };

        let mut scope: Vec<&str> = scopes.iter().map(String::as_str).collect();
        if !scope.contains(&"offline_access") {
            scope.push("offline_access");
        }
        let scope = scope.join(" ");
        let form = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", current.as_str()),
            ("scope", scope.as_str()),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Acquisition(format!("identity provider unreachable: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Acquisition(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            let err = serde_json::from_str::<TokenErrorResponse>(&body).ok();
            return Err(match err {
                Some(e) if matches!(
                    e.error.as_str(),
                    "invalid_grant" | "interaction_required" | "login_required" | "consent_required"
                ) =>
                {
                    // The refresh token is dead; sign-in has to start over.
                    *refresh = None;
                    self.revoked.store(true, Ordering::SeqCst);
                    AuthError::InteractionRequired(e.error_description.unwrap_or(e.error))
                }
                Some(e) => AuthError::Acquisition(e.error_description.unwrap_or(e.error)),
                None => AuthError::Acquisition(format!("identity provider returned {status}")),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Acquisition(format!("malformed token response: {e}")))?;
        let expires_at = expiry_after(Utc::now(), parsed.expires_in).ok_or_else(|| {
            AuthError::Acquisition("malformed token response: expires_in out of range".into())
        })?;
        if let Some(next) = parsed.refresh_token {
            *refresh = Some(next);
        }
        tracing::debug!(account=%account.username, expires_in=parsed.expires_in, "token refreshed");

        Ok(TokenGrant {
            access_token: parsed.access_token,
            expires_at,
        })
    }
}

fn expiry_after(now: DateTime<Utc>, expires_in: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(expires_in).ok()?;
    now.checked_add_signed(Duration::try_seconds(secs)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Form, Json, Router};

    use super::*;
    use crate::testing::serve;
    use crate::token::TokenProvider;

    #[tokio::test]
    async fn test_static_identity() {
        let signed_out = StaticIdentity::new(Account::new("a"), "");
        assert!(signed_out.active_account().is_none());

        let expired = StaticIdentity::new(Account::new("a"), "t")
            .expiring_at(Utc::now() - Duration::minutes(1));
        let err = expired
            .acquire_token_silent(&Account::new("a"), &[])
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Expired);
    }

    type Seen = Arc<tokio::sync::Mutex<Vec<HashMap<String, String>>>>;

    async fn token_endpoint(
        State(seen): State<Seen>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let refresh = form.get("refresh_token").cloned().unwrap_or_default();
        seen.lock().await.push(form);
        if refresh == "forever" {
            return (
                StatusCode::OK,
                Json(serde_json::json!({"access_token": "a", "expires_in": 10_000_000_000_000_000u64})),
            );
        }
        if refresh == "revoked" {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "invalid_grant", "error_description": "AADSTS700082: expired"})),
            );
        }
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "access_token": format!("access-for-{refresh}"),
                "expires_in": 3600,
                "refresh_token": format!("{refresh}-next"),
            })),
        )
    }

    #[tokio::test]
    async fn test_refresh_grant_rotates_refresh_token() {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/oauth2/v2.0/token", post(token_endpoint))
            .with_state(seen.clone());
        let base = serve(app).await;

        let identity = RefreshTokenIdentity::new(
            reqwest::Client::new(),
            &base,
            "client-1",
            Account::new("actuary"),
            Some("r0".into()),
        );
        let tp = TokenProvider::new(identity, vec![RefreshTokenIdentity::default_scope("client-1")])
            .with_refresh_margin(std::time::Duration::from_secs(3599));

        let first = tp.acquire_token().await.unwrap();
        assert_eq!(first.access_token(), "access-for-r0");
        // Margin is nearly the whole lifetime, so the next call refreshes
        // with the rotated refresh token.
        let second = tp.acquire_token().await.unwrap();
        assert_eq!(second.access_token(), "access-for-r0-next");

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["grant_type"], "refresh_token");
        assert_eq!(seen[0]["client_id"], "client-1");
        assert_eq!(
            seen[0]["scope"],
            "api://client-1/user_impersonation offline_access"
        );
    }

    async fn identity_with(refresh: &str) -> (RefreshTokenIdentity, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/oauth2/v2.0/token", post(token_endpoint))
            .with_state(seen.clone());
        let base = serve(app).await;
        let identity = RefreshTokenIdentity::new(
            reqwest::Client::new(),
            &base,
            "client-1",
            Account::new("actuary"),
            Some(refresh.into()),
        );
        (identity, seen)
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_requires_interaction() {
        let (identity, seen) = identity_with("revoked").await;
        let err = identity
            .acquire_token_silent(&Account::new("actuary"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InteractionRequired(msg) if msg.contains("AADSTS700082")));
        assert!(identity.active_account().is_none());

        // Later calls fail fast without contacting the identity provider.
        let tp = TokenProvider::new(identity, vec![]);
        assert_eq!(tp.acquire_token().await.unwrap_err(), AuthError::NoActiveAccount);
        assert_eq!(seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_rejected() {
        let (identity, _) = identity_with("forever").await;
        let err = identity
            .acquire_token_silent(&Account::new("actuary"), &[])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::Acquisition("malformed token response: expires_in out of range".into())
        );
    }

    #[test]
    fn test_expiry_after_bounds() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 60), Some(now + Duration::seconds(60)));
        assert_eq!(expiry_after(now, u64::MAX), None);
        assert_eq!(expiry_after(now, i64::MAX as u64), None);
    }

    #[test]
    fn test_no_refresh_token_means_no_account() {
        let identity = RefreshTokenIdentity::new(
            reqwest::Client::new(),
            "https://login.example.com",
            "c",
            Account::new("a"),
            Some("  ".into()),
        );
        assert!(identity.active_account().is_none());
    }
}
