use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::DEFAULT_TOKEN_REFRESH_MARGIN;
use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub home_account_id: Option<String>,
}

impl Account {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            home_account_id: None,
        }
    }
}

/// An access token bound to the account it was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub account: Account,
    access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(account: Account, access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            account,
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Usable for at least `margin` more.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What the identity provider hands back from a silent acquisition.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// The external identity provider, reduced to the non-interactive calls the
/// client makes. Interactive sign-in happens elsewhere.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn active_account(&self) -> Option<Account>;

    async fn acquire_token_silent(
        &self,
        account: &Account,
        scopes: &[String],
    ) -> Result<TokenGrant, AuthError>;
}

/// Anything that can produce a valid bearer credential on demand.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire_token(&self) -> Result<Session, AuthError>;
}

/// Owns the session. Other components only ever receive clones.
pub struct TokenProvider<I> {
    identity: I,
    scopes: Vec<String>,
    refresh_margin: chrono::Duration,
    cached: RwLock<Option<Session>>,
}

impl<I: IdentityProvider> TokenProvider<I> {
    pub fn new(identity: I, scopes: Vec<String>) -> Self {
        Self {
            identity,
            scopes,
            refresh_margin: to_chrono(DEFAULT_TOKEN_REFRESH_MARGIN),
            cached: RwLock::new(None),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = to_chrono(margin);
        self
    }

    pub async fn acquire_token(&self) -> Result<Session, AuthError> {
        let account = self
            .identity
            .active_account()
            .ok_or(AuthError::NoActiveAccount)?;

        if let Some(session) = self.cached_for(&account, &*self.cached.read().await) {
            return Ok(session);
        }

        // Single writer: concurrent callers wait here and then reuse the
        // token the first one fetched.
        let mut guard = self.cached.write().await;
        if let Some(session) = self.cached_for(&account, &guard) {
            return Ok(session);
        }

        tracing::debug!(account=%account.username, "acquiring token silently");
        let grant = match self.identity.acquire_token_silent(&account, &self.scopes).await {
            Ok(grant) => grant,
            Err(err) => {
                *guard = None;
                tracing::warn!(account=%account.username, error=%err, "silent token acquisition failed");
                return Err(err);
            }
        };
        if grant.expires_at <= Utc::now() {
            *guard = None;
            return Err(AuthError::Expired);
        }

        let session = Session::new(account, grant.access_token, grant.expires_at);
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Drops the cached session; the next call goes back to the provider.
    pub async fn sign_out(&self) {
        *self.cached.write().await = None;
    }

    fn cached_for(&self, account: &Account, cached: &Option<Session>) -> Option<Session> {
        cached
            .as_ref()
            .filter(|s| &s.account == account && s.is_fresh_at(Utc::now(), self.refresh_margin))
            .cloned()
    }
}

#[async_trait]
impl<I: IdentityProvider> TokenSource for TokenProvider<I> {
    async fn acquire_token(&self) -> Result<Session, AuthError> {
        TokenProvider::acquire_token(self).await
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}
