use std::sync::Arc;

use anyhow::Result;
use tracer_client::{
    Account, ApiClient, ClientConfig, RefreshTokenIdentity, StaticIdentity, TokenProvider,
    TokenSource,
};

use crate::args::Args;

/// Picks the credential source from the arguments: a pre-issued token wins,
/// then a refresh token. With neither, every call fails with "please sign in".
pub fn token_source(args: &Args, http: &reqwest::Client, config: &ClientConfig) -> Arc<dyn TokenSource> {
    let account = Account::new(args.account.clone());
    let scopes = scopes(args);

    if let Some(token) = &args.token {
        let provider = TokenProvider::new(StaticIdentity::new(account, token.clone()), scopes)
            .with_refresh_margin(config.token_refresh_margin);
        return Arc::new(provider);
    }

    if let (Some(refresh), Some(client_id)) = (&args.refresh_token, &args.client_id) {
        let identity = RefreshTokenIdentity::new(
            http.clone(),
            &args.authority,
            client_id.clone(),
            account,
            Some(refresh.clone()),
        );
        let provider =
            TokenProvider::new(identity, scopes).with_refresh_margin(config.token_refresh_margin);
        return Arc::new(provider);
    }

    tracing::debug!("no credentials configured");
    Arc::new(TokenProvider::new(StaticIdentity::new(account, ""), scopes))
}

fn scopes(args: &Args) -> Vec<String> {
    match (&args.scope, &args.client_id) {
        (Some(scope), _) => scope.split_whitespace().map(str::to_string).collect(),
        (None, Some(client_id)) => vec![RefreshTokenIdentity::default_scope(client_id)],
        (None, None) => Vec::new(),
    }
}

pub fn api_client(args: &Args, config: &ClientConfig) -> Result<ApiClient> {
    let http = config.http_client()?;
    let tokens = token_source(args, &http, config);
    Ok(ApiClient::new(http, config.api_base_url.clone(), tokens))
}
