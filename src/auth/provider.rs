//! Identity SDK seam and the browser handoff.

use async_trait::async_trait;
use rspotify::{AuthCodePkceSpotify, Config, Credentials, OAuth, prelude::*};
use tokio::sync::Mutex;
use url::Url;

use super::error::ProviderError;
use super::session::Session;
use crate::config::AuthConfig;

/// The native identity SDK as seen by the session manager.
///
/// Client id, redirect URL and scope set are fixed when the provider is built.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization page URL for a new login.
    async fn login_url(&self) -> Result<Url, ProviderError>;

    /// Validate a callback URL and exchange it for a session.
    async fn parse_callback(&self, url: &Url) -> Result<Session, ProviderError>;

    /// Exchange a session's refresh credential for a fresh session.
    async fn renew(&self, session: &Session) -> Result<Session, ProviderError>;
}

/// Opens URLs outside the app.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &Url) -> std::io::Result<()>;
}

/// Hands URLs to the system's default browser.
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &Url) -> std::io::Result<()> {
        tracing::debug!(host = url.host_str(), "Opening authorization page in browser");
        open::that(url.as_str())
    }
}

/// Spotify authorization code flow with PKCE, so no client secret is needed.
///
/// The PKCE verifier generated for the last `login_url` is kept inside the
/// client and consumed by the following `parse_callback`.
pub struct SpotifyIdentity {
    client: Mutex<AuthCodePkceSpotify>,
}

impl SpotifyIdentity {
    pub fn new(config: &AuthConfig) -> Self {
        let creds = Credentials::new_pkce(&config.client_id);
        let oauth = OAuth {
            redirect_uri: config.redirect_uri.to_string(),
            scopes: config.scopes.iter().cloned().collect(),
            ..Default::default()
        };
        let client = AuthCodePkceSpotify::with_config(
            creds,
            oauth,
            Config {
                auth_base_url: config.accounts_url.to_string(),
                token_cached: false,
                token_refreshing: false,
                ..Default::default()
            },
        );

        tracing::debug!(client_id = %config.client_id, "rspotify PKCE client initialized");
        Self {
            client: Mutex::new(client),
        }
    }
}

#[async_trait]
impl IdentityProvider for SpotifyIdentity {
    async fn login_url(&self) -> Result<Url, ProviderError> {
        let mut client = self.client.lock().await;
        let url = client.get_authorize_url(None)?;
        Ok(Url::parse(&url)?)
    }

    async fn parse_callback(&self, url: &Url) -> Result<Session, ProviderError> {
        if let Some((_, reason)) = url.query_pairs().find(|(key, _)| key == "error") {
            return Err(ProviderError::Denied(reason.into_owned()));
        }

        let client = self.client.lock().await;
        let code = client
            .parse_response_code(url.as_str())
            .ok_or(ProviderError::MissingCode)?;

        let result = client.request_token(&code).await;
        crate::log_sdk_result!("request_token", result);
        result?;

        let token = client
            .token
            .lock()
            .await
            .map_err(|_| ProviderError::TokenLock)?
            .clone()
            .ok_or(ProviderError::NoToken)?;
        Ok(Session::from(token))
    }

    async fn renew(&self, session: &Session) -> Result<Session, ProviderError> {
        if !session.can_refresh() {
            return Err(ProviderError::MissingRefreshToken);
        }

        let client = self.client.lock().await;
        *client.token.lock().await.map_err(|_| ProviderError::TokenLock)? =
            Some(session.token().clone());

        crate::log_sdk_call!("refetch_token", expires_at = ?session.expires_at());
        let result = client.refetch_token().await;
        crate::log_sdk_result!("refetch_token", result);

        let mut token = result?.ok_or(ProviderError::NoToken)?;
        // The accounts service may omit a rotated refresh token
        if token.refresh_token.is_none() {
            token.refresh_token = session.refresh_token().map(str::to_string);
        }
        Ok(Session::from(token))
    }
}
