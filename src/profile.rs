//! Current-user profile lookup.

use std::collections::HashSet;

use async_trait::async_trait;
use rspotify::{AuthCodeSpotify, Config, Token, model::PrivateUser, prelude::*};

use crate::auth::ProviderError;

/// The authenticated user as returned by the identity provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub product: Option<String>,
    pub image_url: Option<String>,
}

impl UserProfile {
    /// Placeholder used when the profile cannot be fetched.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }

    /// Display name, falling back to the user id.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

impl From<PrivateUser> for UserProfile {
    fn from(user: PrivateUser) -> Self {
        Self {
            id: user.id.id().to_string(),
            display_name: user.display_name,
            email: user.email,
            product: user.product.map(|p| format!("{p:?}").to_lowercase()),
            image_url: user
                .images
                .and_then(|images| images.into_iter().next())
                .map(|image| image.url),
        }
    }
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// One round-trip to the profile endpoint. Errors are returned as-is.
    async fn fetch(&self, access_token: &str) -> Result<UserProfile, ProviderError>;
}

/// Fetches `GET /me` through rspotify.
#[derive(Default)]
pub struct SpotifyProfileFetcher;

#[async_trait]
impl ProfileFetcher for SpotifyProfileFetcher {
    async fn fetch(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
        let spotify = AuthCodeSpotify::with_config(
            Default::default(),
            Default::default(),
            Config {
                token_cached: false,
                token_refreshing: false,
                ..Default::default()
            },
        );

        // Only the access token matters for the request
        *spotify.token.lock().await.map_err(|_| ProviderError::TokenLock)? = Some(Token {
            access_token: access_token.to_string(),
            expires_in: chrono::Duration::seconds(3600),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::seconds(3600)),
            scopes: HashSet::new(),
            refresh_token: None,
        });

        let result = spotify.me().await;
        crate::log_sdk_result!("me", result);
        Ok(UserProfile::from(result?))
    }
}
