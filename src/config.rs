//! Startup configuration for the Spotify login flow.
//!
//! Values are compiled-in constants that can be overridden from the
//! environment once at startup.

use std::path::PathBuf;

use anyhow::{Context, Result};
use url::Url;

const SPOTIFY_CLIENT_ID: &str = "492e1e45ea814fa3ac555fe1576aaf5b";
const SPOTIFY_REDIRECT_URI: &str = "http://127.0.0.1:8898/login";
const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com/";

/// Application name used for the storage directory
const APP_NAME: &str = "spotify-session";
const FALLBACK_STORAGE_DIR: &str = ".cache";

pub const SCOPES: &[&str] = &[
    "streaming",
    "user-read-private",
    "user-read-email",
    "user-library-modify",
    "user-library-read",
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
    "playlist-read-collaborative",
];

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub client_id: String,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    /// Accounts service base URL; authorization and token refresh go here.
    pub accounts_url: Url,
    pub storage_dir: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: SPOTIFY_CLIENT_ID.to_string(),
            redirect_uri: Url::parse(SPOTIFY_REDIRECT_URI).expect("valid default redirect URI"),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            accounts_url: Url::parse(SPOTIFY_ACCOUNTS_URL).expect("valid default accounts URL"),
            storage_dir: default_storage_dir(),
        }
    }
}

impl AuthConfig {
    /// Defaults overridden by `SPOTIFY_CLIENT_ID`, `SPOTIFY_REDIRECT_URI`,
    /// `SPOTIFY_ACCOUNTS_URL` and `SPOTIFY_SESSION_DIR`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(client_id) = std::env::var("SPOTIFY_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(redirect) = std::env::var("SPOTIFY_REDIRECT_URI") {
            config.redirect_uri =
                Url::parse(&redirect).context("SPOTIFY_REDIRECT_URI is not a valid URL")?;
        }
        if let Ok(accounts) = std::env::var("SPOTIFY_ACCOUNTS_URL") {
            config.accounts_url =
                Url::parse(&accounts).context("SPOTIFY_ACCOUNTS_URL is not a valid URL")?;
        }
        if let Ok(dir) = std::env::var("SPOTIFY_SESSION_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Whether `url` is a redirect back from the authorization page.
    ///
    /// Scheme, host, port and path must match the redirect URI; the query is
    /// left for the SDK to validate.
    pub fn is_callback(&self, url: &Url) -> bool {
        let expected = &self.redirect_uri;
        url.scheme() == expected.scheme()
            && url.host_str() == expected.host_str()
            && url.port_or_known_default() == expected.port_or_known_default()
            && url.path().trim_end_matches('/') == expected.path().trim_end_matches('/')
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_STORAGE_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.client_id, SPOTIFY_CLIENT_ID);
        assert_eq!(config.scopes.len(), SCOPES.len());
        assert!(config.scopes.iter().any(|s| s == "playlist-read-collaborative"));
    }

    #[test]
    fn test_is_callback_matches_redirect() {
        let config = AuthConfig::default();
        assert!(config.is_callback(&url("http://127.0.0.1:8898/login?code=abc&state=xyz")));
        assert!(config.is_callback(&url("http://127.0.0.1:8898/login/?error=access_denied")));
    }

    #[test]
    fn test_is_callback_rejects_other_urls() {
        let config = AuthConfig::default();
        assert!(!config.is_callback(&url("http://127.0.0.1:8899/login?code=abc")));
        assert!(!config.is_callback(&url("http://127.0.0.1:8898/other?code=abc")));
        assert!(!config.is_callback(&url("https://127.0.0.1:8898/login?code=abc")));
        assert!(!config.is_callback(&url("https://example.com/login")));
    }

    #[test]
    fn test_is_callback_custom_scheme() {
        let config = AuthConfig {
            redirect_uri: url("spotifysession://callback"),
            ..AuthConfig::default()
        };
        assert!(config.is_callback(&url("spotifysession://callback?code=abc")));
        assert!(!config.is_callback(&url("otherapp://callback?code=abc")));
    }
}
