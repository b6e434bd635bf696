//! Auth error types.

use thiserror::Error;
use url::Url;

/// Errors surfaced by the session manager.
///
/// Storage and SDK failures are translated into these variants before they
/// leave the manager. None of them is fatal to the host: the worst outcome is
/// a return to the logged-out state.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Durable storage failed while saving or clearing the session record.
    ///
    /// The login or renewal that triggered the write is aborted.
    #[error("Failed to persist session: {0}")]
    Persistence(#[from] StoreError),

    /// The URL handed to the callback handler is not the configured redirect.
    ///
    /// Hosts forward every incoming URL, so this is expected and not an error state.
    #[error("URL is not an authorization callback")]
    NotAnAuthCallback,

    /// The SDK rejected the authorization callback. The user may retry `login()`.
    #[error("Authorization callback rejected: {0}")]
    AuthCallbackRejected(#[source] ProviderError),

    /// Token renewal failed. The user must log in again.
    #[error("Session renewal failed: {0}")]
    RenewalFailed(#[source] ProviderError),

    /// An authenticated operation was called while logged out.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The identity provider could not return the current user's profile.
    #[error("Failed to fetch user profile: {0}")]
    ProfileFetchFailed(#[source] ProviderError),

    /// The authorization URL could not be built or opened.
    ///
    /// When only opening failed, `url` carries the authorization page so the
    /// host can show it; the login stays pending and the callback still applies.
    #[error("Failed to start browser login: {reason}")]
    BrowserHandoff { url: Option<Url>, reason: String },

    /// A logout or a new login happened while a callback or renewal was in flight.
    #[error("Result discarded, login state changed meanwhile")]
    Superseded,
}

/// Errors from the durable key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from the identity SDK and the profile endpoint.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Spotify client error: {0}")]
    Client(#[from] rspotify::ClientError),

    /// The user declined, or the accounts service returned an `error` parameter.
    #[error("Authorization denied: {0}")]
    Denied(String),

    #[error("Callback carries no authorization code or its state does not match")]
    MissingCode,

    #[error("Session has no refresh token")]
    MissingRefreshToken,

    #[error("SDK returned no token")]
    NoToken,

    #[error("Token lock poisoned")]
    TokenLock,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}
