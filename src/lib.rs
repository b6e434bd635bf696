//! Spotify login sessions for host apps.
//!
//! [`AuthSessionManager`] drives the browser login, applies the redirect the
//! OS hands back, keeps the session on disk, renews it when it expires and
//! looks up the current user. Login state changes are published on an
//! [`EventBus`] for the UI layer.

pub mod auth;
pub mod config;
pub mod events;
pub mod logging;
pub mod profile;

pub use auth::{AuthError, AuthSessionManager, AuthState, Session};
pub use config::AuthConfig;
pub use events::{AuthEvent, EventBus};
pub use profile::UserProfile;
