//! Auth module - Spotify session lifecycle
//!
//! This module acquires, persists, restores and renews the Spotify session.
//! It is organized into submodules by responsibility:
//!
//! - `session`: The session entity and its stored encoding
//! - `store`: Durable key-value backends and the credential store on top
//! - `provider`: The identity SDK seam (rspotify PKCE) and browser handoff
//! - `manager`: The session state machine that ties them together
//! - `error`: Error taxonomy surfaced to callers

mod error;
mod manager;
mod provider;
mod session;
mod store;

pub use error::{AuthError, ProviderError, StoreError};
pub use manager::{AuthSessionManager, AuthState};
pub use provider::{IdentityProvider, SpotifyIdentity, SystemBrowser, UrlOpener};
pub use session::{SerializedSession, Session};
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore, SESSION_KEY};
