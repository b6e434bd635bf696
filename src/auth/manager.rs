//! Session lifecycle: login, callback, restore, renewal and logout.

use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use super::error::AuthError;
use super::provider::{IdentityProvider, SpotifyIdentity, SystemBrowser, UrlOpener};
use super::session::Session;
use super::store::{CredentialStore, FileStore, KeyValueStore};
use crate::config::AuthConfig;
use crate::events::{AuthEvent, EventBus};
use crate::profile::{ProfileFetcher, SpotifyProfileFetcher, UserProfile};

/// Where the manager is in the login lifecycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    LoggedOut,
    /// The authorization page was opened; waiting for the callback.
    Authenticating,
    LoggedIn(Session),
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthState::LoggedIn(_))
    }
}

#[derive(Default)]
struct Inner {
    state: AuthState,
    /// Bumped by `login` and `logout` so results of SDK calls started before
    /// them can be told apart and dropped.
    generation: u64,
    /// Set by `logout`, cleared by `login`. A callback arriving while set
    /// answers an authorization the user has since abandoned.
    logged_out_since_login: bool,
}

/// Owns the current session and the stored credential record.
///
/// Built once at startup and shared as `Arc<AuthSessionManager>`. The state
/// lock is never held across an SDK or network call.
pub struct AuthSessionManager {
    config: AuthConfig,
    provider: Arc<dyn IdentityProvider>,
    browser: Arc<dyn UrlOpener>,
    profiles: Arc<dyn ProfileFetcher>,
    store: CredentialStore,
    events: EventBus,
    inner: Mutex<Inner>,
}

impl AuthSessionManager {
    pub fn new(
        config: AuthConfig,
        provider: Arc<dyn IdentityProvider>,
        browser: Arc<dyn UrlOpener>,
        profiles: Arc<dyn ProfileFetcher>,
        storage: Arc<dyn KeyValueStore>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            provider,
            browser,
            profiles,
            store: CredentialStore::new(storage),
            events,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Production wiring: rspotify PKCE client, system browser and a file
    /// store under `config.storage_dir`.
    pub fn spotify(config: AuthConfig) -> Self {
        let provider = Arc::new(SpotifyIdentity::new(&config));
        let storage = Arc::new(FileStore::new(config.storage_dir.clone()));
        Self::new(
            config,
            provider,
            Arc::new(SystemBrowser),
            Arc::new(SpotifyProfileFetcher),
            storage,
            EventBus::new(),
        )
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub async fn state(&self) -> AuthState {
        self.inner.lock().await.state.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner.lock().await.state.is_logged_in()
    }

    pub async fn session(&self) -> Option<Session> {
        match &self.inner.lock().await.state {
            AuthState::LoggedIn(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Access token of the current session, for authenticated collaborators.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        self.session()
            .await
            .map(|s| s.access_token().to_string())
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Start a browser login and return the authorization URL that was opened.
    ///
    /// Called while logged in this switches accounts: the in-memory session is
    /// dropped, the stored record stays until a new login replaces it.
    ///
    /// If the browser cannot be opened the login stays pending and the error
    /// carries the URL, so the host can ask the user to open it by hand.
    pub async fn login(&self) -> Result<Url, AuthError> {
        self.events.publish(AuthEvent::LoginCheck);

        let url = match self.provider.login_url().await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build authorization URL");
                return Err(AuthError::BrowserHandoff {
                    url: None,
                    reason: e.to_string(),
                });
            }
        };

        {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.logged_out_since_login = false;
            inner.state = AuthState::Authenticating;
        }

        if let Err(e) = self.browser.open(&url) {
            tracing::warn!(error = %e, "Could not open authorization page");
            return Err(AuthError::BrowserHandoff {
                url: Some(url),
                reason: e.to_string(),
            });
        }

        tracing::info!("Started browser login");
        Ok(url)
    }

    /// Apply a URL the OS delivered back to the app.
    ///
    /// URLs that are not the configured redirect fail with
    /// [`AuthError::NotAnAuthCallback`] and leave everything untouched.
    pub async fn handle_callback(&self, url: &str) -> Result<Session, AuthError> {
        let url = match Url::parse(url) {
            Ok(url) if self.config.is_callback(&url) => url,
            _ => {
                tracing::debug!("Ignoring URL that is not an auth callback");
                return Err(AuthError::NotAnAuthCallback);
            }
        };

        let generation = {
            let inner = self.inner.lock().await;
            if inner.logged_out_since_login {
                tracing::info!("Ignoring callback for a login abandoned by logout");
                return Err(AuthError::Superseded);
            }
            inner.generation
        };

        let session = match self.provider.parse_callback(&url).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Auth callback rejected");
                return Err(AuthError::AuthCallbackRejected(e));
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                tracing::info!("Discarding callback result, login state changed meanwhile");
                return Err(AuthError::Superseded);
            }

            if let Err(e) = self.store.save(&session) {
                tracing::error!(error = %e, "Could not persist new session");
                return Err(e.into());
            }
            inner.state = AuthState::LoggedIn(session.clone());
        }

        tracing::info!(expires_at = ?session.expires_at(), "Login succeeded");
        self.events.publish(AuthEvent::LoginSuccess);
        Ok(session)
    }

    /// Reactivate the stored session, renewing it once if it has expired.
    ///
    /// `Ok(None)` means there was nothing usable to restore.
    pub async fn restore_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(record) = self.store.load() else {
            tracing::debug!("No stored session");
            return Ok(None);
        };

        let session = match record.decode() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding corrupt session record");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "Could not clear corrupt session record");
                }
                return Ok(None);
            }
        };

        if !session.is_valid() {
            tracing::info!("Stored session expired, renewing");
            return self.renew(session).await.map(Some);
        }

        self.inner.lock().await.state = AuthState::LoggedIn(session.clone());
        tracing::info!(expires_at = ?session.expires_at(), "Restored stored session");
        self.events.publish(AuthEvent::LoginStateChanged { logged_in: true });
        Ok(Some(session))
    }

    /// Exchange `session` for a fresh one. Exactly one attempt, no retries.
    ///
    /// On failure the manager ends up logged out and the stored record is
    /// left as it was.
    pub async fn renew(&self, session: Session) -> Result<Session, AuthError> {
        let generation = self.inner.lock().await.generation;

        let renewed = match self.provider.renew(&session).await {
            Ok(renewed) => renewed,
            Err(e) => {
                tracing::warn!(error = %e, "Session renewal failed, login required");
                let was_logged_in = {
                    let mut inner = self.inner.lock().await;
                    let was_logged_in = inner.state.is_logged_in();
                    if inner.generation == generation {
                        inner.state = AuthState::LoggedOut;
                    }
                    was_logged_in && inner.generation == generation
                };
                if was_logged_in {
                    self.events.publish(AuthEvent::LoginStateChanged { logged_in: false });
                }
                return Err(AuthError::RenewalFailed(e));
            }
        };

        let was_logged_in = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                tracing::info!("Discarding renewed session, login state changed meanwhile");
                return Err(AuthError::Superseded);
            }

            if let Err(e) = self.store.save(&renewed) {
                tracing::error!(error = %e, "Could not persist renewed session");
                return Err(e.into());
            }
            let was_logged_in = inner.state.is_logged_in();
            inner.state = AuthState::LoggedIn(renewed.clone());
            was_logged_in
        };

        tracing::info!(expires_at = ?renewed.expires_at(), "Session renewed");
        if !was_logged_in {
            self.events.publish(AuthEvent::LoginStateChanged { logged_in: true });
        }
        Ok(renewed)
    }

    /// Renew the current session if it expires within five minutes.
    ///
    /// Meant to be polled by the host; returns whether a renewal happened.
    pub async fn refresh_if_needed(&self) -> Result<bool, AuthError> {
        let session = self.session().await.ok_or(AuthError::NotAuthenticated)?;
        if !session.needs_refresh() {
            return Ok(false);
        }

        tracing::info!("Token expiring soon, refreshing");
        self.renew(session).await.map(|_| true)
    }

    /// Forget the session in memory and on disk. Idempotent.
    pub async fn logout(&self) -> Result<(), AuthError> {
        {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.logged_out_since_login = true;
            inner.state = AuthState::LoggedOut;
        }

        let cleared = self.store.clear();
        if let Err(e) = &cleared {
            tracing::error!(error = %e, "Could not clear stored session");
        }

        tracing::info!("Logged out");
        self.events.publish(AuthEvent::LoginStateChanged { logged_in: false });
        cleared.map_err(AuthError::from)
    }

    /// Profile of the logged-in user; an anonymous profile if it cannot be fetched.
    pub async fn current_user(&self) -> Result<UserProfile, AuthError> {
        match self.try_current_user().await {
            Err(AuthError::ProfileFetchFailed(e)) => {
                tracing::warn!(error = %e, "Using anonymous profile");
                Ok(UserProfile::anonymous())
            }
            other => other,
        }
    }

    /// Like [`current_user`](Self::current_user) but surfaces fetch failures.
    pub async fn try_current_user(&self) -> Result<UserProfile, AuthError> {
        let access_token = self.access_token().await?;
        self.profiles
            .fetch(&access_token)
            .await
            .map_err(AuthError::ProfileFetchFailed)
    }
}
