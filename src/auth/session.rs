use chrono::{DateTime, Utc};
use rspotify::Token;
use serde::{Deserialize, Serialize};

/// Time before expiry at which a proactive refresh is due (5 minutes).
const REFRESH_THRESHOLD_SECS: i64 = 5 * 60;

/// An authenticated Spotify session.
///
/// Sessions are only ever built from a token issued by the SDK; validity is
/// the token's own expiry check.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    token: Token,
}

impl Session {
    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.expires_at
    }

    /// Usable immediately, without renewal.
    pub fn is_valid(&self) -> bool {
        !self.token.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token().is_some_and(|t| !t.is_empty())
    }

    /// True when the session expires within five minutes, or has no expiry at all.
    pub fn needs_refresh(&self) -> bool {
        match self.token.expires_at {
            None => true,
            Some(exp) => (exp - Utc::now()).num_seconds() <= REFRESH_THRESHOLD_SECS,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn into_token(self) -> Token {
        self.token
    }
}

impl From<Token> for Session {
    fn from(token: Token) -> Self {
        Self { token }
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.token.access_token == other.token.access_token
            && self.token.refresh_token == other.token.refresh_token
            && self.token.expires_at == other.token.expires_at
            && self.token.scopes == other.token.scopes
    }
}

impl Eq for Session {}

/// The stored credential record: one JSON-encoded [`Session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedSession(Vec<u8>);

impl SerializedSession {
    pub fn encode(session: &Session) -> serde_json::Result<Self> {
        serde_json::to_vec(session).map(Self)
    }

    pub fn decode(&self) -> serde_json::Result<Session> {
        serde_json::from_slice(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for SerializedSession {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
