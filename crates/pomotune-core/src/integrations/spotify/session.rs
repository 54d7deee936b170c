//! Persisted Spotify credentials and the pending PKCE authorization.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::StorageError;
use crate::storage::KvStore;

pub const ACCESS_TOKEN_KEY: &str = "spotify_access_token";
pub const REFRESH_TOKEN_KEY: &str = "spotify_refresh_token";
/// Expiry as epoch milliseconds.
pub const TOKEN_EXPIRY_KEY: &str = "spotify_token_expiry";
pub const CODE_VERIFIER_KEY: &str = "spotify_code_verifier";
pub const STATE_KEY: &str = "spotify_state";

/// Refresh this long before the provider-reported expiry.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// The access/refresh token pair currently in use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn load(store: &dyn KvStore) -> Result<Self, StorageError> {
        let expires_at = store
            .get(TOKEN_EXPIRY_KEY)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        Ok(Self {
            access_token: store.get(ACCESS_TOKEN_KEY)?,
            refresh_token: store.get(REFRESH_TOKEN_KEY)?,
            expires_at,
        })
    }

    pub fn persist(&self, store: &dyn KvStore) -> Result<(), StorageError> {
        write_opt(store, ACCESS_TOKEN_KEY, self.access_token.as_deref())?;
        write_opt(store, REFRESH_TOKEN_KEY, self.refresh_token.as_deref())?;
        let expiry = self.expires_at.map(|t| t.timestamp_millis().to_string());
        write_opt(store, TOKEN_EXPIRY_KEY, expiry.as_deref())
    }

    /// Remove every token key from the store.
    pub fn clear(store: &dyn KvStore) -> Result<(), StorageError> {
        store.remove(ACCESS_TOKEN_KEY)?;
        store.remove(REFRESH_TOKEN_KEY)?;
        store.remove(TOKEN_EXPIRY_KEY)
    }

    /// Build a session from a token response issued at `now`.
    ///
    /// The provider may omit the refresh token on refresh; the previous one is
    /// kept in that case.
    pub fn issued(
        now: DateTime<Utc>,
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
        previous_refresh: Option<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: refresh_token.or(previous_refresh),
            // An unrepresentable expiry leaves none, which reads as stale.
            expires_at: Duration::try_seconds(expires_in.max(0))
                .and_then(|ttl| now.checked_add_signed(ttl)),
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// True when the token is missing an expiry or is within the refresh
    /// margin of it.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(REFRESH_MARGIN_SECS) >= at,
            None => true,
        }
    }

    /// An access token exists and has not yet expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_some() && self.expires_at.is_some_and(|at| now < at)
    }
}

/// Verifier and state issued with the most recent authorization URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub code_verifier: String,
    pub state: String,
}

impl PendingAuthorization {
    pub fn load(store: &dyn KvStore) -> Result<Option<Self>, StorageError> {
        let verifier = store.get(CODE_VERIFIER_KEY)?;
        let state = store.get(STATE_KEY)?;
        Ok(match (verifier, state) {
            (Some(code_verifier), Some(state)) => Some(Self { code_verifier, state }),
            _ => None,
        })
    }

    pub fn persist(&self, store: &dyn KvStore) -> Result<(), StorageError> {
        store.set(CODE_VERIFIER_KEY, &self.code_verifier)?;
        store.set(STATE_KEY, &self.state)
    }

    pub fn clear(store: &dyn KvStore) -> Result<(), StorageError> {
        store.remove(CODE_VERIFIER_KEY)?;
        store.remove(STATE_KEY)
    }
}

fn write_opt(store: &dyn KvStore, key: &str, value: Option<&str>) -> Result<(), StorageError> {
    match value {
        Some(v) => store.set(key, v),
        None => store.remove(key),
    }
}
