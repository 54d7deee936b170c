//! Core error types for pomotune-core.
//!
//! Engine-side failures (`ConfigError`) are returned synchronously to the
//! caller. Everything that crosses the network boundary is a `SpotifyError`
//! or an `AuthError`; those are logged at the client boundary and never
//! touch the engine's timing state.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Duration outside the accepted range
    #[error("{field} must be between {min} and {max} minutes (got {value})")]
    DurationOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Errors raised by the PKCE authorization flow.
///
/// These are fatal to the in-progress authorization attempt only.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The callback `state` does not match the one issued with the redirect
    #[error("Authorization state mismatch; the callback was not issued by this client")]
    StateMismatch,

    /// No authorization is pending (verifier or state missing)
    #[error("No authorization in progress")]
    NoPendingAuthorization,

    /// Callback is missing a required parameter
    #[error("Invalid authorization callback: missing '{0}'")]
    MissingParameter(&'static str),

    /// The provider redirected back with an error
    #[error("Authorization denied by provider: {0}")]
    Denied(String),

    /// The accounts host URL cannot form an authorize URL
    #[error("Invalid authorize URL: {0}")]
    InvalidAuthorizeUrl(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Client id not configured
    #[error("Spotify client id not configured")]
    CredentialsNotConfigured,

    /// Secure random source unavailable
    #[error("Failed to generate random value: {0}")]
    Random(String),

    /// Could not persist or load the pending authorization
    #[error("Authorization storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Errors surfaced by the Spotify request layer.
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// No token is present; the user must authorize
    #[error("Authentication required")]
    AuthRequired,

    /// The provider kept rejecting credentials after a refresh; session dropped
    #[error("Authentication failed")]
    AuthFailed,

    /// Provider-side, non-auth failure
    #[error("API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected response body
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A body was expected but the provider sent none
    #[error("Empty response body")]
    EmptyResponse,

    /// Token persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SpotifyError {
    /// Provider status code, if the failure came from the provider.
    pub fn status(&self) -> Option<u16> {
        match self {
            SpotifyError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Durable key-value storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A previous holder of the store panicked
    #[error("Store lock poisoned")]
    Poisoned,

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}
