//! OAuth2 Authorization Code flow with PKCE, for public clients.
//!
//! 1. Generate a code verifier / challenge pair and a CSRF state
//! 2. Build the authorization URL the user agent is sent to
//! 3. Parse the redirect back into [`CallbackParams`]
//! 4. Exchange the code (or a refresh token) at the token endpoint
//!
//! How the user agent gets to the URL and how the redirect is captured is up
//! to the shell.

use base64::prelude::*;
use rand::{rngs::OsRng, Rng};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::AuthError;

/// RFC 7636 unreserved characters.
const UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

pub const VERIFIER_LEN: usize = 64;
pub const MIN_VERIFIER_LEN: usize = 43;
pub const MAX_VERIFIER_LEN: usize = 128;

/// Random code verifier of `len` unreserved characters (clamped to 43..=128).
pub fn generate_code_verifier(len: usize) -> String {
    let len = len.clamp(MIN_VERIFIER_LEN, MAX_VERIFIER_LEN);
    let mut rng = OsRng;
    (0..len)
        .map(|_| UNRESERVED[rng.gen_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// `base64url(SHA-256(verifier))` without padding.
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a cryptographically random state parameter for CSRF protection.
pub fn generate_state() -> Result<String, AuthError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|e| AuthError::Random(e.to_string()))?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Everything needed to send the user agent to the provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

pub struct AuthorizationParams<'a> {
    pub authorize_url: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a [String],
    pub code_challenge: &'a str,
    pub state: &'a str,
}

pub fn authorization_url(params: &AuthorizationParams<'_>) -> Result<Url, AuthError> {
    let scope = params.scopes.join(" ");
    Url::parse_with_params(
        params.authorize_url,
        &[
            ("client_id", params.client_id),
            ("response_type", "code"),
            ("redirect_uri", params.redirect_uri),
            ("scope", scope.as_str()),
            ("code_challenge_method", "S256"),
            ("code_challenge", params.code_challenge),
            ("state", params.state),
        ],
    )
    .map_err(|e| AuthError::InvalidAuthorizeUrl(e.to_string()))
}

/// Query parameters delivered to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Parse a raw query string (with or without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs())
    }
}

/// Drop the authorization code and state from a callback URL so it can be
/// shown or logged.
pub fn redact_callback_url(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "code" && k != "state")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut clean = url.clone();
    clean.set_query(None);
    if !kept.is_empty() {
        clean.query_pairs_mut().extend_pairs(kept);
    }
    clean
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

/// POST a form-encoded grant to the token endpoint.
///
/// Errors are returned as provider/transport messages; the caller decides
/// whether they are fatal.
pub async fn request_token(
    http: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, String> {
    let resp = http
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;

    if !status.is_success() || body.get("error").is_some() {
        let error = body
            .get("error_description")
            .or_else(|| body.get("error"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return Err(format!("{status}: {error}"));
    }

    serde_json::from_value(body).map_err(|e| e.to_string())
}
