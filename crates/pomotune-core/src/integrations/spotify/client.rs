//! Spotify Web API client.
//!
//! Owns the auth session and every call to the accounts and API hosts.
//! Storage and time are injected; nothing here is global.
//!
//! Token handling:
//! - Before each request the access token is refreshed if it is within
//!   [`REFRESH_MARGIN_SECS`](super::session::REFRESH_MARGIN_SECS) of expiry.
//! - A 401 triggers exactly one refresh-and-retry. Concurrent 401s share a
//!   single refresh through `refresh_gate`.
//! - A failed refresh ends the session; the user has to authorize again.

use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::playlist::playlist_uri;
use super::session::{AuthSession, PendingAuthorization};
use super::types::{
    AccountOverview, Device, DeviceList, Page, PlaybackSnapshot, PlaybackState, Playlist,
    UserProfile,
};
use crate::clock::Clock;
use crate::error::{AuthError, SpotifyError};
use crate::integrations::oauth::{
    authorization_url, generate_code_challenge, generate_code_verifier, generate_state,
    request_token, AuthorizationParams, AuthorizationRequest, CallbackParams, VERIFIER_LEN,
};
use crate::storage::{KvStore, SpotifyConfig};

/// Playlists fetched when a session is first connected.
pub const OVERVIEW_PLAYLIST_LIMIT: u32 = 50;

pub struct SpotifyClient {
    config: SpotifyConfig,
    http: Client,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    session: Mutex<AuthSession>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SpotifyClient {
    /// Build a client, restoring any persisted session from `store`.
    pub fn new(
        config: SpotifyConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SpotifyError> {
        let http = Client::builder()
            .user_agent(concat!("pomotune/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let session = AuthSession::load(store.as_ref())?;
        Ok(Self {
            config,
            http,
            store,
            clock,
            session: Mutex::new(session),
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &SpotifyConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, AuthSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn token_url(&self) -> String {
        format!("{}/api/token", self.config.accounts_url.trim_end_matches('/'))
    }

    fn authorize_url(&self) -> String {
        format!("{}/authorize", self.config.accounts_url.trim_end_matches('/'))
    }

    // ── Authorization ────────────────────────────────────────────────

    /// Start a PKCE authorization: persist a fresh verifier and state and
    /// return the URL to send the user agent to.
    pub fn build_authorization_url(&self) -> Result<AuthorizationRequest, AuthError> {
        if self.config.client_id.trim().is_empty() {
            return Err(AuthError::CredentialsNotConfigured);
        }
        let code_verifier = generate_code_verifier(VERIFIER_LEN);
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state()?;
        let authorize_url = self.authorize_url();

        let url = authorization_url(&AuthorizationParams {
            authorize_url: &authorize_url,
            client_id: &self.config.client_id,
            redirect_uri: &self.config.redirect_uri,
            scopes: &self.config.scopes,
            code_challenge: &code_challenge,
            state: &state,
        })?;

        PendingAuthorization {
            code_verifier,
            state: state.clone(),
        }
        .persist(self.store.as_ref())?;

        debug!("authorization started");
        Ok(AuthorizationRequest { url, state })
    }

    /// Finish an authorization from the redirect's query parameters.
    ///
    /// A forged or malformed callback is an error. A failed token exchange is
    /// logged and reported as `Ok(false)`.
    pub async fn complete_authorization(&self, params: &CallbackParams) -> Result<bool, AuthError> {
        if let Some(error) = &params.error {
            warn!(%error, "authorization denied");
            PendingAuthorization::clear(self.store.as_ref())?;
            return Err(AuthError::Denied(error.clone()));
        }
        let code = params.code.as_deref().ok_or(AuthError::MissingParameter("code"))?;
        let state = params.state.as_deref().ok_or(AuthError::MissingParameter("state"))?;

        let pending = PendingAuthorization::load(self.store.as_ref())?
            .ok_or(AuthError::NoPendingAuthorization)?;
        if pending.state != state {
            warn!("authorization callback state mismatch");
            return Err(AuthError::StateMismatch);
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", pending.code_verifier.as_str()),
        ];
        let result = request_token(&self.http, &self.token_url(), &form).await;
        PendingAuthorization::clear(self.store.as_ref())?;

        match result {
            Ok(tokens) => {
                let session = AuthSession::issued(
                    self.clock.now(),
                    tokens.access_token,
                    tokens.expires_in,
                    tokens.refresh_token,
                    None,
                );
                session.persist(self.store.as_ref())?;
                *self.session() = session;
                info!("spotify session established");
                Ok(true)
            }
            Err(message) => {
                warn!(error = %message, "token exchange failed");
                Ok(false)
            }
        }
    }

    /// Parse a raw callback query string and complete the authorization.
    pub async fn handle_callback(&self, query: &str) -> Result<bool, AuthError> {
        self.complete_authorization(&CallbackParams::from_query(query))
            .await
    }

    // ── Session ──────────────────────────────────────────────────────

    /// A token is present and not yet expired.
    pub fn is_authenticated(&self) -> bool {
        self.session().is_valid(self.clock.now())
    }

    /// A token is present, possibly expired but refreshable.
    pub fn has_session(&self) -> bool {
        self.session().has_access_token()
    }

    /// Drop every credential from memory and storage. Safe to call when
    /// already logged out.
    pub fn logout(&self) {
        *self.session() = AuthSession::default();
        if let Err(e) = AuthSession::clear(self.store.as_ref()) {
            warn!(error = %e, "failed to clear stored tokens");
        }
        if let Err(e) = PendingAuthorization::clear(self.store.as_ref()) {
            warn!(error = %e, "failed to clear pending authorization");
        }
        debug!("spotify session cleared");
    }

    /// Return a usable access token, refreshing first when it is about to
    /// expire.
    pub async fn ensure_valid_token(&self) -> Result<String, SpotifyError> {
        let now = self.clock.now();
        let (token, stale) = {
            let session = self.session();
            (session.access_token.clone(), session.needs_refresh(now))
        };
        let token = token.ok_or(SpotifyError::AuthRequired)?;
        if !stale {
            return Ok(token);
        }
        debug!("access token near expiry, refreshing");
        self.refresh_single_flight(&token).await.map_err(|e| {
            warn!(error = %e, "proactive refresh failed");
            SpotifyError::AuthFailed
        })
    }

    /// Refresh the access token now, regardless of expiry.
    pub async fn refresh_access_token(&self) -> Result<(), AuthError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await.map(|_| ())
    }

    /// Refresh unless another caller already replaced `stale`.
    async fn refresh_single_flight(&self, stale: &str) -> Result<String, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        let current = self.session().access_token.clone();
        match current {
            None => Err(AuthError::TokenRefreshFailed("session ended".into())),
            Some(current) if current != stale => Ok(current),
            Some(_) => self.refresh_locked().await,
        }
    }

    /// Caller must hold `refresh_gate`.
    async fn refresh_locked(&self) -> Result<String, AuthError> {
        let refresh_token = self.session().refresh_token.clone();
        let Some(refresh_token) = refresh_token else {
            self.logout();
            return Err(AuthError::TokenRefreshFailed("no refresh token".into()));
        };

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        match request_token(&self.http, &self.token_url(), &form).await {
            Ok(tokens) => {
                let session = AuthSession::issued(
                    self.clock.now(),
                    tokens.access_token.clone(),
                    tokens.expires_in,
                    tokens.refresh_token,
                    Some(refresh_token.clone()),
                );
                // Logout or a new authorization may have replaced the session
                // while the POST was in flight.
                let mut current = self.session();
                if current.refresh_token.as_deref() != Some(refresh_token.as_str()) {
                    debug!("session changed during refresh, discarding tokens");
                    return Err(AuthError::TokenRefreshFailed("session ended".into()));
                }
                session.persist(self.store.as_ref())?;
                *current = session;
                drop(current);
                debug!("access token refreshed");
                Ok(tokens.access_token)
            }
            Err(message) => {
                warn!(error = %message, "token refresh failed, logging out");
                // Don't end a session that replaced the one being refreshed.
                let replaced = self.session().refresh_token.as_deref() != Some(refresh_token.as_str());
                if !replaced {
                    self.logout();
                }
                Err(AuthError::TokenRefreshFailed(message))
            }
        }
    }

    // ── Request layer ────────────────────────────────────────────────

    /// Authenticated JSON request against the API host.
    ///
    /// Returns `None` for empty or non-JSON success bodies.
    pub async fn api_request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, SpotifyError> {
        let token = self.ensure_valid_token().await?;
        let mut resp = self.send(method.clone(), endpoint, query, body, &token).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!(endpoint, "401 from api, refreshing once");
            let fresh = match self.refresh_single_flight(&token).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(error = %e, "refresh after 401 failed");
                    return Err(SpotifyError::AuthFailed);
                }
            };
            resp = self.send(method, endpoint, query, body, &fresh).await?;
            if resp.status() == StatusCode::UNAUTHORIZED {
                warn!(endpoint, "still unauthorized after refresh, logging out");
                self.logout();
                return Err(SpotifyError::AuthFailed);
            }
        }

        Self::decode(resp).await
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> Result<Response, SpotifyError> {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), endpoint);
        let is_get = method == Method::GET;
        let mut req = self.http.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        req = match body {
            Some(body) => req.json(body),
            None if !is_get => req.header(CONTENT_LENGTH, 0),
            None => req,
        };
        Ok(req.send().await?)
    }

    async fn decode(resp: Response) -> Result<Option<Value>, SpotifyError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let bytes = resp.bytes().await?;
        if status == StatusCode::NO_CONTENT || !is_json || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, SpotifyError> {
        match self.api_request(Method::GET, endpoint, query, None).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(SpotifyError::EmptyResponse),
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// `None` when nothing is playing or there is no active device.
    pub async fn get_current_playback(&self) -> Result<Option<PlaybackState>, SpotifyError> {
        match self.api_request(Method::GET, "/me/player", &[], None).await {
            Ok(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            Ok(None) => Ok(None),
            Err(SpotifyError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_playback_snapshot(&self) -> Result<Option<PlaybackSnapshot>, SpotifyError> {
        Ok(self
            .get_current_playback()
            .await?
            .as_ref()
            .map(PlaybackSnapshot::from))
    }

    pub async fn get_devices(&self) -> Result<Vec<Device>, SpotifyError> {
        let list: DeviceList = self.get_json("/me/player/devices", &[]).await?;
        Ok(list.devices)
    }

    /// Start or resume playback. With neither a context nor track URIs the
    /// current context resumes.
    pub async fn play(
        &self,
        device_id: Option<&str>,
        context_uri: Option<&str>,
        uris: Option<&[String]>,
    ) -> Result<(), SpotifyError> {
        let mut body = Map::new();
        if let Some(context_uri) = context_uri {
            body.insert("context_uri".into(), json!(context_uri));
        }
        if let Some(uris) = uris {
            body.insert("uris".into(), json!(uris));
        }
        let query = device_query(device_id);
        self.api_request(Method::PUT, "/me/player/play", &query, Some(&Value::Object(body)))
            .await?;
        Ok(())
    }

    /// Play a playlist from the start.
    pub async fn play_playlist(
        &self,
        playlist_id: &str,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        self.play(device_id, Some(&playlist_uri(playlist_id)), None)
            .await
    }

    pub async fn pause(&self, device_id: Option<&str>) -> Result<(), SpotifyError> {
        let query = device_query(device_id);
        self.api_request(Method::PUT, "/me/player/pause", &query, None)
            .await?;
        Ok(())
    }

    /// `percent` is passed through unchanged; the provider enforces 0-100.
    pub async fn set_volume(&self, percent: u32, device_id: Option<&str>) -> Result<(), SpotifyError> {
        let mut query = vec![("volume_percent", percent.to_string())];
        query.extend(device_query(device_id));
        self.api_request(Method::PUT, "/me/player/volume", &query, None)
            .await?;
        Ok(())
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Playlist, SpotifyError> {
        self.get_json(&format!("/playlists/{playlist_id}"), &[]).await
    }

    pub async fn get_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Playlist>, SpotifyError> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        self.get_json("/me/playlists", &query).await
    }

    pub async fn get_user_profile(&self) -> Result<UserProfile, SpotifyError> {
        self.get_json("/me", &[]).await
    }

    /// Profile, devices and the first page of playlists, fetched together.
    pub async fn load_overview(&self) -> Result<AccountOverview, SpotifyError> {
        let (profile, devices, playlists) = tokio::try_join!(
            self.get_user_profile(),
            self.get_devices(),
            self.get_user_playlists(OVERVIEW_PLAYLIST_LIMIT, 0),
        )?;
        Ok(AccountOverview {
            profile,
            devices,
            playlists: playlists.items,
        })
    }

    /// Device to target: the configured one, else whatever Spotify reports
    /// as active, else the first listed.
    pub async fn resolve_device(&self) -> Result<Option<String>, SpotifyError> {
        if let Some(id) = self.config.device_id.as_deref() {
            return Ok(Some(id.to_string()));
        }
        let devices = self.get_devices().await?;
        Ok(pick_device(None, &devices))
    }
}

/// Choose a playback device from a device list.
pub fn pick_device(preferred: Option<&str>, devices: &[Device]) -> Option<String> {
    if let Some(id) = preferred {
        return Some(id.to_string());
    }
    devices
        .iter()
        .find(|d| d.is_active && d.id.is_some())
        .or_else(|| devices.iter().find(|d| d.id.is_some()))
        .and_then(|d| d.id.clone())
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, String)> {
    device_id
        .map(|id| vec![("device_id", id.to_string())])
        .unwrap_or_default()
}
