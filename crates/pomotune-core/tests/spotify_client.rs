//! Spotify client against a mock accounts/API host.
//!
//! Covers the authorization callback, proactive and 401-driven refresh,
//! single-flight refresh under concurrency, and logout.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use pomotune_core::integrations::spotify::session::{
    ACCESS_TOKEN_KEY, CODE_VERIFIER_KEY, REFRESH_TOKEN_KEY, STATE_KEY,
};
use pomotune_core::integrations::spotify::{AuthSession, PlaylistBindings};
use pomotune_core::storage::SpotifyConfig;
use pomotune_core::{
    AuthError, CallbackParams, Event, KvStore, ManualClock, MemoryStore, PlaybackSync,
    SessionKind, SpotifyClient, SpotifyError, TransitionReason,
};
use serde_json::json;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
}

fn config(server: &ServerGuard) -> SpotifyConfig {
    SpotifyConfig {
        client_id: "test-client".into(),
        accounts_url: server.url(),
        api_url: server.url(),
        ..Default::default()
    }
}

/// Store holding a session whose access token expires `expires_in` from t0.
fn seeded_store(access: &str, refresh: &str, expires_in: Duration) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    AuthSession {
        access_token: Some(access.into()),
        refresh_token: Some(refresh.into()),
        expires_at: Some(t0() + expires_in),
    }
    .persist(store.as_ref())
    .unwrap();
    store
}

fn client(config: SpotifyConfig, store: Arc<MemoryStore>) -> (SpotifyClient, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let client = SpotifyClient::new(config, store, clock.clone()).unwrap();
    (client, clock)
}

const PROFILE: &str = r#"{"id":"u1","display_name":"Ada","images":[]}"#;

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let mut server = Server::new_async().await;
    let stale = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer old")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .expect(2)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer new")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE)
        .expect(2)
        .create_async()
        .await;
    let token = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"new","token_type":"Bearer","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("old", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store.clone());

    let (a, b) = tokio::join!(client.get_user_profile(), client.get_user_profile());
    assert_eq!(a.unwrap().name(), "Ada");
    assert_eq!(b.unwrap().name(), "Ada");

    token.assert_async().await;
    stale.assert_async().await;
    fresh.assert_async().await;

    // Refresh token kept when the provider does not rotate it.
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("new"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
}

#[tokio::test]
async fn logout_then_playback_fails_without_network() {
    let mut server = Server::new_async().await;
    let player = server
        .mock("GET", "/me/player")
        .expect(0)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store.clone());
    assert!(client.is_authenticated());

    client.logout();
    client.logout();

    let err = client.get_current_playback().await.unwrap_err();
    assert!(matches!(err, SpotifyError::AuthRequired), "got {err:?}");
    assert!(!client.has_session());
    assert!(store.is_empty());
    player.assert_async().await;
}

#[tokio::test]
async fn forged_callback_state_is_rejected() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (client, _clock) = client(config(&server), store.clone());
    let request = client.build_authorization_url().unwrap();
    assert!(request.url.as_str().starts_with(&format!("{}/authorize?", server.url())));

    let err = client
        .handle_callback("code=stolen&state=forged")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch), "got {err:?}");

    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert!(!client.has_session());
    // The genuine callback can still arrive.
    assert_eq!(store.get(STATE_KEY).unwrap().as_deref(), Some(request.state.as_str()));
    token.assert_async().await;
}

#[tokio::test]
async fn callback_completes_authorization() {
    let mut server = Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    let (client, _clock) = client(config(&server), store.clone());

    let request = client.build_authorization_url().unwrap();
    let verifier = store.get(CODE_VERIFIER_KEY).unwrap().unwrap();

    let token = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "abc".into()),
            Matcher::UrlEncoded("code_verifier".into(), verifier),
            Matcher::UrlEncoded("client_id".into(), "test-client".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"acc","refresh_token":"ref","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let mut callback = request.url.clone();
    callback.set_query(Some(&format!("code=abc&state={}", request.state)));
    let ok = client
        .complete_authorization(&CallbackParams::from_url(&callback))
        .await
        .unwrap();
    assert!(ok);
    assert!(client.is_authenticated());

    let session = AuthSession::load(store.as_ref()).unwrap();
    assert_eq!(session.access_token.as_deref(), Some("acc"));
    assert_eq!(session.refresh_token.as_deref(), Some("ref"));
    assert_eq!(session.expires_at, Some(t0() + Duration::seconds(3600)));
    assert_eq!(store.get(CODE_VERIFIER_KEY).unwrap(), None);
    assert_eq!(store.get(STATE_KEY).unwrap(), None);
    token.assert_async().await;
}

#[tokio::test]
async fn failed_exchange_reports_false() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (client, _clock) = client(config(&server), store.clone());
    let request = client.build_authorization_url().unwrap();

    let ok = client
        .handle_callback(&format!("?code=bad&state={}", request.state))
        .await
        .unwrap();
    assert!(!ok);
    assert!(!client.has_session());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn denied_and_malformed_callbacks() {
    let server = Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    let (client, _clock) = client(config(&server), store.clone());

    let err = client.handle_callback("state=s").await.unwrap_err();
    assert!(matches!(err, AuthError::MissingParameter("code")));

    let err = client.handle_callback("code=c&state=s").await.unwrap_err();
    assert!(matches!(err, AuthError::NoPendingAuthorization));

    client.build_authorization_url().unwrap();
    let err = client.handle_callback("error=access_denied").await.unwrap_err();
    assert!(matches!(err, AuthError::Denied(ref e) if e == "access_denied"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn missing_client_id_cannot_authorize() {
    let server = Server::new_async().await;
    let config = SpotifyConfig {
        client_id: String::new(),
        ..config(&server)
    };
    let (client, _clock) = client(config, Arc::new(MemoryStore::new()));
    assert!(matches!(
        client.build_authorization_url(),
        Err(AuthError::CredentialsNotConfigured)
    ));
}

#[tokio::test]
async fn token_near_expiry_is_refreshed_first() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_body(r#"{"access_token":"new","refresh_token":"r2","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;
    let me = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer new")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE)
        .expect(1)
        .create_async()
        .await;

    // 30s left is inside the refresh margin.
    let store = seeded_store("old", "r1", Duration::seconds(30));
    let (client, clock) = client(config(&server), store.clone());
    assert!(client.is_authenticated());

    client.get_user_profile().await.unwrap();
    token.assert_async().await;
    me.assert_async().await;
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r2"));

    clock.advance(Duration::hours(2));
    assert!(!client.is_authenticated());
    assert!(client.has_session());
}

#[tokio::test]
async fn failed_refresh_logs_out() {
    let mut server = Server::new_async().await;
    let _me = server
        .mock("GET", "/me")
        .with_status(401)
        .create_async()
        .await;
    let _token = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let store = seeded_store("old", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store.clone());

    let err = client.get_user_profile().await.unwrap_err();
    assert!(matches!(err, SpotifyError::AuthFailed), "got {err:?}");
    assert!(!client.has_session());
    assert!(store.is_empty());

    let err = client.get_user_profile().await.unwrap_err();
    assert!(matches!(err, SpotifyError::AuthRequired));
}

#[tokio::test]
async fn second_401_after_refresh_fails() {
    let mut server = Server::new_async().await;
    let _me = server
        .mock("GET", "/me")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    let token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_body(r#"{"access_token":"new","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("old", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store);

    let err = client.get_user_profile().await.unwrap_err();
    assert!(matches!(err, SpotifyError::AuthFailed), "got {err:?}");
    assert!(!client.has_session());
    token.assert_async().await;
}

#[tokio::test]
async fn api_error_carries_provider_message() {
    let mut server = Server::new_async().await;
    let _playlist = server
        .mock("GET", "/playlists/missing")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"status":404,"message":"Resource not found"}}"#)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store);

    match client.get_playlist("missing").await {
        Err(SpotifyError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Resource not found");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn no_active_device_is_not_an_error() {
    let mut server = Server::new_async().await;
    let _player = server
        .mock("GET", "/me/player")
        .with_status(204)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store);
    assert_eq!(client.get_current_playback().await.unwrap(), None);
    assert_eq!(client.get_playback_snapshot().await.unwrap(), None);
}

#[tokio::test]
async fn playback_commands_hit_player_endpoints() {
    let mut server = Server::new_async().await;
    let play = server
        .mock("PUT", "/me/player/play")
        .match_query(Matcher::UrlEncoded("device_id".into(), "dev1".into()))
        .match_body(Matcher::Json(json!({"context_uri": "spotify:playlist:abc"})))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let volume = server
        .mock("PUT", "/me/player/volume")
        .match_query(Matcher::UrlEncoded("volume_percent".into(), "150".into()))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let pause = server
        .mock("PUT", "/me/player/pause")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store);

    client.play_playlist("abc", Some("dev1")).await.unwrap();
    // Volume is passed through unclamped.
    client.set_volume(150, None).await.unwrap();
    client.pause(None).await.unwrap();

    play.assert_async().await;
    volume.assert_async().await;
    pause.assert_async().await;
}

#[tokio::test]
async fn overview_loads_profile_devices_and_playlists() {
    let mut server = Server::new_async().await;
    let _me = server
        .mock("GET", "/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE)
        .create_async()
        .await;
    let _devices = server
        .mock("GET", "/me/player/devices")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"devices":[{"id":"d1","is_active":true,"name":"Desk","type":"Computer","volume_percent":50}]}"#)
        .create_async()
        .await;
    let playlists = server
        .mock("GET", "/me/playlists")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "50".into()),
            Matcher::UrlEncoded("offset".into(), "0".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items":[{"id":"p1","name":"Deep Focus","uri":"spotify:playlist:p1","tracks":{"total":120}}],
                "total":1,"limit":50,"offset":0,"next":null}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store);

    let overview = client.load_overview().await.unwrap();
    assert_eq!(overview.profile.name(), "Ada");
    assert_eq!(overview.devices.len(), 1);
    assert_eq!(overview.playlists[0].name, "Deep Focus");
    assert_eq!(client.resolve_device().await.unwrap().as_deref(), Some("d1"));
    playlists.assert_async().await;
}

#[tokio::test]
async fn playback_sync_plays_bound_playlist_on_transition() {
    let mut server = Server::new_async().await;
    let play = server
        .mock("PUT", "/me/player/play")
        .match_query(Matcher::UrlEncoded("device_id".into(), "cfg-dev".into()))
        .match_body(Matcher::Json(json!({"context_uri": "spotify:playlist:chill"})))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let config = SpotifyConfig {
        device_id: Some("cfg-dev".into()),
        ..config(&server)
    };
    let (client, _clock) = client(config, store);

    let mut bindings = PlaylistBindings::default();
    bindings.set(SessionKind::ShortBreak, Some("chill".into()));
    let sync = PlaybackSync::new(Arc::new(client), bindings);

    sync.handle(&Event::SessionChanged {
        from: SessionKind::Work,
        to: SessionKind::ShortBreak,
        completed_work_sessions: 1,
        reason: TransitionReason::Completed,
        running: false,
    })
    .await;
    // Unbound kind leaves playback alone.
    assert!(!sync.switch_to(SessionKind::Work).await.unwrap());

    play.assert_async().await;
}

#[tokio::test]
async fn playback_failure_is_swallowed() {
    let mut server = Server::new_async().await;
    let _play = server
        .mock("PUT", "/me/player/play")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"status":404,"message":"Player command failed: No active device found"}}"#)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let config = SpotifyConfig {
        device_id: Some("gone".into()),
        ..config(&server)
    };
    let (client, _clock) = client(config, store);
    let mut bindings = PlaylistBindings::default();
    bindings.set(SessionKind::Work, Some("focus".into()));
    let sync = PlaybackSync::new(Arc::new(client), bindings);

    // Does not panic or propagate.
    sync.handle(&Event::SessionStarted {
        kind: SessionKind::Work,
        remaining_secs: 1500,
    })
    .await;

    let err = sync.switch_to(SessionKind::Work).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn logout_during_refresh_discards_new_tokens() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_millis(400));
            w.write_all(br#"{"access_token":"new","refresh_token":"r2","expires_in":3600}"#)
        })
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("old", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store.clone());

    let (refreshed, ()) = tokio::join!(client.refresh_access_token(), async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        client.logout();
    });

    assert!(matches!(refreshed, Err(AuthError::TokenRefreshFailed(_))), "got {refreshed:?}");
    assert!(!client.has_session());
    assert!(store.is_empty());
    token.assert_async().await;
}

#[tokio::test]
async fn missing_device_is_resolved_again() {
    let mut server = Server::new_async().await;
    let devices = server
        .mock("GET", "/me/player/devices")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"devices":[{"id":"d1","is_active":true,"name":"Desk","type":"Computer"}]}"#)
        .expect(2)
        .create_async()
        .await;
    let _play = server
        .mock("PUT", "/me/player/play")
        .match_query(Matcher::UrlEncoded("device_id".into(), "d1".into()))
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"status":404,"message":"Device not found"}}"#)
        .create_async()
        .await;

    let store = seeded_store("acc", "r1", Duration::hours(1));
    let (client, _clock) = client(config(&server), store);
    let mut bindings = PlaylistBindings::default();
    bindings.set(SessionKind::Work, Some("focus".into()));
    let sync = PlaybackSync::new(Arc::new(client), bindings);

    for _ in 0..2 {
        let err = sync.switch_to(SessionKind::Work).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
    devices.assert_async().await;
}
