use clap::Subcommand;
use pomotune_core::integrations::oauth::redact_callback_url;
use pomotune_core::CallbackParams;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::context::{AppContext, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Authorize with Spotify in the browser
    Login {
        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

pub async fn run(action: AuthAction) -> CliResult {
    let ctx = AppContext::open()?;
    let client = ctx.spotify()?;

    match action {
        AuthAction::Login { no_browser } => {
            let redirect = Url::parse(&client.config().redirect_uri)?;
            let host = redirect.host_str().unwrap_or("127.0.0.1").to_string();
            let port = redirect.port_or_known_default().unwrap_or(80);
            let listener = TcpListener::bind((host.as_str(), port)).await?;

            let request = client.build_authorization_url()?;
            if no_browser || open::that(request.url.as_str()).is_err() {
                println!("Open this URL to authorize:\n{}", request.url);
            } else {
                println!("Waiting for authorization in the browser...");
            }

            let (stream, callback) = accept_callback(&listener, &redirect).await?;
            tracing::debug!(url = %redact_callback_url(&callback), "callback received");
            let params = CallbackParams::from_url(&callback);
            let outcome = client.complete_authorization(&params).await;

            let ok = matches!(outcome, Ok(true));
            let (status, page) = if ok {
                ("200 OK", "Pomotune is connected to Spotify. You can close this tab.")
            } else {
                ("400 Bad Request", "Authorization failed. Return to the terminal.")
            };
            respond(stream, status, page).await;

            if !outcome? {
                return Err("token exchange failed".into());
            }
            let overview = client.load_overview().await?;
            println!(
                "Logged in as {} ({} devices, {} playlists)",
                overview.profile.name(),
                overview.devices.len(),
                overview.playlists.len()
            );
        }
        AuthAction::Logout => {
            client.logout();
            println!("Spotify credentials removed");
        }
        AuthAction::Status => {
            let status = serde_json::json!({
                "authenticated": client.is_authenticated(),
                "session": client.has_session(),
                "client_id_configured": !client.config().client_id.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

/// Wait for the browser to hit the redirect path. Returns the connection,
/// kept open for the response page, and the full callback URL. Unrelated
/// requests (favicon) get a 404.
async fn accept_callback(listener: &TcpListener, redirect: &Url) -> CliResult<(TcpStream, Url)> {
    loop {
        let (mut stream, _) = listener.accept().await?;
        let mut buf = vec![0u8; 8192];
        let n = stream.read(&mut buf).await?;
        let head = String::from_utf8_lossy(&buf[..n]);
        let target = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("/");
        let url = redirect.join(target)?;
        if url.path() == redirect.path() {
            return Ok((stream, url));
        }
        let _ = stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
    }
}

async fn respond(mut stream: TcpStream, status: &str, message: &str) {
    let body = format!(
        "<!doctype html><html><head><title>Pomotune</title></head>\
         <body style=\"font-family:sans-serif;text-align:center;margin-top:4em\">\
         <p>{message}</p></body></html>"
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
