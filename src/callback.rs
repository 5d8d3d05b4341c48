// Loopback listener that receives the provider's login redirect

use anyhow::{Context, Result};
use axum::{
    extract::{RawQuery, State},
    response::Html,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

/// Seconds to wait for the redirect by default
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Spotify connected</title></head>
<body style="font-family:system-ui;text-align:center;padding:40px">
<h2>Connected &#10003;</h2><p>You can close this window and return to the terminal.</p>
</body></html>"#;

const IGNORED_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Waiting for Spotify</title></head>
<body style="font-family:system-ui;text-align:center;padding:40px">
<p>Waiting for the Spotify login redirect...</p>
</body></html>"#;

type QuerySender = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Bound callback listener for one login attempt
pub struct CallbackServer {
    listener: TcpListener,
    redirect_uri: Url,
}

impl CallbackServer {
    /// Bind the redirect URI's host and port
    pub async fn bind(redirect_uri: &Url) -> Result<Self> {
        let host = redirect_uri
            .host_str()
            .context("Redirect URI has no host")?
            .trim_start_matches('[')
            .trim_end_matches(']');
        let port = redirect_uri
            .port_or_known_default()
            .context("Redirect URI has no port")?;

        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind callback listener on {}:{}", host, port))?;

        let mut redirect_uri = redirect_uri.clone();
        let local_port = listener.local_addr()?.port();
        if redirect_uri.port_or_known_default() != Some(local_port) {
            // Port 0 was requested; report the one actually bound
            redirect_uri
                .set_port(Some(local_port))
                .map_err(|_| anyhow::anyhow!("Cannot set port on redirect URI"))?;
        }

        tracing::debug!(addr = %listener.local_addr()?, "Callback listener bound");

        Ok(Self {
            listener,
            redirect_uri,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Redirect URI as served (with the bound port)
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Serve until a request carrying `code` or `error` arrives, then
    /// return the full callback URL
    pub async fn wait(self, timeout: Duration) -> Result<Url> {
        let CallbackServer {
            listener,
            mut redirect_uri,
        } = self;

        let (query_tx, query_rx) = oneshot::channel::<String>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let sender: QuerySender = Arc::new(Mutex::new(Some(query_tx)));

        let app = Router::new()
            .route(redirect_uri.path(), get(handle_callback))
            .fallback(handle_other)
            .with_state(sender);

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let outcome = tokio::time::timeout(timeout, query_rx).await;

        let _ = shutdown_tx.send(());
        server.await.ok();

        let query = outcome
            .map_err(|_| {
                anyhow::anyhow!("Login redirect timed out ({} seconds)", timeout.as_secs())
            })?
            .context("Callback listener stopped before the redirect arrived")?;

        redirect_uri.set_query(Some(&query));
        tracing::info!("Login redirect received");
        Ok(redirect_uri)
    }
}

async fn handle_callback(
    State(sender): State<QuerySender>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    let Some(query) = query.filter(|q| is_login_redirect(q)) else {
        return Html(IGNORED_HTML);
    };

    let tx = sender.lock().ok().and_then(|mut slot| slot.take());
    if let Some(tx) = tx {
        let _ = tx.send(query);
    }

    Html(SUCCESS_HTML)
}

/// favicon and other stray hits
async fn handle_other() -> Html<&'static str> {
    Html(IGNORED_HTML)
}

fn is_login_redirect(query: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes())
        .any(|(key, value)| (key == "code" || key == "error") && !value.is_empty())
}
