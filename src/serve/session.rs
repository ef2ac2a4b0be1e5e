// src/serve/session.rs

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::serve::RELOAD_MESSAGE;
use crate::serve::inject::inject_reload_script;
use crate::types::LIVERELOAD_PATH;

/// Handle to a running development server, shared by the serve and reload
/// actions. Cloning is cheap; all clones talk to the same clients.
#[derive(Debug, Clone)]
pub struct ServerSession {
    addr: SocketAddr,
    reload_tx: broadcast::Sender<()>,
}

impl ServerSession {
    /// Address the server is bound to (with the real port when 0 was asked).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Number of connected live-reload clients.
    pub fn client_count(&self) -> usize {
        self.reload_tx.receiver_count()
    }

    /// Ask every connected browser to reload. Returns how many clients were
    /// notified.
    pub fn reload(&self) -> usize {
        self.reload_tx.send(()).unwrap_or(0)
    }
}

/// A bound server plus the task serving it.
#[derive(Debug)]
pub struct RunningServer {
    pub session: ServerSession,
    pub handle: JoinHandle<Result<()>>,
}

/// Bind `host:port` and start serving `base_dir`. Returns once the socket is
/// bound, so the caller can report the server as up.
pub async fn start_server(base_dir: PathBuf, host: &str, port: u16) -> Result<RunningServer> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding development server to {host}:{port}"))?;
    let addr = listener
        .local_addr()
        .context("reading development server address")?;

    let (reload_tx, _) = broadcast::channel(16);
    let app = router(base_dir.clone(), reload_tx.clone());

    info!(%addr, base_dir = %base_dir.display(), "development server listening");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .context("development server stopped")
    });

    Ok(RunningServer {
        session: ServerSession { addr, reload_tx },
        handle,
    })
}

fn router(base_dir: PathBuf, reload_tx: broadcast::Sender<()>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_ws))
        .fallback_service(ServeDir::new(base_dir))
        .layer(middleware::from_fn(inject_reload_script))
        .layer(TraceLayer::new_for_http())
        .with_state(reload_tx)
}

async fn livereload_ws(
    ws: WebSocketUpgrade,
    State(reload_tx): State<broadcast::Sender<()>>,
) -> impl IntoResponse {
    let reload_rx = reload_tx.subscribe();
    ws.on_upgrade(move |socket| client_loop(socket, reload_rx))
}

/// Forward reload signals to one browser until either side goes away.
async fn client_loop(socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    debug!("live-reload client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match reload_rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if ws_sender
                        .send(Message::Text(RELOAD_MESSAGE.to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Browsers never send anything meaningful; drain until close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    debug!("live-reload client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ephemeral_port_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_server(dir.path().to_path_buf(), "127.0.0.1", 0)
            .await
            .unwrap();

        assert_ne!(server.session.addr().port(), 0);
        assert!(server.session.url().starts_with("http://127.0.0.1:"));
        assert_eq!(server.session.client_count(), 0);
        assert_eq!(server.session.reload(), 0);

        server.handle.abort();
    }
}
