//! Web server for the bway-web browser client
//!
//! Serves the wasm client and its page, and bridges each browser WebSocket
//! on `/socket` to a fresh connection to the upstream Broadway daemon.

use crate::session;
use anyhow::{Context, Result};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

const DEFAULT_WWW: &str = "bway-web/www";

/// Run web server mode - serves bway-web and proxies to broadwayd
pub async fn run_web(port: u16, upstream: &str, www_path: Option<&str>) -> Result<()> {
    let upstream: Arc<str> = Arc::from(upstream);

    let app = Router::new()
        .route(
            "/socket",
            get(move |ws: WebSocketUpgrade| {
                let upstream = Arc::clone(&upstream);
                async move {
                    ws.protocols(["broadway"])
                        .on_upgrade(move |socket| handle_websocket(socket, upstream))
                }
            }),
        )
        .layer(CorsLayer::permissive())
        .fallback_service(ServeDir::new(www_path.unwrap_or(DEFAULT_WWW)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    eprintln!("web server: http://localhost:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_websocket(socket: WebSocket, upstream: Arc<str>) {
    eprintln!("browser connected");

    let daemon = match session::connect(&upstream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("upstream unavailable: {:#}", e);
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut up_tx, mut up_rx) = daemon.split();

    // Commands from the daemon to the browser
    let send_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = up_rx.next().await {
            match msg {
                UpstreamMessage::Binary(data) => {
                    if ws_tx.send(Message::Binary(data)).await.is_err() {
                        break;
                    }
                }
                UpstreamMessage::Close(_) => break,
                _ => {}
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    // Events from the browser to the daemon
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Binary(data) => {
                    if up_tx.send(UpstreamMessage::Binary(data)).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = up_tx.send(UpstreamMessage::Close(None)).await;
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    eprintln!("browser disconnected");
}
