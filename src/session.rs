//! Headless session against a Broadway daemon
//!
//! Runs the full client over a WebSocket: commands are processed, textures
//! validated, batches flushed on a fixed refresh tick into a sink that only
//! logs, and every reply the daemon expects is sent back.

use anyhow::{Context, Result};
use bway::texture::HeaderLoader;
use bway::{Client, ElementId, Locator, RenderSink, Visual};
use futures_util::future::join_all;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings for one `connect` session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub frame_interval: Duration,
}

impl SessionConfig {
    pub fn new(url: &str, width: u32, height: u32, fps: u32) -> Self {
        Self {
            url: url.to_string(),
            width,
            height,
            frame_interval: Duration::from_micros(1_000_000 / fps.max(1) as u64),
        }
    }
}

/// Open a WebSocket to a daemon speaking the `broadway` subprotocol
pub async fn connect(url: &str) -> Result<Upstream> {
    let mut request = url
        .into_client_request()
        .context("invalid broadway url")?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("broadway"));
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("failed to connect to {}", url))?;
    Ok(ws)
}

pub async fn run(config: SessionConfig) -> Result<()> {
    let ws = connect(&config.url).await?;
    eprintln!("connected to {}", config.url);
    let (mut tx, mut rx) = ws.split();

    let mut client = Client::new(HeaderLoader::new());
    let mut sink = TraceSink::default();
    let mut ticker = tokio::time::interval(config.frame_interval);
    let start = Instant::now();

    client.screen_resized(config.width, config.height);

    loop {
        tokio::select! {
            msg = rx.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    client.receive(data.to_vec())?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    client.disconnect();
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    client.disconnect();
                    return Err(e).context("websocket read failed");
                }
            },
            _ = ticker.tick() => {
                client.set_time(start.elapsed().as_millis() as u32);
                client.frame(&mut sink)?;
            }
        }

        let loads = client.take_texture_loads();
        if !loads.is_empty() {
            for outcome in join_all(loads).await {
                client.texture_loaded(outcome)?;
            }
        }

        for msg in client.take_outgoing() {
            tx.send(Message::Binary(msg.into()))
                .await
                .context("websocket write failed")?;
        }

        if !client.is_connected() {
            break;
        }
    }

    eprintln!(
        "disconnected after {} frames ({} elements live)",
        sink.batches,
        sink.live.len()
    );
    Ok(())
}

/// Sink that keeps only element bookkeeping and logs each call
#[derive(Debug, Default)]
pub struct TraceSink {
    batches: u64,
    ops: usize,
    live: HashSet<ElementId>,
}

impl RenderSink for TraceSink {
    fn begin_batch(&mut self) {
        self.ops = 0;
    }

    fn end_batch(&mut self) {
        self.batches += 1;
        log::debug!(
            "frame {}: {} ops, {} elements",
            self.batches,
            self.ops,
            self.live.len()
        );
    }

    fn create_root(&mut self, surface: u16, element: ElementId, x: i16, y: i16, width: u16, height: u16) {
        self.ops += 1;
        self.live.insert(element);
        log::info!("surface {} at {},{} {}x{}", surface, x, y, width, height);
    }

    fn create(&mut self, element: ElementId, visual: &Visual, image: Option<&Locator>) {
        self.ops += 1;
        self.live.insert(element);
        match image {
            Some(locator) => log::trace!("{:?} {:?} image {}", element, visual.kind(), locator.as_str()),
            None => log::trace!("{:?} {:?}", element, visual.kind()),
        }
    }

    fn append(&mut self, _parent: ElementId, _child: ElementId) {
        self.ops += 1;
    }

    fn insert_after(&mut self, _parent: ElementId, _sibling: Option<ElementId>, _child: ElementId) {
        self.ops += 1;
    }

    fn remove(&mut self, _element: ElementId) {
        self.ops += 1;
    }

    fn discard(&mut self, element: ElementId) {
        self.ops += 1;
        self.live.remove(&element);
    }

    fn reposition(&mut self, element: ElementId, x: i16, y: i16) {
        self.ops += 1;
        log::debug!("{:?} moved to {},{}", element, x, y);
    }

    fn resize(&mut self, element: ElementId, width: u16, height: u16) {
        self.ops += 1;
        log::debug!("{:?} resized to {}x{}", element, width, height);
    }

    fn set_image(&mut self, element: ElementId, image: Option<&Locator>) {
        self.ops += 1;
        log::trace!("{:?} image {:?}", element, image.map(Locator::as_str));
    }

    fn set_transform(&mut self, element: ElementId, transform: &bway::scene::Transform) {
        self.ops += 1;
        log::trace!("{:?} transform {}", element, transform.css());
    }

    fn set_visible(&mut self, element: ElementId, visible: bool) {
        self.ops += 1;
        log::debug!("{:?} visible={}", element, visible);
    }

    fn restack(&mut self, order: &[ElementId]) {
        self.ops += 1;
        log::debug!("restack {:?}", order);
    }
}
