//! bway - Broadway remote display client
//!
//! Talks to a GTK Broadway daemon (`broadwayd`, `GDK_BACKEND=broadway`).
//!
//! # Headless session
//!
//! ```text
//! bway connect ws://127.0.0.1:8080/socket   → mirrors surfaces, logs frames
//! ```
//!
//! # Browser
//!
//! ```text
//! bway serve --upstream ws://127.0.0.1:8080/socket
//! open http://localhost:8081                → bway-web renders in the page
//! ```

mod session;
mod web;

use anyhow::Result;
use clap::{Parser, Subcommand};
use session::SessionConfig;

#[derive(Parser)]
#[command(name = "bway")]
#[command(about = "Broadway remote display client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a daemon and mirror its display without rendering
    Connect {
        /// Daemon WebSocket url (e.g., ws://127.0.0.1:8080/socket)
        url: String,

        /// Reported screen width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Reported screen height
        #[arg(long, default_value = "800")]
        height: u32,

        /// Display refresh rate driving batch flushes
        #[arg(long, default_value = "60")]
        fps: u32,
    },

    /// Serve the browser client and bridge it to a daemon
    Serve {
        /// HTTP port
        #[arg(short, long, default_value = "8081")]
        port: u16,

        /// Daemon WebSocket url
        #[arg(short, long, default_value = "ws://127.0.0.1:8080/socket")]
        upstream: String,

        /// Directory holding index.html and the wasm package
        #[arg(long)]
        www: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tungstenite=warn".parse()?)
                .add_directive("hyper=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Connect {
            url,
            width,
            height,
            fps,
        } => session::run(SessionConfig::new(&url, width, height, fps)).await,
        Commands::Serve {
            port,
            upstream,
            www,
        } => web::run_web(port, &upstream, www.as_deref()).await,
    }
}
