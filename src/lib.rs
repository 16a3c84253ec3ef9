//! bway - Broadway remote display client
//!
//! Decodes the command stream of a GTK Broadway daemon, mirrors its surfaces
//! and render-node trees, hands batched display mutations to a host
//! [`RenderSink`](display::RenderSink) once per refresh, and turns host input
//! into Broadway events.
//!
//! The core is platform-neutral. The `bway` binary drives it from tokio; the
//! `bway-web` crate drives it from the browser.

pub mod client;
pub mod command;
pub mod display;
pub mod error;
pub mod event;
pub mod input;
pub mod keysym;
pub mod protocol;
pub mod scene;
pub mod scheduler;
pub mod surface;
pub mod texture;
pub mod wire;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{Client, ClientState};
pub use command::Progress;
pub use display::{DisplayMutation, RenderSink};
pub use error::{LoadError, ProtocolError};
pub use scene::{ElementId, Visual};
pub use texture::{LoadFuture, LoadOutcome, Locator, ResourceLoader, TextureLoad};
