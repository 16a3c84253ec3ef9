//! Error types

use thiserror::Error;

/// Fatal protocol errors.
///
/// Any of these means the server and client disagree about the stream, so the
/// persistent id maps can no longer be trusted. The client stops processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("read past end of buffer at offset {offset}: wanted {wanted} bytes, {available} available")]
    Overrun {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("unknown command opcode {0}")]
    UnknownOpcode(u8),

    #[error("unknown node operation {0}")]
    UnknownNodeOp(u32),

    #[error("unknown render node type {0}")]
    UnknownNodeType(u32),

    #[error("unknown transform type {0}")]
    UnknownTransform(u32),

    #[error("unknown surface {0}")]
    UnknownSurface(u16),

    #[error("surface {0} already exists")]
    DuplicateSurface(u16),

    #[error("unknown texture {0}")]
    UnknownTexture(u32),

    #[error("texture {0} uploaded while still alive")]
    DuplicateTexture(u32),

    #[error("unknown render node {0}")]
    UnknownNode(u32),

    #[error("render node {0} placed twice in one update")]
    NodePlacedTwice(u32),

    #[error("render node {node} is not a {expected} node")]
    NodeKindMismatch { node: u32, expected: &'static str },

    #[error("sibling element is not a child of the target parent")]
    SiblingMismatch,

    #[error("render node tree nested deeper than {0} levels")]
    NodeTreeTooDeep(usize),
}

/// Image resource failures. Recoverable: the bound element stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("image data is not a PNG stream")]
    NotPng,

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("load was cancelled")]
    Cancelled,
}
