//! Reference-counted texture registry
//!
//! Textures are uploaded as PNG bytes and decoded by the host's
//! [`ResourceLoader`]. Decoding is asynchronous: `upload` hands back a
//! [`TextureLoad`] future that the host drives and reports back through
//! [`TextureCache::complete`].

use crate::error::{LoadError, ProtocolError};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Host-loadable reference to a decoded image (a blob URL in the browser)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub type LoadFuture = LocalBoxFuture<'static, Result<Locator, LoadError>>;

/// Turns encoded image bytes into something the sink can display
pub trait ResourceLoader {
    /// Start decoding. The future resolves exactly once.
    fn load(&mut self, id: u32, bytes: Vec<u8>) -> LoadFuture;

    /// Free a locator produced by `load`
    fn release(&mut self, locator: &Locator);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadState {
    Pending,
    Ready(Locator),
    Failed,
}

#[derive(Debug)]
pub struct Texture {
    pub id: u32,
    refcount: u32,
    generation: u64,
    state: LoadState,
}

impl Texture {
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn locator(&self) -> Option<&Locator> {
        match &self.state {
            LoadState::Ready(locator) => Some(locator),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == LoadState::Pending
    }
}

/// Result of one texture decode
#[derive(Debug)]
pub struct LoadOutcome {
    pub id: u32,
    generation: u64,
    pub result: Result<Locator, LoadError>,
}

/// In-flight decode of one uploaded texture
pub struct TextureLoad {
    id: u32,
    generation: u64,
    future: LoadFuture,
}

impl TextureLoad {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl std::fmt::Debug for TextureLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureLoad")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Future for TextureLoad {
    type Output = LoadOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadOutcome> {
        let (id, generation) = (self.id, self.generation);
        self.future.as_mut().poll(cx).map(|result| LoadOutcome {
            id,
            generation,
            result,
        })
    }
}

/// Texture id → texture
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<u32, Texture>,
    next_generation: u64,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Create a texture at refcount 1 and start decoding it
    pub fn upload(
        &mut self,
        id: u32,
        bytes: Vec<u8>,
        loader: &mut dyn ResourceLoader,
    ) -> Result<TextureLoad, ProtocolError> {
        if self.textures.contains_key(&id) {
            return Err(ProtocolError::DuplicateTexture(id));
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        self.textures.insert(
            id,
            Texture {
                id,
                refcount: 1,
                generation,
                state: LoadState::Pending,
            },
        );

        Ok(TextureLoad {
            id,
            generation,
            future: loader.load(id, bytes),
        })
    }

    /// Take one more reference
    pub fn acquire(&mut self, id: u32) -> Result<&Texture, ProtocolError> {
        let texture = self
            .textures
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTexture(id))?;
        texture.refcount += 1;
        Ok(texture)
    }

    /// Drop one reference. Returns true when this freed the texture.
    pub fn release(
        &mut self,
        id: u32,
        loader: &mut dyn ResourceLoader,
    ) -> Result<bool, ProtocolError> {
        let texture = self
            .textures
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTexture(id))?;

        texture.refcount -= 1;
        if texture.refcount > 0 {
            return Ok(false);
        }

        if let Some(texture) = self.textures.remove(&id) {
            if let LoadState::Ready(locator) = &texture.state {
                loader.release(locator);
            }
        }
        log::debug!("texture {} freed", id);
        Ok(true)
    }

    /// Record a finished decode.
    ///
    /// A load whose texture was freed (or re-uploaded) meanwhile is an orphan:
    /// its resource is released straight away.
    pub fn complete(&mut self, outcome: LoadOutcome, loader: &mut dyn ResourceLoader) {
        let live = self
            .textures
            .get_mut(&outcome.id)
            .filter(|t| t.generation == outcome.generation);

        match (live, outcome.result) {
            (Some(texture), Ok(locator)) => texture.state = LoadState::Ready(locator),
            (Some(texture), Err(e)) => {
                log::warn!("texture {} failed to load: {}", outcome.id, e);
                texture.state = LoadState::Failed;
            }
            (None, Ok(locator)) => loader.release(&locator),
            (None, Err(_)) => {}
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Loader for hosts without an image decoder.
///
/// Checks the PNG signature and `IHDR` chunk and resolves immediately with a
/// `texture:<id>/<w>x<h>` locator.
#[derive(Debug, Default)]
pub struct HeaderLoader {
    live: HashMap<Locator, (u32, u32)>,
}

impl HeaderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locators handed out and not yet released
    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn dimensions(&self, locator: &Locator) -> Option<(u32, u32)> {
        self.live.get(locator).copied()
    }

    fn probe(bytes: &[u8]) -> Result<(u32, u32), LoadError> {
        if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
            return Err(LoadError::NotPng);
        }
        let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        if width == 0 || height == 0 {
            return Err(LoadError::Decode(format!("bad dimensions {}x{}", width, height)));
        }
        Ok((width, height))
    }
}

impl ResourceLoader for HeaderLoader {
    fn load(&mut self, id: u32, bytes: Vec<u8>) -> LoadFuture {
        let result = Self::probe(&bytes).map(|(w, h)| {
            let locator = Locator::new(format!("texture:{}/{}x{}", id, w, h));
            self.live.insert(locator.clone(), (w, h));
            locator
        });
        Box::pin(futures::future::ready(result))
    }

    fn release(&mut self, locator: &Locator) {
        self.live.remove(locator);
    }
}
