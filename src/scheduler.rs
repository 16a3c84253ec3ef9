//! Frame scheduler
//!
//! Mutations pile up across processing passes and go out as one batch on the
//! next refresh. A batch that introduced textures waits until every one of
//! them has loaded.

use crate::display::{DisplayMutation, RenderSink};
use crate::error::ProtocolError;
use crate::texture::{ResourceLoader, TextureCache, TextureLoad};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct FrameScheduler {
    queue: Vec<DisplayMutation>,
    /// Surfaces whose node tree changed in the pending batch
    modified: HashSet<u16>,
    /// Loads not yet handed to the host
    loads: Vec<TextureLoad>,
    /// Loads handed out or queued but not yet settled
    outstanding: usize,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self) -> &mut Vec<DisplayMutation> {
        &mut self.queue
    }

    pub fn pending(&self) -> &[DisplayMutation] {
        &self.queue
    }

    pub fn mark_modified(&mut self, surface: u16) {
        self.modified.insert(surface);
    }

    pub fn is_modified(&self, surface: u16) -> bool {
        self.modified.contains(&surface)
    }

    pub fn track_load(&mut self, load: TextureLoad) {
        self.outstanding += 1;
        self.loads.push(load);
    }

    /// Loads the host should drive to completion
    pub fn take_loads(&mut self) -> Vec<TextureLoad> {
        std::mem::take(&mut self.loads)
    }

    pub fn load_settled(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    pub fn is_waiting_for_textures(&self) -> bool {
        self.outstanding > 0
    }

    /// Ready to flush on the next refresh. A tree update that produced no
    /// mutations still has to be flushed to clear its surface's mark.
    pub fn wants_frame(&self) -> bool {
        (!self.queue.is_empty() || !self.modified.is_empty()) && !self.is_waiting_for_textures()
    }

    /// Apply the whole pending batch to the sink.
    ///
    /// Texture-bound elements get the locator of their texture; the binding
    /// reference taken during decoding is dropped once the sink holds the
    /// image.
    pub fn flush(
        &mut self,
        sink: &mut dyn RenderSink,
        textures: &mut TextureCache,
        loader: &mut dyn ResourceLoader,
    ) -> Result<usize, ProtocolError> {
        let batch = std::mem::take(&mut self.queue);
        let count = batch.len();
        self.modified.clear();
        if batch.is_empty() {
            return Ok(0);
        }

        sink.begin_batch();
        for mutation in batch {
            match mutation {
                DisplayMutation::CreateRoot {
                    surface,
                    element,
                    x,
                    y,
                    width,
                    height,
                } => sink.create_root(surface, element, x, y, width, height),
                DisplayMutation::Create { element, visual } => {
                    let bound = visual.texture();
                    let image = bound
                        .and_then(|id| textures.get(id))
                        .and_then(|t| t.locator());
                    sink.create(element, &visual, image);
                    if let Some(id) = bound {
                        textures.release(id, loader)?;
                    }
                }
                DisplayMutation::Append { parent, child } => sink.append(parent, child),
                DisplayMutation::InsertAfter {
                    parent,
                    sibling,
                    child,
                } => sink.insert_after(parent, sibling, child),
                DisplayMutation::Remove(element) => sink.remove(element),
                DisplayMutation::Discard(element) => sink.discard(element),
                DisplayMutation::Move { element, x, y } => sink.reposition(element, x, y),
                DisplayMutation::Resize {
                    element,
                    width,
                    height,
                } => sink.resize(element, width, height),
                DisplayMutation::SetImage { element, texture } => {
                    let image = textures.get(texture).and_then(|t| t.locator());
                    sink.set_image(element, image);
                    textures.release(texture, loader)?;
                }
                DisplayMutation::SetTransform { element, transform } => {
                    sink.set_transform(element, &transform)
                }
                DisplayMutation::SetVisible { element, visible } => {
                    sink.set_visible(element, visible)
                }
                DisplayMutation::Restack(order) => sink.restack(&order),
                DisplayMutation::ShowKeyboard(show) => sink.show_keyboard(show),
            }
        }
        sink.end_batch();

        log::trace!("flushed {} mutations", count);
        Ok(count)
    }
}
