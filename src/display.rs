//! Deferred display mutations and the render sink seam
//!
//! The command processor never draws. It queues [`DisplayMutation`]s which the
//! frame scheduler hands to a [`RenderSink`] as one batch per refresh.

use crate::scene::{ElementId, Transform, Visual};
use crate::texture::Locator;

/// One queued instruction for the render sink
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayMutation {
    /// New top-level element for a surface
    CreateRoot {
        surface: u16,
        element: ElementId,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    },
    /// New detached element
    Create {
        element: ElementId,
        visual: Visual,
    },
    Append {
        parent: ElementId,
        child: ElementId,
    },
    /// Attach after `sibling`, or as first child
    InsertAfter {
        parent: ElementId,
        sibling: Option<ElementId>,
        child: ElementId,
    },
    /// Detach from the visible tree
    Remove(ElementId),
    /// Element is gone for good; the sink may drop it
    Discard(ElementId),
    Move {
        element: ElementId,
        x: i16,
        y: i16,
    },
    Resize {
        element: ElementId,
        width: u16,
        height: u16,
    },
    SetImage {
        element: ElementId,
        texture: u32,
    },
    SetTransform {
        element: ElementId,
        transform: Transform,
    },
    SetVisible {
        element: ElementId,
        visible: bool,
    },
    /// Root elements back to front
    Restack(Vec<ElementId>),
    ShowKeyboard(bool),
}

/// Host rendering backend (DOM, canvas, log)
///
/// Geometry is never read back; the server is authoritative.
pub trait RenderSink {
    fn begin_batch(&mut self) {}

    fn end_batch(&mut self) {}

    fn create_root(&mut self, surface: u16, element: ElementId, x: i16, y: i16, width: u16, height: u16);

    /// `image` is set for texture elements whose texture has loaded
    fn create(&mut self, element: ElementId, visual: &Visual, image: Option<&Locator>);

    fn append(&mut self, parent: ElementId, child: ElementId);

    fn insert_after(&mut self, parent: ElementId, sibling: Option<ElementId>, child: ElementId);

    fn remove(&mut self, element: ElementId);

    fn discard(&mut self, element: ElementId);

    fn reposition(&mut self, element: ElementId, x: i16, y: i16);

    fn resize(&mut self, element: ElementId, width: u16, height: u16);

    fn set_image(&mut self, element: ElementId, image: Option<&Locator>);

    fn set_transform(&mut self, element: ElementId, transform: &Transform);

    fn set_visible(&mut self, element: ElementId, visible: bool);

    fn restack(&mut self, order: &[ElementId]);

    fn show_keyboard(&mut self, _show: bool) {}
}

/// What a [`RecordingSink`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    CreateRoot {
        surface: u16,
        element: ElementId,
    },
    Create {
        element: ElementId,
        visual: Visual,
        image: Option<Locator>,
    },
    Append {
        parent: ElementId,
        child: ElementId,
    },
    InsertAfter {
        parent: ElementId,
        sibling: Option<ElementId>,
        child: ElementId,
    },
    Remove(ElementId),
    Discard(ElementId),
    Reposition {
        element: ElementId,
        x: i16,
        y: i16,
    },
    Resize {
        element: ElementId,
        width: u16,
        height: u16,
    },
    SetImage {
        element: ElementId,
        image: Option<Locator>,
    },
    SetTransform {
        element: ElementId,
        css: String,
    },
    SetVisible {
        element: ElementId,
        visible: bool,
    },
    Restack(Vec<ElementId>),
    ShowKeyboard(bool),
}

/// Sink that records every call, one `Vec` per batch
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub batches: Vec<Vec<SinkOp>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_batch(&self) -> &[SinkOp] {
        self.batches.last().map(Vec::as_slice).unwrap_or(&[])
    }

    fn push(&mut self, op: SinkOp) {
        match self.batches.last_mut() {
            Some(batch) => batch.push(op),
            None => self.batches.push(vec![op]),
        }
    }
}

impl RenderSink for RecordingSink {
    fn begin_batch(&mut self) {
        self.batches.push(Vec::new());
    }

    fn create_root(&mut self, surface: u16, element: ElementId, _x: i16, _y: i16, _w: u16, _h: u16) {
        self.push(SinkOp::CreateRoot { surface, element });
    }

    fn create(&mut self, element: ElementId, visual: &Visual, image: Option<&Locator>) {
        self.push(SinkOp::Create {
            element,
            visual: visual.clone(),
            image: image.cloned(),
        });
    }

    fn append(&mut self, parent: ElementId, child: ElementId) {
        self.push(SinkOp::Append { parent, child });
    }

    fn insert_after(&mut self, parent: ElementId, sibling: Option<ElementId>, child: ElementId) {
        self.push(SinkOp::InsertAfter {
            parent,
            sibling,
            child,
        });
    }

    fn remove(&mut self, element: ElementId) {
        self.push(SinkOp::Remove(element));
    }

    fn discard(&mut self, element: ElementId) {
        self.push(SinkOp::Discard(element));
    }

    fn reposition(&mut self, element: ElementId, x: i16, y: i16) {
        self.push(SinkOp::Reposition { element, x, y });
    }

    fn resize(&mut self, element: ElementId, width: u16, height: u16) {
        self.push(SinkOp::Resize {
            element,
            width,
            height,
        });
    }

    fn set_image(&mut self, element: ElementId, image: Option<&Locator>) {
        self.push(SinkOp::SetImage {
            element,
            image: image.cloned(),
        });
    }

    fn set_transform(&mut self, element: ElementId, transform: &Transform) {
        self.push(SinkOp::SetTransform {
            element,
            css: transform.css(),
        });
    }

    fn set_visible(&mut self, element: ElementId, visible: bool) {
        self.push(SinkOp::SetVisible { element, visible });
    }

    fn restack(&mut self, order: &[ElementId]) {
        self.push(SinkOp::Restack(order.to_vec()));
    }

    fn show_keyboard(&mut self, show: bool) {
        self.push(SinkOp::ShowKeyboard(show));
    }
}
