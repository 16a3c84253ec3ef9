//! Builders for wire commands and node streams used across unit tests

use crate::error::LoadError;
use crate::protocol::{node_ops, opcodes, MOVE_RESIZE_POSITION, MOVE_RESIZE_SIZE};
use crate::scene::NodeKind;
use crate::texture::{LoadFuture, Locator, ResourceLoader};
use futures::channel::oneshot;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Smallest byte string that passes PNG header validation
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut b = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    b.extend_from_slice(&13u32.to_be_bytes());
    b.extend_from_slice(b"IHDR");
    b.extend_from_slice(&width.to_be_bytes());
    b.extend_from_slice(&height.to_be_bytes());
    b.extend_from_slice(&[8, 6, 0, 0, 0]);
    b
}

/// Loader that counts releases and keeps track of live locators
#[derive(Debug, Default)]
pub struct CountingLoader {
    pub loaded: usize,
    pub released: usize,
    live: HashSet<Locator>,
}

impl CountingLoader {
    pub fn live(&self) -> usize {
        self.live.len()
    }
}

impl ResourceLoader for CountingLoader {
    fn load(&mut self, id: u32, bytes: Vec<u8>) -> LoadFuture {
        let result = if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            self.loaded += 1;
            let locator = Locator::new(format!("counted:{}", id));
            self.live.insert(locator.clone());
            Ok(locator)
        } else {
            Err(LoadError::NotPng)
        };
        Box::pin(futures::future::ready(result))
    }

    fn release(&mut self, locator: &Locator) {
        self.released += 1;
        self.live.remove(locator);
    }
}

type Pending = Vec<(u32, oneshot::Sender<Result<Locator, LoadError>>)>;

/// Loader whose decodes finish only when the test says so.
///
/// Clones share the same pending set, so a test can keep one handle after
/// giving the loader to a client.
#[derive(Debug, Clone, Default)]
pub struct DeferredLoader {
    pending: Rc<RefCell<Pending>>,
}

impl DeferredLoader {
    pub fn resolve(&self, id: u32) {
        let mut pending = self.pending.borrow_mut();
        if let Some(index) = pending.iter().position(|(p, _)| *p == id) {
            let (_, tx) = pending.remove(index);
            let _ = tx.send(Ok(Locator::new(format!("deferred:{}", id))));
        }
    }

    /// Drop every sender; the loads resolve as cancelled
    pub fn cancel_all(&self) {
        self.pending.borrow_mut().clear();
    }
}

impl ResourceLoader for DeferredLoader {
    fn load(&mut self, id: u32, _bytes: Vec<u8>) -> LoadFuture {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push((id, tx));
        Box::pin(async move { rx.await.unwrap_or(Err(LoadError::Cancelled)) })
    }

    fn release(&mut self, _locator: &Locator) {}
}

/// Encodes a node-operation stream word by word
#[derive(Debug, Default)]
pub struct NodeStream {
    words: Vec<u32>,
}

impl NodeStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    pub fn raw(&mut self, words: &[u32]) -> &mut Self {
        self.words.extend_from_slice(words);
        self
    }

    fn floats(&mut self, values: &[f32]) -> &mut Self {
        self.words.extend(values.iter().map(|v| v.to_bits()));
        self
    }

    fn header(&mut self, kind: NodeKind, id: u32) -> &mut Self {
        self.raw(&[kind as u32, id])
    }

    /// Starts an insert; the next node record is the inserted subtree
    pub fn insert(&mut self, parent: u32, sibling: u32) -> &mut Self {
        self.raw(&[node_ops::INSERT_NODE, parent, sibling])
    }

    pub fn remove(&mut self, id: u32) -> &mut Self {
        self.raw(&[node_ops::REMOVE_NODE, id])
    }

    pub fn move_after(&mut self, parent: u32, sibling: u32, id: u32) -> &mut Self {
        self.raw(&[node_ops::MOVE_AFTER_CHILD, parent, sibling, id])
    }

    pub fn patch_texture(&mut self, id: u32, texture: u32) -> &mut Self {
        self.raw(&[node_ops::PATCH_TEXTURE, id, texture])
    }

    pub fn patch_translate(&mut self, id: u32, x: f32, y: f32) -> &mut Self {
        self.raw(&[node_ops::PATCH_TRANSFORM, id, 0]).floats(&[x, y])
    }

    /// Container header; the next `count` records are its children
    pub fn container(&mut self, id: u32, count: u32) -> &mut Self {
        self.header(NodeKind::Container, id).raw(&[count])
    }

    pub fn texture(&mut self, id: u32, rect: [f32; 4], texture: u32) -> &mut Self {
        self.header(NodeKind::Texture, id)
            .floats(&rect)
            .raw(&[texture])
    }

    pub fn color(&mut self, id: u32, rect: [f32; 4], color: u32) -> &mut Self {
        self.header(NodeKind::Color, id).floats(&rect).raw(&[color])
    }

    pub fn reuse(&mut self, id: u32) -> &mut Self {
        self.header(NodeKind::Reuse, id)
    }

    pub fn transform_translate(&mut self, id: u32, x: f32, y: f32) -> &mut Self {
        self.header(NodeKind::Transform, id)
            .raw(&[0])
            .floats(&[x, y])
    }

    pub fn opacity(&mut self, id: u32, opacity: f32) -> &mut Self {
        self.header(NodeKind::Opacity, id).floats(&[opacity])
    }

    pub fn clip(&mut self, id: u32, rect: [f32; 4]) -> &mut Self {
        self.header(NodeKind::Clip, id).floats(&rect)
    }

    pub fn debug(&mut self, id: u32, label: &str) -> &mut Self {
        self.header(NodeKind::Debug, id).raw(&[label.len() as u32]);
        let mut bytes = label.as_bytes().to_vec();
        bytes.resize(label.len().div_ceil(4) * 4, 0);
        for chunk in bytes.chunks(4) {
            self.words
                .push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        self
    }
}

/// Encodes a command message with increasing serials
#[derive(Debug)]
pub struct CommandStream {
    buf: Vec<u8>,
    serial: u32,
}

impl Default for CommandStream {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStream {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            serial: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn op(&mut self, opcode: u8) -> &mut Self {
        self.serial += 1;
        self.buf.push(opcode);
        self.buf.extend_from_slice(&self.serial.to_le_bytes());
        self
    }

    fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn bool(&mut self, v: bool) -> &mut Self {
        self.buf.push(v as u8);
        self
    }

    pub fn grab_pointer(&mut self, id: u16, owner_events: bool) -> &mut Self {
        self.op(opcodes::GRAB_POINTER).u16(id).bool(owner_events)
    }

    pub fn ungrab_pointer(&mut self) -> &mut Self {
        self.op(opcodes::UNGRAB_POINTER)
    }

    pub fn new_surface(&mut self, id: u16, x: i16, y: i16, w: u16, h: u16, temp: bool) -> &mut Self {
        self.op(opcodes::NEW_SURFACE)
            .u16(id)
            .i16(x)
            .i16(y)
            .u16(w)
            .u16(h)
            .bool(temp)
    }

    pub fn show(&mut self, id: u16) -> &mut Self {
        self.op(opcodes::SHOW_SURFACE).u16(id)
    }

    pub fn hide(&mut self, id: u16) -> &mut Self {
        self.op(opcodes::HIDE_SURFACE).u16(id)
    }

    pub fn raise(&mut self, id: u16) -> &mut Self {
        self.op(opcodes::RAISE_SURFACE).u16(id)
    }

    pub fn lower(&mut self, id: u16) -> &mut Self {
        self.op(opcodes::LOWER_SURFACE).u16(id)
    }

    pub fn destroy(&mut self, id: u16) -> &mut Self {
        self.op(opcodes::DESTROY_SURFACE).u16(id)
    }

    pub fn move_resize(
        &mut self,
        id: u16,
        position: Option<(i16, i16)>,
        size: Option<(u16, u16)>,
    ) -> &mut Self {
        let mut flags = 0;
        if position.is_some() {
            flags |= MOVE_RESIZE_POSITION;
        }
        if size.is_some() {
            flags |= MOVE_RESIZE_SIZE;
        }
        self.op(opcodes::MOVE_RESIZE).u16(id);
        self.buf.push(flags);
        if let Some((x, y)) = position {
            self.i16(x).i16(y);
        }
        if let Some((w, h)) = size {
            self.u16(w).u16(h);
        }
        self
    }

    pub fn transient_for(&mut self, id: u16, parent: u16) -> &mut Self {
        self.op(opcodes::SET_TRANSIENT_FOR).u16(id).u16(parent)
    }

    pub fn disconnected(&mut self) -> &mut Self {
        self.op(opcodes::DISCONNECTED)
    }

    pub fn show_keyboard(&mut self, show: bool) -> &mut Self {
        self.op(opcodes::SET_SHOW_KEYBOARD).u16(show as u16)
    }

    pub fn upload_texture(&mut self, id: u32, data: &[u8]) -> &mut Self {
        self.op(opcodes::UPLOAD_TEXTURE)
            .u32(id)
            .u32(data.len() as u32);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn release_texture(&mut self, id: u32) -> &mut Self {
        self.op(opcodes::RELEASE_TEXTURE).u32(id)
    }

    pub fn set_nodes(&mut self, id: u16, nodes: &NodeStream) -> &mut Self {
        self.op(opcodes::SET_NODES)
            .u16(id)
            .u32(nodes.len_words() as u32);
        self.buf.extend_from_slice(&nodes.bytes());
        self
    }

    pub fn roundtrip(&mut self, id: u16, tag: u32) -> &mut Self {
        self.op(opcodes::ROUNDTRIP).u16(id).u32(tag)
    }
}
