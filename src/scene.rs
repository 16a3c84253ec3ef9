//! Render-node decoding and the element arena
//!
//! A set-nodes command carries a stream of node operations against one
//! surface. Decoding materializes new elements in the [`ElementArena`], moves
//! reused ones, and queues the matching [`DisplayMutation`]s. Nothing touches
//! the render sink directly.

use crate::display::DisplayMutation;
use crate::error::ProtocolError;
use crate::protocol::{node_ops, TRANSFORM_MATRIX, TRANSFORM_TRANSLATE};
use crate::surface::Surface;
use crate::texture::TextureCache;
use crate::wire::NodeReader;
use std::collections::{HashMap, HashSet};

/// Handle to a visual element owned by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Rect with per-corner radii: top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoundedRect {
    pub rect: Rect,
    pub corners: [Size; 4],
}

/// `0xAARRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color(pub u32);

impl Color {
    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn css(self) -> String {
        format!(
            "rgba({},{},{},{})",
            (self.0 >> 16) & 0xff,
            (self.0 >> 8) & 0xff,
            self.0 & 0xff,
            self.alpha() as f32 / 255.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub dx: f32,
    pub dy: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Translate { x: f32, y: f32 },
    /// Column-major 4x4
    Matrix([f32; 16]),
}

impl Transform {
    pub fn css(&self) -> String {
        match self {
            Transform::Translate { x, y } => format!("translate({}px, {}px)", x, y),
            Transform::Matrix(m) => {
                let values: Vec<String> = m.iter().map(|v| v.to_string()).collect();
                format!("matrix3d({})", values.join(","))
            }
        }
    }
}

/// Render node type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NodeKind {
    Texture = 0,
    Container = 1,
    Color = 2,
    Border = 3,
    OutsetShadow = 4,
    InsetShadow = 5,
    RoundedClip = 6,
    LinearGradient = 7,
    Shadow = 8,
    Opacity = 9,
    Clip = 10,
    Transform = 11,
    Debug = 12,
    Reuse = 13,
}

impl TryFrom<u32> for NodeKind {
    type Error = ProtocolError;

    fn try_from(v: u32) -> Result<Self, ProtocolError> {
        Ok(match v {
            0 => NodeKind::Texture,
            1 => NodeKind::Container,
            2 => NodeKind::Color,
            3 => NodeKind::Border,
            4 => NodeKind::OutsetShadow,
            5 => NodeKind::InsetShadow,
            6 => NodeKind::RoundedClip,
            7 => NodeKind::LinearGradient,
            8 => NodeKind::Shadow,
            9 => NodeKind::Opacity,
            10 => NodeKind::Clip,
            11 => NodeKind::Transform,
            12 => NodeKind::Debug,
            13 => NodeKind::Reuse,
            other => return Err(ProtocolError::UnknownNodeType(other)),
        })
    }
}

/// What a materialized element draws
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Texture {
        rect: Rect,
        texture: u32,
    },
    Color {
        rect: Rect,
        color: Color,
    },
    Border {
        outline: RoundedRect,
        widths: [f32; 4],
        colors: [Color; 4],
    },
    OutsetShadow {
        outline: RoundedRect,
        color: Color,
        dx: f32,
        dy: f32,
        spread: f32,
        blur: f32,
    },
    InsetShadow {
        outline: RoundedRect,
        color: Color,
        dx: f32,
        dy: f32,
        spread: f32,
        blur: f32,
    },
    LinearGradient {
        rect: Rect,
        start: Point,
        end: Point,
        stops: Vec<ColorStop>,
    },
    DebugLabel(String),
    Transform(Transform),
    Clip(Rect),
    RoundedClip(RoundedRect),
    Opacity(f32),
    Shadow(Vec<Shadow>),
    Container,
}

impl Visual {
    pub fn kind(&self) -> NodeKind {
        match self {
            Visual::Texture { .. } => NodeKind::Texture,
            Visual::Color { .. } => NodeKind::Color,
            Visual::Border { .. } => NodeKind::Border,
            Visual::OutsetShadow { .. } => NodeKind::OutsetShadow,
            Visual::InsetShadow { .. } => NodeKind::InsetShadow,
            Visual::LinearGradient { .. } => NodeKind::LinearGradient,
            Visual::DebugLabel(_) => NodeKind::Debug,
            Visual::Transform(_) => NodeKind::Transform,
            Visual::Clip(_) => NodeKind::Clip,
            Visual::RoundedClip(_) => NodeKind::RoundedClip,
            Visual::Opacity(_) => NodeKind::Opacity,
            Visual::Shadow(_) => NodeKind::Shadow,
            Visual::Container => NodeKind::Container,
        }
    }

    /// Texture this element binds, if any
    pub fn texture(&self) -> Option<u32> {
        match self {
            Visual::Texture { texture, .. } => Some(*texture),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    surface: u16,
    /// None for surface roots
    node: Option<(u32, NodeKind)>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// Client-side model of the visual tree
#[derive(Debug, Default)]
pub struct ElementArena {
    slots: HashMap<ElementId, Slot>,
    next: u32,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Root element for a surface
    pub fn alloc_root(&mut self, surface: u16) -> ElementId {
        self.alloc(surface, None)
    }

    fn alloc(&mut self, surface: u16, node: Option<(u32, NodeKind)>) -> ElementId {
        self.next += 1;
        let id = ElementId(self.next);
        self.slots.insert(
            id,
            Slot {
                surface,
                node,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.slots.get(&id).and_then(|s| s.parent)
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.slots
            .get(&id)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn kind(&self, id: ElementId) -> Option<NodeKind> {
        self.slots.get(&id).and_then(|s| s.node).map(|(_, k)| k)
    }

    pub fn detach(&mut self, child: ElementId) {
        let Some(parent) = self.slots.get_mut(&child).and_then(|s| s.parent.take()) else {
            return;
        };
        if let Some(p) = self.slots.get_mut(&parent) {
            p.children.retain(|&c| c != child);
        }
    }

    pub fn append(&mut self, parent: ElementId, child: ElementId) {
        self.detach(child);
        if let Some(p) = self.slots.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.slots.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    /// Place `child` right after `sibling` under `parent`, or first if no sibling
    pub fn insert_after(
        &mut self,
        parent: ElementId,
        sibling: Option<ElementId>,
        child: ElementId,
    ) -> Result<(), ProtocolError> {
        self.detach(child);
        let p = self
            .slots
            .get_mut(&parent)
            .ok_or(ProtocolError::SiblingMismatch)?;
        let index = match sibling {
            None => 0,
            Some(s) => {
                p.children
                    .iter()
                    .position(|&c| c == s)
                    .ok_or(ProtocolError::SiblingMismatch)?
                    + 1
            }
        };
        p.children.insert(index, child);
        if let Some(c) = self.slots.get_mut(&child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Drop an element and everything below it. Returns the dropped ids.
    pub fn remove_subtree(&mut self, id: ElementId) -> Vec<ElementId> {
        self.detach(id);
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(slot) = self.slots.remove(&next) {
                stack.extend(slot.children);
                removed.push(next);
            }
        }
        removed
    }

    /// Drop every element of `surface` not reachable from `root`
    pub fn prune_unreachable(&mut self, surface: u16, root: ElementId) -> Vec<(ElementId, u32)> {
        let mut reachable = HashSet::new();
        let mut stack = vec![root];
        while let Some(next) = stack.pop() {
            if reachable.insert(next) {
                stack.extend_from_slice(self.children(next));
            }
        }

        let mut dead: Vec<ElementId> = self
            .slots
            .iter()
            .filter(|(id, slot)| slot.surface == surface && !reachable.contains(*id))
            .map(|(&id, _)| id)
            .collect();
        dead.sort();

        dead.into_iter()
            .filter_map(|id| {
                let slot = self.slots.remove(&id)?;
                Some((id, slot.node.map_or(0, |(n, _)| n)))
            })
            .collect()
    }
}

/// Deepest render node nesting accepted in one insert
pub const MAX_NODE_DEPTH: usize = 512;

/// Decoder state for one set-nodes pass
struct NodeDecoder<'a, 'r> {
    reader: NodeReader<'r>,
    surface: &'a mut Surface,
    arena: &'a mut ElementArena,
    textures: &'a mut TextureCache,
    out: &'a mut Vec<DisplayMutation>,
    placed: HashSet<u32>,
}

/// Apply one node-operation stream to a surface's tree
pub fn apply_nodes(
    reader: NodeReader<'_>,
    surface: &mut Surface,
    arena: &mut ElementArena,
    textures: &mut TextureCache,
    out: &mut Vec<DisplayMutation>,
) -> Result<(), ProtocolError> {
    let mut decoder = NodeDecoder {
        reader,
        surface,
        arena,
        textures,
        out,
        placed: HashSet::new(),
    };
    while !decoder.reader.is_empty() {
        decoder.operation()?;
    }
    decoder.prune();
    Ok(())
}

impl NodeDecoder<'_, '_> {
    fn operation(&mut self) -> Result<(), ProtocolError> {
        let op = self.reader.u32()?;
        match op {
            node_ops::INSERT_NODE => {
                let parent = self.parent()?;
                let sibling = self.sibling()?;
                let element = self.node(None, 0)?;
                self.arena.insert_after(parent, sibling, element)?;
                self.out.push(DisplayMutation::InsertAfter {
                    parent,
                    sibling,
                    child: element,
                });
            }
            node_ops::REMOVE_NODE => {
                let id = self.reader.u32()?;
                let element = self
                    .surface
                    .nodes
                    .remove(&id)
                    .ok_or(ProtocolError::UnknownNode(id))?;
                self.arena.detach(element);
                self.out.push(DisplayMutation::Remove(element));
            }
            node_ops::MOVE_AFTER_CHILD => {
                let parent = self.parent()?;
                let sibling = self.sibling()?;
                let id = self.reader.u32()?;
                self.mark_placed(id)?;
                let element = self.lookup(id)?;
                self.arena.insert_after(parent, sibling, element)?;
                self.out.push(DisplayMutation::InsertAfter {
                    parent,
                    sibling,
                    child: element,
                });
            }
            node_ops::PATCH_TEXTURE => {
                let id = self.reader.u32()?;
                let texture = self.reader.u32()?;
                let element = self.lookup_kind(id, NodeKind::Texture, "texture")?;
                self.textures.acquire(texture)?;
                self.out
                    .push(DisplayMutation::SetImage { element, texture });
            }
            node_ops::PATCH_TRANSFORM => {
                let id = self.reader.u32()?;
                let transform = self.transform()?;
                let element = self.lookup_kind(id, NodeKind::Transform, "transform")?;
                self.out.push(DisplayMutation::SetTransform {
                    element,
                    transform,
                });
            }
            other => return Err(ProtocolError::UnknownNodeOp(other)),
        }
        Ok(())
    }

    fn lookup(&self, id: u32) -> Result<ElementId, ProtocolError> {
        self.surface
            .nodes
            .get(&id)
            .copied()
            .ok_or(ProtocolError::UnknownNode(id))
    }

    fn lookup_kind(
        &self,
        id: u32,
        kind: NodeKind,
        expected: &'static str,
    ) -> Result<ElementId, ProtocolError> {
        let element = self.lookup(id)?;
        if self.arena.kind(element) != Some(kind) {
            return Err(ProtocolError::NodeKindMismatch { node: id, expected });
        }
        Ok(element)
    }

    /// 0 is the surface root
    fn parent(&mut self) -> Result<ElementId, ProtocolError> {
        match self.reader.u32()? {
            0 => Ok(self.surface.root),
            id => self.lookup(id),
        }
    }

    /// 0 means "first child"
    fn sibling(&mut self) -> Result<Option<ElementId>, ProtocolError> {
        match self.reader.u32()? {
            0 => Ok(None),
            id => self.lookup(id).map(Some),
        }
    }

    fn mark_placed(&mut self, id: u32) -> Result<(), ProtocolError> {
        if !self.placed.insert(id) {
            return Err(ProtocolError::NodePlacedTwice(id));
        }
        Ok(())
    }

    /// Decode one node record. Inner nodes go straight into `parent`, which is
    /// not attached yet; the outermost one is placed by the caller.
    fn node(&mut self, parent: Option<ElementId>, depth: usize) -> Result<ElementId, ProtocolError> {
        if depth >= MAX_NODE_DEPTH {
            return Err(ProtocolError::NodeTreeTooDeep(MAX_NODE_DEPTH));
        }
        let kind = NodeKind::try_from(self.reader.u32()?)?;
        let id = self.reader.u32()?;
        self.mark_placed(id)?;

        if kind == NodeKind::Reuse {
            let element = self.lookup(id)?;
            self.attach(parent, element);
            return Ok(element);
        }

        let visual = self.visual(kind)?;
        if let Some(texture) = visual.texture() {
            self.textures.acquire(texture)?;
        }

        let element = self.arena.alloc(self.surface.id, Some((id, kind)));
        self.surface.nodes.insert(id, element);
        self.out
            .push(DisplayMutation::Create { element, visual });
        self.attach(parent, element);

        match kind {
            NodeKind::Container => {
                let count = self.reader.u32()?;
                for _ in 0..count {
                    self.node(Some(element), depth + 1)?;
                }
            }
            NodeKind::RoundedClip
            | NodeKind::Shadow
            | NodeKind::Opacity
            | NodeKind::Clip
            | NodeKind::Transform => {
                self.node(Some(element), depth + 1)?;
            }
            _ => {}
        }
        Ok(element)
    }

    fn attach(&mut self, parent: Option<ElementId>, child: ElementId) {
        if let Some(parent) = parent {
            self.arena.append(parent, child);
            self.out.push(DisplayMutation::Append { parent, child });
        }
    }

    /// Payload fields of a node, excluding children
    fn visual(&mut self, kind: NodeKind) -> Result<Visual, ProtocolError> {
        Ok(match kind {
            NodeKind::Texture => Visual::Texture {
                rect: self.rect()?,
                texture: self.reader.u32()?,
            },
            NodeKind::Color => Visual::Color {
                rect: self.rect()?,
                color: self.color()?,
            },
            NodeKind::Border => {
                let outline = self.rounded_rect()?;
                let mut widths = [0.0; 4];
                for w in widths.iter_mut() {
                    *w = self.reader.f32()?;
                }
                let mut colors = [Color::default(); 4];
                for c in colors.iter_mut() {
                    *c = self.color()?;
                }
                Visual::Border {
                    outline,
                    widths,
                    colors,
                }
            }
            NodeKind::OutsetShadow | NodeKind::InsetShadow => {
                let outline = self.rounded_rect()?;
                let color = self.color()?;
                let dx = self.reader.f32()?;
                let dy = self.reader.f32()?;
                let spread = self.reader.f32()?;
                let blur = self.reader.f32()?;
                if kind == NodeKind::OutsetShadow {
                    Visual::OutsetShadow {
                        outline,
                        color,
                        dx,
                        dy,
                        spread,
                        blur,
                    }
                } else {
                    Visual::InsetShadow {
                        outline,
                        color,
                        dx,
                        dy,
                        spread,
                        blur,
                    }
                }
            }
            NodeKind::LinearGradient => {
                let rect = self.rect()?;
                let start = self.point()?;
                let end = self.point()?;
                let count = self.reader.u32()?;
                let mut stops = Vec::new();
                for _ in 0..count {
                    stops.push(ColorStop {
                        offset: self.reader.f32()?,
                        color: self.color()?,
                    });
                }
                Visual::LinearGradient {
                    rect,
                    start,
                    end,
                    stops,
                }
            }
            NodeKind::Debug => Visual::DebugLabel(self.reader.string()?),
            NodeKind::RoundedClip => Visual::RoundedClip(self.rounded_rect()?),
            NodeKind::Shadow => {
                let count = self.reader.u32()?;
                let mut shadows = Vec::new();
                for _ in 0..count {
                    shadows.push(Shadow {
                        color: self.color()?,
                        dx: self.reader.f32()?,
                        dy: self.reader.f32()?,
                        radius: self.reader.f32()?,
                    });
                }
                Visual::Shadow(shadows)
            }
            NodeKind::Opacity => Visual::Opacity(self.reader.f32()?),
            NodeKind::Clip => Visual::Clip(self.rect()?),
            NodeKind::Transform => Visual::Transform(self.transform()?),
            NodeKind::Container => Visual::Container,
            NodeKind::Reuse => return Err(ProtocolError::UnknownNodeType(kind as u32)),
        })
    }

    fn point(&mut self) -> Result<Point, ProtocolError> {
        Ok(Point {
            x: self.reader.f32()?,
            y: self.reader.f32()?,
        })
    }

    fn size(&mut self) -> Result<Size, ProtocolError> {
        Ok(Size {
            width: self.reader.f32()?,
            height: self.reader.f32()?,
        })
    }

    fn rect(&mut self) -> Result<Rect, ProtocolError> {
        Ok(Rect {
            x: self.reader.f32()?,
            y: self.reader.f32()?,
            width: self.reader.f32()?,
            height: self.reader.f32()?,
        })
    }

    fn rounded_rect(&mut self) -> Result<RoundedRect, ProtocolError> {
        let rect = self.rect()?;
        let mut corners = [Size::default(); 4];
        for c in corners.iter_mut() {
            *c = self.size()?;
        }
        Ok(RoundedRect { rect, corners })
    }

    fn color(&mut self) -> Result<Color, ProtocolError> {
        Ok(Color(self.reader.u32()?))
    }

    fn transform(&mut self) -> Result<Transform, ProtocolError> {
        match self.reader.u32()? {
            TRANSFORM_TRANSLATE => Ok(Transform::Translate {
                x: self.reader.f32()?,
                y: self.reader.f32()?,
            }),
            TRANSFORM_MATRIX => {
                let mut m = [0.0; 16];
                for v in m.iter_mut() {
                    *v = self.reader.f32()?;
                }
                Ok(Transform::Matrix(m))
            }
            other => Err(ProtocolError::UnknownTransform(other)),
        }
    }

    /// Forget elements that fell out of the tree during this pass
    fn prune(&mut self) {
        let dead = self.arena.prune_unreachable(self.surface.id, self.surface.root);
        for (element, node) in dead {
            if self.surface.nodes.get(&node) == Some(&element) {
                self.surface.nodes.remove(&node);
            }
            self.out.push(DisplayMutation::Discard(element));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{png_bytes, NodeStream};
    use crate::texture::HeaderLoader;

    struct Fixture {
        surface: Surface,
        arena: ElementArena,
        textures: TextureCache,
        loader: HeaderLoader,
    }

    impl Fixture {
        fn new() -> Self {
            let mut arena = ElementArena::new();
            let root = arena.alloc_root(1);
            Self {
                surface: Surface::new(1, 0, 0, 100, 100, false, root),
                arena,
                textures: TextureCache::new(),
                loader: HeaderLoader::new(),
            }
        }

        fn apply(&mut self, stream: &NodeStream) -> Result<Vec<DisplayMutation>, ProtocolError> {
            let bytes = stream.bytes();
            let mut out = Vec::new();
            apply_nodes(
                NodeReader::new(&bytes),
                &mut self.surface,
                &mut self.arena,
                &mut self.textures,
                &mut out,
            )?;
            Ok(out)
        }

        fn element(&self, node: u32) -> ElementId {
            self.surface.nodes[&node]
        }
    }

    #[test]
    fn test_insert_container_with_texture() {
        let mut fx = Fixture::new();
        fx.textures
            .upload(5, png_bytes(1, 1), &mut fx.loader)
            .unwrap();

        let mut s = NodeStream::new();
        s.insert(0, 0).container(10, 1).texture(11, [0.0, 0.0, 100.0, 100.0], 5);
        let out = fx.apply(&s).unwrap();

        let container = fx.element(10);
        let texture = fx.element(11);
        let root = fx.surface.root;
        assert_eq!(
            out,
            vec![
                DisplayMutation::Create {
                    element: container,
                    visual: Visual::Container
                },
                DisplayMutation::Create {
                    element: texture,
                    visual: Visual::Texture {
                        rect: Rect {
                            x: 0.0,
                            y: 0.0,
                            width: 100.0,
                            height: 100.0
                        },
                        texture: 5
                    }
                },
                DisplayMutation::Append {
                    parent: container,
                    child: texture
                },
                DisplayMutation::InsertAfter {
                    parent: root,
                    sibling: None,
                    child: container
                },
            ]
        );
        assert_eq!(fx.arena.children(root), &[container]);
        assert_eq!(fx.arena.parent(texture), Some(container));
        // upload + binding
        assert_eq!(fx.textures.get(5).unwrap().refcount(), 2);
    }

    #[test]
    fn test_reuse_relocates_same_element() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0).container(1, 2);
        s.color(2, [0.0, 0.0, 10.0, 10.0], 0xff00ff00);
        s.color(3, [0.0, 0.0, 5.0, 5.0], 0xffff0000);
        fx.apply(&s).unwrap();
        let moved = fx.element(3);

        // new container 4 replaces 1, reusing node 3
        let mut s = NodeStream::new();
        s.remove(1);
        s.insert(0, 0).container(4, 1).reuse(3);
        let out = fx.apply(&s).unwrap();

        assert_eq!(fx.element(3), moved);
        let container = fx.element(4);
        assert_eq!(fx.arena.parent(moved), Some(container));
        assert!(out.contains(&DisplayMutation::Append {
            parent: container,
            child: moved
        }));
        assert!(!out.iter().any(|m| matches!(
            m,
            DisplayMutation::Create { element, .. } if *element == moved
        )));

        // 1 and 2 were pruned, 3 survives
        assert!(!fx.surface.nodes.contains_key(&1));
        assert!(!fx.surface.nodes.contains_key(&2));
        let discarded = out
            .iter()
            .filter(|m| matches!(m, DisplayMutation::Discard(_)))
            .count();
        assert_eq!(discarded, 2);
        assert!(fx.arena.contains(moved));
    }

    #[test]
    fn test_reuse_unknown_node_is_fatal() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0).reuse(42);
        assert_eq!(fx.apply(&s), Err(ProtocolError::UnknownNode(42)));
    }

    #[test]
    fn test_node_placed_twice() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0).container(1, 0);
        fx.apply(&s).unwrap();

        let mut s = NodeStream::new();
        s.insert(0, 0).container(5, 2).reuse(1).reuse(1);
        assert_eq!(fx.apply(&s), Err(ProtocolError::NodePlacedTwice(1)));
    }

    #[test]
    fn test_bins_take_one_child() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0)
            .transform_translate(1, 5.0, 6.0)
            .opacity(2, 0.5)
            .clip(3, [0.0, 0.0, 4.0, 4.0])
            .color(4, [0.0, 0.0, 1.0, 1.0], 0xff000000);
        s.insert(0, 1).debug(9, "tail");
        fx.apply(&s).unwrap();

        let root = fx.surface.root;
        assert_eq!(fx.arena.children(root), &[fx.element(1), fx.element(9)]);
        assert_eq!(fx.arena.children(fx.element(1)), &[fx.element(2)]);
        assert_eq!(fx.arena.children(fx.element(2)), &[fx.element(3)]);
        assert_eq!(fx.arena.children(fx.element(3)), &[fx.element(4)]);
    }

    #[test]
    fn test_patch_transform_and_texture() {
        let mut fx = Fixture::new();
        fx.textures
            .upload(7, png_bytes(2, 2), &mut fx.loader)
            .unwrap();
        fx.textures
            .upload(8, png_bytes(2, 2), &mut fx.loader)
            .unwrap();

        let mut s = NodeStream::new();
        s.insert(0, 0)
            .transform_translate(1, 0.0, 0.0)
            .texture(2, [0.0, 0.0, 2.0, 2.0], 7);
        fx.apply(&s).unwrap();

        let mut s = NodeStream::new();
        s.patch_texture(2, 8).patch_translate(1, 3.0, 4.0);
        let out = fx.apply(&s).unwrap();
        assert_eq!(
            out,
            vec![
                DisplayMutation::SetImage {
                    element: fx.element(2),
                    texture: 8
                },
                DisplayMutation::SetTransform {
                    element: fx.element(1),
                    transform: Transform::Translate { x: 3.0, y: 4.0 }
                },
            ]
        );
        assert_eq!(fx.textures.get(8).unwrap().refcount(), 2);

        let mut s = NodeStream::new();
        s.patch_translate(2, 1.0, 1.0);
        assert_eq!(
            fx.apply(&s),
            Err(ProtocolError::NodeKindMismatch {
                node: 2,
                expected: "transform"
            })
        );
    }

    #[test]
    fn test_unknown_texture_binding_is_fatal() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0).texture(1, [0.0; 4], 99);
        assert_eq!(fx.apply(&s), Err(ProtocolError::UnknownTexture(99)));
    }

    #[test]
    fn test_move_after_sibling() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0).color(1, [0.0; 4], 0);
        s.insert(0, 1).color(2, [0.0; 4], 0);
        s.insert(0, 2).color(3, [0.0; 4], 0);
        fx.apply(&s).unwrap();

        let mut s = NodeStream::new();
        s.move_after(0, 0, 3);
        fx.apply(&s).unwrap();
        let root = fx.surface.root;
        assert_eq!(
            fx.arena.children(root),
            &[fx.element(3), fx.element(1), fx.element(2)]
        );
    }

    #[test]
    fn test_unknown_node_type_and_op() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0).raw(&[77, 1]);
        assert_eq!(fx.apply(&s), Err(ProtocolError::UnknownNodeType(77)));

        let mut s = NodeStream::new();
        s.raw(&[9]);
        assert_eq!(fx.apply(&s), Err(ProtocolError::UnknownNodeOp(9)));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0);
        for id in 1..MAX_NODE_DEPTH as u32 {
            s.opacity(id, 0.5);
        }
        s.color(MAX_NODE_DEPTH as u32, [0.0; 4], 0xff000000);
        assert!(fx.apply(&s).is_ok());

        let mut fx = Fixture::new();
        let mut s = NodeStream::new();
        s.insert(0, 0);
        for id in 1..200_000 {
            s.opacity(id, 0.5);
        }
        assert_eq!(
            fx.apply(&s),
            Err(ProtocolError::NodeTreeTooDeep(MAX_NODE_DEPTH))
        );
    }

    #[test]
    fn test_transform_css() {
        assert_eq!(
            Transform::Translate { x: 1.5, y: -2.0 }.css(),
            "translate(1.5px, -2px)"
        );
        let mut m = [0.0; 16];
        m[0] = 1.0;
        assert!(Transform::Matrix(m).css().starts_with("matrix3d(1,0,"));
        assert_eq!(Color(0xffff0000).css(), "rgba(255,0,0,1)");
    }
}
