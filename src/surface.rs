//! Surface registry and stacking order

use crate::error::ProtocolError;
use crate::scene::ElementId;
use std::collections::{HashMap, HashSet};

/// Server-side window mirror
#[derive(Debug, Clone)]
pub struct Surface {
    pub id: u16,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub visible: bool,
    pub temporary: bool,
    /// 0 = none
    pub transient_for: u16,
    /// Root element every node tree of this surface hangs off
    pub root: ElementId,
    /// Node id → element, kept across updates for reuse
    pub nodes: HashMap<u32, ElementId>,
}

impl Surface {
    pub fn new(
        id: u16,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        temporary: bool,
        root: ElementId,
    ) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
            visible: false,
            temporary,
            transient_for: 0,
            root,
            nodes: HashMap::new(),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (sx, sy) = (self.x as i32, self.y as i32);
        x >= sx && y >= sy && x < sx + self.width as i32 && y < sy + self.height as i32
    }
}

/// Live surfaces plus their stacking order (back to front)
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: HashMap<u16, Surface>,
    stacking: Vec<u16>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u16) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn require(&self, id: u16) -> Result<&Surface, ProtocolError> {
        self.surfaces.get(&id).ok_or(ProtocolError::UnknownSurface(id))
    }

    pub fn require_mut(&mut self, id: u16) -> Result<&mut Surface, ProtocolError> {
        self.surfaces
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownSurface(id))
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Surface ids back to front
    pub fn stacking(&self) -> &[u16] {
        &self.stacking
    }

    /// Root elements back to front, for a restack mutation
    pub fn stacking_elements(&self) -> Vec<ElementId> {
        self.stacking
            .iter()
            .filter_map(|id| self.surfaces.get(id))
            .map(|s| s.root)
            .collect()
    }

    /// Add a surface on top of the stack
    pub fn create(&mut self, surface: Surface) -> Result<(), ProtocolError> {
        if self.surfaces.contains_key(&surface.id) {
            return Err(ProtocolError::DuplicateSurface(surface.id));
        }
        self.stacking.push(surface.id);
        self.surfaces.insert(surface.id, surface);
        Ok(())
    }

    /// Drop a surface. Transient links to it are cleared.
    pub fn destroy(&mut self, id: u16) -> Result<Surface, ProtocolError> {
        let surface = self
            .surfaces
            .remove(&id)
            .ok_or(ProtocolError::UnknownSurface(id))?;
        self.stacking.retain(|&s| s != id);
        for other in self.surfaces.values_mut() {
            if other.transient_for == id {
                other.transient_for = 0;
            }
        }
        Ok(surface)
    }

    /// Returns true if the stacking order changed
    pub fn set_transient_for(&mut self, id: u16, parent: u16) -> Result<bool, ProtocolError> {
        if parent != 0 && !self.surfaces.contains_key(&parent) {
            return Err(ProtocolError::UnknownSurface(parent));
        }
        let surface = self.require_mut(id)?;
        if surface.transient_for == parent {
            return Ok(false);
        }
        surface.transient_for = parent;

        if parent == 0 {
            return Ok(false);
        }
        let index = self.index_of(parent).map_or(self.stacking.len(), |i| i + 1);
        Ok(self.restack(id, index))
    }

    /// Move a surface and its transient descendants to the front
    pub fn raise(&mut self, id: u16) -> Result<bool, ProtocolError> {
        self.require(id)?;
        let end = self.stacking.len();
        Ok(self.restack(id, end))
    }

    /// Move a surface and its transient descendants to the back
    pub fn lower(&mut self, id: u16) -> Result<bool, ProtocolError> {
        self.require(id)?;
        Ok(self.restack(id, 0))
    }

    /// Frontmost visible surface under a root-coordinate point
    pub fn surface_at(&self, x: i32, y: i32) -> Option<u16> {
        self.stacking
            .iter()
            .rev()
            .filter_map(|id| self.surfaces.get(id))
            .find(|s| s.visible && s.contains(x, y))
            .map(|s| s.id)
    }

    /// Root coordinates to surface-local ones
    pub fn to_surface(&self, id: u16, x: i32, y: i32) -> Option<(i32, i32)> {
        self.surfaces
            .get(&id)
            .map(|s| (x - s.x as i32, y - s.y as i32))
    }

    fn index_of(&self, id: u16) -> Option<usize> {
        self.stacking.iter().position(|&s| s == id)
    }

    fn restack(&mut self, id: u16, index: usize) -> bool {
        let before = self.stacking.clone();
        let mut visited = HashSet::new();
        self.place(id, index, &mut visited);
        before != self.stacking
    }

    /// Put `id` at `index`, then its transient children right after it in
    /// their current relative order. Returns the index following the placed
    /// subtree.
    fn place(&mut self, id: u16, index: usize, visited: &mut HashSet<u16>) -> usize {
        if !visited.insert(id) {
            return index;
        }
        let Some(current) = self.index_of(id) else {
            return index;
        };
        self.stacking.remove(current);
        let index = if current < index { index - 1 } else { index };
        let index = index.min(self.stacking.len());
        self.stacking.insert(index, id);

        let children: Vec<u16> = self
            .stacking
            .iter()
            .copied()
            .filter(|c| self.surfaces.get(c).is_some_and(|s| s.transient_for == id))
            .collect();

        let mut next = index + 1;
        for child in children {
            next = self.place(child, next, visited);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(ids: &[u16]) -> SurfaceRegistry {
        let mut reg = SurfaceRegistry::new();
        for &id in ids {
            let mut s = Surface::new(id, 0, 0, 100, 100, false, ElementId(id as u32));
            s.visible = true;
            reg.create(s).unwrap();
        }
        reg
    }

    #[test]
    fn test_create_appends_on_top() {
        let reg = registry(&[1, 2, 3]);
        assert_eq!(reg.stacking(), &[1, 2, 3]);
        assert_eq!(
            reg.stacking_elements(),
            vec![ElementId(1), ElementId(2), ElementId(3)]
        );
    }

    #[test]
    fn test_duplicate_surface() {
        let mut reg = registry(&[1]);
        let dup = Surface::new(1, 0, 0, 1, 1, false, ElementId(9));
        assert_eq!(reg.create(dup), Err(ProtocolError::DuplicateSurface(1)));
    }

    #[test]
    fn test_raise_and_lower() {
        let mut reg = registry(&[1, 2, 3]);
        assert!(reg.raise(1).unwrap());
        assert_eq!(reg.stacking(), &[2, 3, 1]);
        assert!(!reg.raise(1).unwrap());
        assert!(reg.lower(1).unwrap());
        assert_eq!(reg.stacking(), &[1, 2, 3]);
        assert_eq!(reg.raise(7), Err(ProtocolError::UnknownSurface(7)));
    }

    #[test]
    fn test_transient_follows_parent() {
        let mut reg = registry(&[1, 2, 3]);
        assert!(reg.set_transient_for(1, 2).unwrap());
        assert_eq!(reg.stacking(), &[2, 1, 3]);

        assert!(reg.raise(2).unwrap());
        assert_eq!(reg.stacking(), &[3, 2, 1]);

        // unchanged parent is a no-op
        assert!(!reg.set_transient_for(1, 2).unwrap());
    }

    #[test]
    fn test_raise_is_transitive() {
        let mut reg = registry(&[1, 2, 3, 4, 5]);
        reg.set_transient_for(2, 1).unwrap();
        reg.set_transient_for(3, 2).unwrap();
        assert_eq!(reg.stacking(), &[1, 2, 3, 4, 5]);

        assert!(reg.raise(1).unwrap());
        assert_eq!(reg.stacking(), &[4, 5, 1, 2, 3]);

        let pos = |reg: &SurfaceRegistry, id| reg.index_of(id).unwrap();
        assert_eq!(pos(&reg, 2), pos(&reg, 1) + 1);
        assert_eq!(pos(&reg, 3), pos(&reg, 2) + 1);

        reg.lower(1).unwrap();
        assert_eq!(reg.stacking(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sibling_order_preserved() {
        let mut reg = registry(&[1, 2, 3, 4]);
        reg.set_transient_for(3, 1).unwrap();
        reg.set_transient_for(2, 1).unwrap();
        let order = reg.stacking().to_vec();
        reg.raise(1).unwrap();
        let children: Vec<u16> = reg.stacking()[2..4].to_vec();
        let before: Vec<u16> = order.iter().copied().filter(|&s| s == 2 || s == 3).collect();
        assert_eq!(children, before);
        assert_eq!(reg.stacking()[0], 4);
    }

    #[test]
    fn test_transient_cycle_terminates() {
        let mut reg = registry(&[1, 2]);
        reg.set_transient_for(1, 2).unwrap();
        reg.set_transient_for(2, 1).unwrap();
        reg.raise(1).unwrap();
        let mut order = reg.stacking().to_vec();
        order.sort();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_unknown_transient_parent() {
        let mut reg = registry(&[1]);
        assert_eq!(
            reg.set_transient_for(1, 9),
            Err(ProtocolError::UnknownSurface(9))
        );
        assert!(!reg.set_transient_for(1, 0).unwrap());
    }

    #[test]
    fn test_destroy_clears_transient_links() {
        let mut reg = registry(&[1, 2]);
        reg.set_transient_for(2, 1).unwrap();
        let gone = reg.destroy(1).unwrap();
        assert_eq!(gone.id, 1);
        assert_eq!(reg.stacking(), &[2]);
        assert_eq!(reg.get(2).unwrap().transient_for, 0);
        assert!(reg.destroy(1).is_err());
    }

    #[test]
    fn test_hit_testing_front_to_back() {
        let mut reg = SurfaceRegistry::new();
        let mut a = Surface::new(1, 0, 0, 100, 100, false, ElementId(1));
        a.visible = true;
        let mut b = Surface::new(2, 50, 50, 100, 100, false, ElementId(2));
        b.visible = true;
        reg.create(a).unwrap();
        reg.create(b).unwrap();

        assert_eq!(reg.surface_at(10, 10), Some(1));
        assert_eq!(reg.surface_at(60, 60), Some(2));
        assert_eq!(reg.surface_at(200, 200), None);
        assert_eq!(reg.to_surface(2, 60, 70), Some((10, 20)));

        reg.get_mut(2).unwrap().visible = false;
        assert_eq!(reg.surface_at(60, 60), Some(1));
    }
}
