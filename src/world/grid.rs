//! World grid - the fixed 2D array of patches and the handle allocator
//!
//! The grid exclusively owns every patch; patches address their neighbors
//! purely by index. It also owns the one piece of process-wide mutable
//! state: the monotonic object-handle counter.

use glam::{IVec2, Vec2};

use crate::materials::MaterialId;
use crate::object::{ObjectDescriptor, ObjectHandle, ObjectKind, XForm};
use crate::world::patch::Patch;
use crate::world::tile::Tile;

/// Runtime dimensions of a world grid
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    /// Patches per side (the grid is square)
    pub grid_width: usize,
    /// Tiles per patch side
    pub patch_size: usize,
    /// Tile layers per patch
    pub layer_count: usize,
}

impl GridLayout {
    pub fn tiles_per_patch(&self) -> usize {
        self.layer_count * self.patch_size * self.patch_size
    }

    pub fn patch_count(&self) -> usize {
        self.grid_width * self.grid_width
    }

    /// World-space side length of the whole grid (1 tile = 1 unit)
    pub fn world_extent(&self) -> f32 {
        (self.grid_width * self.patch_size) as f32
    }

    /// Patch index under a world position, unclamped. Use
    /// [`GridLayout::patch_index_at`] when only in-grid results matter.
    pub fn focus_patch(&self, pos: Vec2) -> IVec2 {
        let size = self.patch_size as f32;
        IVec2::new(
            (pos.x / size).floor() as i32,
            (pos.y / size).floor() as i32,
        )
    }

    /// Patch index under a world position, None outside the grid
    pub fn patch_index_at(&self, pos: Vec2) -> Option<IVec2> {
        let idx = self.focus_patch(pos);
        self.contains_patch(idx).then_some(idx)
    }

    pub fn contains_patch(&self, idx: IVec2) -> bool {
        idx.x >= 0
            && idx.y >= 0
            && (idx.x as usize) < self.grid_width
            && (idx.y as usize) < self.grid_width
    }

    /// Global tile index under a world position, None outside the grid
    pub fn tile_index_at(&self, pos: Vec2) -> Option<IVec2> {
        let extent = self.world_extent();
        if pos.x < 0.0 || pos.y < 0.0 || pos.x >= extent || pos.y >= extent {
            return None;
        }
        Some(IVec2::new(pos.x.floor() as i32, pos.y.floor() as i32))
    }

    /// World position of a tile's lower-left corner
    pub fn tile_corner_world(&self, tile: IVec2) -> Vec2 {
        tile.as_vec2()
    }

    /// Split a global tile index into (patch index, local x, local y)
    pub fn tile_to_patch(&self, tile: IVec2) -> (IVec2, usize, usize) {
        let size = self.patch_size as i32;
        let patch = IVec2::new(tile.x.div_euclid(size), tile.y.div_euclid(size));
        let local_x = tile.x.rem_euclid(size) as usize;
        let local_y = tile.y.rem_euclid(size) as usize;
        (patch, local_x, local_y)
    }
}

/// Monotonic object-handle allocator owned by the grid.
///
/// Every live handle anywhere in the object system is below `next`; the
/// counter only ever advances, except through an explicit checkpoint
/// restore (editor undo rolls back handles for objects it also destroyed).
#[derive(Clone, Debug)]
pub struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn allocate(&mut self) -> ObjectHandle {
        let handle = ObjectHandle::from_raw(self.next);
        self.next += 1;
        handle
    }

    /// Current counter value, for persistence and undo checkpoints
    pub fn checkpoint(&self) -> u32 {
        self.next
    }

    /// Roll back to an earlier checkpoint. Rolling forward is a caller bug.
    pub fn restore(&mut self, checkpoint: u32) {
        assert!(
            checkpoint <= self.next,
            "handle checkpoint {} is ahead of allocator {}",
            checkpoint,
            self.next
        );
        self.next = checkpoint;
    }
}

pub struct WorldGrid {
    layout: GridLayout,
    patches: Vec<Patch>,
    handles: HandleAllocator,

    /// Player spawn position carried in the save header
    pub spawn_point: Vec2,
}

impl WorldGrid {
    pub fn new(layout: GridLayout) -> Self {
        let mut patches = Vec::with_capacity(layout.patch_count());
        for iy in 0..layout.grid_width {
            for ix in 0..layout.grid_width {
                patches.push(Patch::new(IVec2::new(ix as i32, iy as i32), &layout));
            }
        }
        Self {
            layout,
            patches,
            handles: HandleAllocator::starting_at(0),
            spawn_point: Vec2::ZERO,
        }
    }

    pub(crate) fn from_parts(
        layout: GridLayout,
        patches: Vec<Patch>,
        handles: HandleAllocator,
        spawn_point: Vec2,
    ) -> Self {
        assert_eq!(patches.len(), layout.patch_count());
        Self {
            layout,
            patches,
            handles,
            spawn_point,
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn patch(&self, idx: IVec2) -> Option<&Patch> {
        self.layout
            .contains_patch(idx)
            .then(|| &self.patches[idx.y as usize * self.layout.grid_width + idx.x as usize])
    }

    pub fn patch_mut(&mut self, idx: IVec2) -> Option<&mut Patch> {
        if !self.layout.contains_patch(idx) {
            return None;
        }
        let i = idx.y as usize * self.layout.grid_width + idx.x as usize;
        Some(&mut self.patches[i])
    }

    pub fn patch_at(&self, pos: Vec2) -> Option<&Patch> {
        self.layout.patch_index_at(pos).and_then(|i| self.patch(i))
    }

    pub fn patches(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter()
    }

    pub fn patches_mut(&mut self) -> impl Iterator<Item = &mut Patch> {
        self.patches.iter_mut()
    }

    /// Tile at a global tile index, None outside the grid
    pub fn tile(&self, tile: IVec2, layer: usize) -> Option<&Tile> {
        let (patch_idx, x, y) = self.layout.tile_to_patch(tile);
        self.patch(patch_idx).map(|p| p.tile(x, y, layer))
    }

    /// Replace a tile, marking the owning patch for rebuild.
    /// False outside the grid.
    pub fn set_tile(&mut self, tile: IVec2, layer: usize, value: Tile) -> bool {
        let (patch_idx, x, y) = self.layout.tile_to_patch(tile);
        match self.patch_mut(patch_idx) {
            Some(p) => {
                p.set_tile(x, y, layer, value);
                true
            }
            None => false,
        }
    }

    /// Fill a rectangle of global tile indices (inclusive) with full tiles
    pub fn fill_rect(&mut self, min: IVec2, max: IVec2, layer: usize, surface: u8, tile_set: u8) -> usize {
        let mut filled = 0;
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let mut tile = Tile::full(surface, tile_set);
                if surface == MaterialId::VOID {
                    tile.make_clear();
                }
                if self.set_tile(IVec2::new(x, y), layer, tile) {
                    filled += 1;
                }
            }
        }
        filled
    }

    /// Carve a split line across every tile the world-space segment a->b
    /// crosses, leaving side 0 on the left of the a->b direction. Tiles
    /// the line misses (and clear tiles) are skipped. Returns the number
    /// of tiles changed; their patches are queued for rebuild.
    pub fn resurface_line(&mut self, a: Vec2, b: Vec2, layer: usize) -> usize {
        let from = (a.x.floor() as isize, a.y.floor() as isize);
        let to = (b.x.floor() as isize, b.y.floor() as isize);
        let mut changed = 0;

        let mut cells: Vec<(isize, isize)> = bresenham::Bresenham::new(from, to).collect();
        cells.push(to);

        for (cx, cy) in cells {
            let tile_idx = IVec2::new(cx as i32, cy as i32);
            let (patch_idx, x, y) = self.layout.tile_to_patch(tile_idx);
            let Some(patch) = self.patch_mut(patch_idx) else {
                continue;
            };
            let corner = tile_idx.as_vec2();
            if patch.tile_mut(x, y, layer).resurface(a - corner, b - corner) {
                patch.rebuild_physics();
                changed += 1;
            }
        }
        if changed > 0 {
            log::debug!(
                "Resurfaced {} tiles along ({:.1}, {:.1}) -> ({:.1}, {:.1})",
                changed,
                a.x,
                a.y,
                b.x,
                b.y
            );
        }
        changed
    }

    pub fn allocate_handle(&mut self) -> ObjectHandle {
        self.handles.allocate()
    }

    pub fn handle_checkpoint(&self) -> u32 {
        self.handles.checkpoint()
    }

    pub fn restore_handles(&mut self, checkpoint: u32) {
        self.handles.restore(checkpoint);
    }

    /// Create a descriptor in the patch under its position. None when the
    /// position lies outside the grid.
    pub fn spawn_descriptor(
        &mut self,
        kind: ObjectKind,
        xform: XForm,
        size: Vec2,
        attributes: String,
    ) -> Option<ObjectHandle> {
        let patch_idx = self.layout.patch_index_at(xform.position)?;
        let handle = self.handles.allocate();
        let descriptor = ObjectDescriptor::new(kind, xform, size, attributes, handle);
        self.patch_mut(patch_idx)
            .expect("index came from the layout")
            .add_descriptor(descriptor);
        Some(handle)
    }

    /// Re-home a captured descriptor into the patch under its position.
    /// Positions outside the grid clamp to the border patch so dehydrating
    /// objects are never silently lost.
    pub(crate) fn insert_descriptor(&mut self, descriptor: ObjectDescriptor) {
        let idx = self.layout.focus_patch(descriptor.xform.position);
        let max = self.layout.grid_width as i32 - 1;
        let clamped = IVec2::new(idx.x.clamp(0, max), idx.y.clamp(0, max));
        if clamped != idx {
            log::debug!(
                "Descriptor {:?} at {:?} is outside the grid; keeping it in border patch ({}, {})",
                descriptor.handle,
                descriptor.xform.position,
                clamped.x,
                clamped.y
            );
        }
        self.patch_mut(clamped)
            .expect("clamped index is in range")
            .add_descriptor(descriptor);
    }

    /// Resolve a handle to its owning patch and descriptor
    pub fn find_descriptor(&self, handle: ObjectHandle) -> Option<(IVec2, &ObjectDescriptor)> {
        self.patches
            .iter()
            .find_map(|p| p.descriptor(handle).map(|d| (p.origin, d)))
    }

    /// Remove a descriptor wherever it lives; false when the handle is
    /// unknown
    pub fn remove_descriptor(&mut self, handle: ObjectHandle) -> bool {
        self.patches.iter_mut().any(|p| p.remove_descriptor(handle))
    }

    /// Point lookup across the grid (patch under the position)
    pub fn descriptor_at(&self, pos: Vec2) -> Option<&ObjectDescriptor> {
        self.patch_at(pos).and_then(|p| p.descriptor_at(pos))
    }
}
