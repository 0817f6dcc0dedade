//! Patch - fixed-size block of tiles plus its physics body and stub list
//!
//! A patch exclusively owns its tile array and descriptor list. The physics
//! body is an owned, optional resource tied 1:1 to `physics_active`: it
//! exists iff the patch is physically active, and is destroyed and rebuilt
//! whenever the dirty flag is flushed.

use glam::{IVec2, Vec2};

use crate::materials::MaterialRegistry;
use crate::object::{ObjectDescriptor, ObjectHandle, ObjectHost};
use crate::physics::{synthesize_layer, BodyHandle, PhysicsBackend, SynthesisMode};
use crate::world::grid::GridLayout;
use crate::world::streaming::StreamWindow;
use crate::world::tile::Tile;

/// Two-phase rebuild protocol: edits mark the patch dirty, the streaming
/// step flushes every dirty active patch exactly once. Multiple edits in
/// one step coalesce into a single rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    DirtyPendingRebuild,
}

pub struct Patch {
    /// Patch index in the grid (not world coordinates)
    pub origin: IVec2,

    size: usize,
    layers: usize,

    /// Tile data, layer-major then row-major:
    /// index = (layer * size + y) * size + x
    tiles: Vec<Tile>,

    descriptors: Vec<ObjectDescriptor>,

    physics_active: bool,
    objects_active: bool,
    dirty: DirtyState,
    body: Option<BodyHandle>,
}

impl Patch {
    pub fn new(origin: IVec2, layout: &GridLayout) -> Self {
        Self::from_parts(
            origin,
            layout,
            vec![Tile::CLEAR; layout.tiles_per_patch()],
            Vec::new(),
        )
    }

    pub(crate) fn from_parts(
        origin: IVec2,
        layout: &GridLayout,
        tiles: Vec<Tile>,
        descriptors: Vec<ObjectDescriptor>,
    ) -> Self {
        assert_eq!(tiles.len(), layout.tiles_per_patch());
        Self {
            origin,
            size: layout.patch_size,
            layers: layout.layer_count,
            tiles,
            descriptors,
            physics_active: false,
            objects_active: false,
            dirty: DirtyState::Clean,
            body: None,
        }
    }

    #[inline]
    fn index(&self, x: usize, y: usize, layer: usize) -> usize {
        assert!(
            x < self.size && y < self.size && layer < self.layers,
            "tile index ({}, {}, layer {}) out of range for {}x{}x{} patch",
            x,
            y,
            layer,
            self.size,
            self.size,
            self.layers
        );
        (layer * self.size + y) * self.size + x
    }

    /// Get tile at patch-local coordinates. Out-of-range access is a
    /// caller bug and panics.
    #[inline]
    pub fn tile(&self, x: usize, y: usize, layer: usize) -> &Tile {
        &self.tiles[self.index(x, y, layer)]
    }

    /// Mutable tile access. The caller is responsible for marking the
    /// patch dirty when the edit affects collision.
    #[inline]
    pub(crate) fn tile_mut(&mut self, x: usize, y: usize, layer: usize) -> &mut Tile {
        let i = self.index(x, y, layer);
        &mut self.tiles[i]
    }

    /// Replace a tile and queue a physics rebuild
    pub fn set_tile(&mut self, x: usize, y: usize, layer: usize, tile: Tile) {
        *self.tile_mut(x, y, layer) = tile;
        self.rebuild_physics();
    }

    /// One layer's row-major tile slice
    pub fn layer_tiles(&self, layer: usize) -> &[Tile] {
        assert!(layer < self.layers);
        let per_layer = self.size * self.size;
        &self.tiles[layer * per_layer..(layer + 1) * per_layer]
    }

    /// Raw tile array, layer-major (persistence)
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// World-space position of the patch's lower-left corner
    pub fn world_origin(&self) -> Vec2 {
        (self.origin * self.size as i32).as_vec2()
    }

    pub fn physics_active(&self) -> bool {
        self.physics_active
    }

    pub fn objects_active(&self) -> bool {
        self.objects_active
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    /// Queue a destroy+recreate of this patch's body. The streaming step
    /// observes the flag once per frame, so edits within a step coalesce.
    pub fn rebuild_physics(&mut self) {
        self.dirty = DirtyState::DirtyPendingRebuild;
    }

    /// Activate or deactivate collision for this patch. No-op when the
    /// state is unchanged.
    pub fn set_active_physics(
        &mut self,
        active: bool,
        backend: &mut dyn PhysicsBackend,
        materials: &MaterialRegistry,
    ) {
        if active == self.physics_active {
            return;
        }
        if active {
            self.attach_body(backend, materials);
        } else {
            self.detach_body(backend);
        }
        self.physics_active = active;
    }

    /// Rebuild the body of an active dirty patch. Inactive patches only
    /// clear the flag; they synthesize from current tiles on activation
    /// anyway.
    pub fn flush_rebuild(&mut self, backend: &mut dyn PhysicsBackend, materials: &MaterialRegistry) {
        if self.dirty != DirtyState::DirtyPendingRebuild {
            return;
        }
        if self.physics_active {
            self.detach_body(backend);
            self.attach_body(backend, materials);
        }
        self.dirty = DirtyState::Clean;
    }

    fn attach_body(&mut self, backend: &mut dyn PhysicsBackend, materials: &MaterialRegistry) {
        assert!(
            self.body.is_none(),
            "patch ({}, {}) already has a body",
            self.origin.x,
            self.origin.y
        );
        let body = backend.create_body(self.world_origin());
        let tag = ((self.origin.x as u32 as u64) << 32) | self.origin.y as u32 as u64;

        'layers: for layer in 0..self.layers {
            let shapes = synthesize_layer(self.layer_tiles(layer), self.size, SynthesisMode::Polygon);
            for s in shapes {
                let material = materials.surface_material(s.material);
                if !backend.add_fixture(body, &s.shape, material, tag) {
                    log::warn!(
                        "Proxy budget exhausted building patch ({}, {}); collision truncated",
                        self.origin.x,
                        self.origin.y
                    );
                    break 'layers;
                }
            }
        }

        self.body = Some(body);
        self.dirty = DirtyState::Clean;
    }

    fn detach_body(&mut self, backend: &mut dyn PhysicsBackend) {
        if let Some(body) = self.body.take() {
            backend.destroy_body(body);
        }
    }

    /// Activate or deactivate object hydration for this patch.
    ///
    /// On activation (and again whenever the window moved while active),
    /// serializable descriptors fully inside the stream window hydrate and
    /// leave the list. Non-serializable descriptors hydrate once, on first
    /// activation, and stay in the list as the placement record.
    /// Deactivation only drops the flag; dehydration is the streaming
    /// controller's pass, driven by window geometry rather than patch
    /// membership.
    pub fn set_active_objects(
        &mut self,
        active: bool,
        window_moved: bool,
        window: &StreamWindow,
        host: &mut dyn ObjectHost,
    ) {
        if !active {
            self.objects_active = false;
            return;
        }

        let rising = !self.objects_active;
        if rising || window_moved {
            self.descriptors.retain(|d| {
                if d.kind.is_serializable() && window.contains_box(&d.bounds()) {
                    !host.hydrate(d)
                } else {
                    true
                }
            });
        }
        if rising {
            for d in self.descriptors.iter().filter(|d| !d.kind.is_serializable()) {
                if !host.is_live(d.handle) {
                    host.hydrate(d);
                }
            }
        }
        self.objects_active = true;
    }

    pub fn add_descriptor(&mut self, descriptor: ObjectDescriptor) -> &ObjectDescriptor {
        debug_assert!(
            !self.descriptors.iter().any(|d| d.handle == descriptor.handle),
            "duplicate descriptor handle {:?}",
            descriptor.handle
        );
        self.descriptors.push(descriptor);
        self.descriptors.last().unwrap()
    }

    /// Remove by handle; false when no such descriptor exists here
    pub fn remove_descriptor(&mut self, handle: ObjectHandle) -> bool {
        let before = self.descriptors.len();
        self.descriptors.retain(|d| d.handle != handle);
        self.descriptors.len() != before
    }

    pub fn descriptor(&self, handle: ObjectHandle) -> Option<&ObjectDescriptor> {
        self.descriptors.iter().find(|d| d.handle == handle)
    }

    /// Point lookup. Among overlapping boxes the one whose edge is nearest
    /// the point wins (the tightest fit), not insertion order.
    pub fn descriptor_at(&self, pos: Vec2) -> Option<&ObjectDescriptor> {
        self.descriptors
            .iter()
            .map(|d| (d, d.bounds().edge_distance(pos)))
            .filter(|(_, dist)| *dist >= 0.0)
            .min_by(|a, b| a.1.partial_cmp(&b.1).expect("finite edge distances"))
            .map(|(d, _)| d)
    }

    pub fn descriptors(&self) -> &[ObjectDescriptor] {
        &self.descriptors
    }
}
