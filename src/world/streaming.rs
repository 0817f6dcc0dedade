//! Streaming controller - keeps a window of patches live around a focus
//!
//! Each step recomputes the window box from the focus position, deactivates
//! patches that left it, activates patches inside it, dehydrates live
//! objects that wandered out, and flushes pending physics rebuilds. A step
//! always runs to completion before rendering reads the result; there is
//! no mid-step cancellation.

use glam::{IVec2, Vec2};

use crate::materials::MaterialRegistry;
use crate::object::{Aabb, ObjectHost};
use crate::physics::PhysicsBackend;
use crate::world::grid::{GridLayout, WorldGrid};
use crate::world::patch::DirtyState;

/// Axis-aligned box of patches kept live around the focus. Purely derived
/// data, recomputed every step and never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamWindow {
    /// World-space box covering the windowed patches
    pub min: Vec2,
    pub max: Vec2,
    /// Inclusive patch-index corners (may extend beyond the grid)
    pub patch_min: IVec2,
    pub patch_max: IVec2,
}

impl StreamWindow {
    pub fn around(focus_patch: IVec2, radius: i32, layout: &GridLayout) -> Self {
        debug_assert!(radius >= 0);
        let patch_min = focus_patch - IVec2::splat(radius);
        let patch_max = focus_patch + IVec2::splat(radius);
        let size = layout.patch_size as f32;
        Self {
            min: patch_min.as_vec2() * size,
            max: (patch_max + IVec2::ONE).as_vec2() * size,
            patch_min,
            patch_max,
        }
    }

    #[inline]
    pub fn contains_patch(&self, idx: IVec2) -> bool {
        idx.x >= self.patch_min.x
            && idx.x <= self.patch_max.x
            && idx.y >= self.patch_min.y
            && idx.y <= self.patch_max.y
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Whether a box lies fully inside the window
    #[inline]
    pub fn contains_box(&self, aabb: &Aabb) -> bool {
        aabb.min.x >= self.min.x
            && aabb.max.x <= self.max.x
            && aabb.min.y >= self.min.y
            && aabb.max.y <= self.max.y
    }

    #[inline]
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        self.min.x <= aabb.max.x
            && self.max.x >= aabb.min.x
            && self.min.y <= aabb.max.y
            && self.max.y >= aabb.min.y
    }
}

/// Per-patch streaming around a moving focus position
pub struct Streamer {
    /// When disabled, steps skip activation/deactivation entirely and only
    /// flush pending rebuilds (editor mode keeps its own activation).
    pub enabled: bool,

    /// Window half-width in patches
    pub radius: i32,

    focus: Vec2,
    last_focus_patch: Option<IVec2>,
}

impl Streamer {
    pub fn new(radius: i32) -> Self {
        assert!(radius >= 0);
        Self {
            enabled: true,
            radius,
            focus: Vec2::ZERO,
            last_focus_patch: None,
        }
    }

    pub fn set_focus(&mut self, focus: Vec2) {
        self.focus = focus;
    }

    pub fn focus(&self) -> Vec2 {
        self.focus
    }

    /// The window derived from the current focus
    pub fn window(&self, layout: &GridLayout) -> StreamWindow {
        StreamWindow::around(layout.focus_patch(self.focus), self.radius, layout)
    }

    /// Run one streaming step. Ordering within the step:
    /// deactivate leavers, activate the window, dehydrate strays, flush
    /// dirty rebuilds. Deactivation runs strictly before activation so a
    /// patch in both the previous and new window is never torn down.
    pub fn step(
        &mut self,
        grid: &mut WorldGrid,
        backend: &mut dyn PhysicsBackend,
        host: &mut dyn ObjectHost,
        materials: &MaterialRegistry,
    ) {
        let layout = grid.layout().clone();
        let focus_patch = layout.focus_patch(self.focus);
        let window = StreamWindow::around(focus_patch, self.radius, &layout);
        let moved = self.last_focus_patch != Some(focus_patch);

        if self.enabled {
            if moved {
                if let Some(prev) = self.last_focus_patch {
                    self.deactivate_leavers(grid, backend, host, materials, prev, &window);
                }
            }

            for idx in Self::patch_range(focus_patch, self.radius) {
                let Some(patch) = grid.patch_mut(idx) else {
                    continue;
                };
                patch.set_active_physics(true, backend, materials);
                patch.set_active_objects(true, moved, &window, host);
            }

            self.dehydrate_strays(grid, host, &window);
            self.last_focus_patch = Some(focus_patch);
        }

        self.flush_dirty(grid, backend, materials);
    }

    fn deactivate_leavers(
        &self,
        grid: &mut WorldGrid,
        backend: &mut dyn PhysicsBackend,
        host: &mut dyn ObjectHost,
        materials: &MaterialRegistry,
        prev_focus: IVec2,
        new_window: &StreamWindow,
    ) {
        for idx in Self::patch_range(prev_focus, self.radius) {
            if new_window.contains_patch(idx) {
                continue;
            }
            let Some(patch) = grid.patch_mut(idx) else {
                continue;
            };
            patch.set_active_physics(false, backend, materials);
            patch.set_active_objects(false, false, new_window, host);
        }
    }

    /// Dehydrate live objects the window left behind. Serializable objects
    /// leave as soon as their bounds stop being fully contained, capturing
    /// their current transform into the patch under their position.
    /// Non-serializable statics go when their center leaves; dynamics only
    /// once fully outside. Parented and persistent objects are exempt.
    fn dehydrate_strays(&self, grid: &mut WorldGrid, host: &mut dyn ObjectHost, window: &StreamWindow) {
        for obj in host.live_objects() {
            if obj.parented || obj.persistent {
                continue;
            }
            if obj.kind.is_serializable() {
                if !window.contains_box(&obj.bounds) {
                    if let Some(descriptor) = host.capture(obj.handle) {
                        grid.insert_descriptor(descriptor);
                    }
                }
            } else {
                let gone = if obj.dynamic {
                    !window.intersects(&obj.bounds)
                } else {
                    !window.contains_point(obj.center)
                };
                if gone {
                    // The placement record still sits in its patch
                    host.destroy(obj.handle);
                }
            }
        }
    }

    fn flush_dirty(
        &self,
        grid: &mut WorldGrid,
        backend: &mut dyn PhysicsBackend,
        materials: &MaterialRegistry,
    ) {
        for patch in grid.patches_mut() {
            if patch.dirty() == DirtyState::DirtyPendingRebuild {
                patch.flush_rebuild(backend, materials);
            }
        }
    }

    fn patch_range(center: IVec2, radius: i32) -> impl Iterator<Item = IVec2> {
        (center.y - radius..=center.y + radius).flat_map(move |iy| {
            (center.x - radius..=center.x + radius).map(move |ix| IVec2::new(ix, iy))
        })
    }
}
