//! Flood-style surface replace over connected tiles
//!
//! The editor's paint-bucket: starting from one tile, repaint every
//! connected tile carrying the same surface on the same tile set. Two
//! tiles connect when their matching sides share at least a boundary point
//! of the common edge, so a repaint never leaks across a carved gap or a
//! differing surface.

use std::collections::VecDeque;

use ahash::AHashSet;
use glam::IVec2;

use crate::materials::MaterialId;
use crate::world::grid::WorldGrid;
use crate::world::tile::{GridDir, Tile};

/// Repaint the connected surface region containing `start` (a global tile
/// index) with `new_surface`. Returns the number of tiles changed; zero
/// when the start tile is clear, outside the grid, or already painted.
/// Touched patches are queued for physics rebuild (fixture materials
/// snapshot the surface).
pub fn flood_resurface(
    grid: &mut WorldGrid,
    start: IVec2,
    layer: usize,
    new_surface: u8,
) -> usize {
    let seed = match grid.tile(start, layer) {
        Some(t) => *t,
        None => return 0,
    };
    if seed.is_clear() {
        return 0;
    }
    let old_surface = flooded_surface(&seed);
    if old_surface == MaterialId::VOID || old_surface == new_surface {
        return 0;
    }
    let tile_set = seed.tile_set;

    let mut visited: AHashSet<IVec2> = AHashSet::new();
    let mut queue: VecDeque<IVec2> = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    let mut changed = 0;

    while let Some(pos) = queue.pop_front() {
        let current = match grid.tile(pos, layer) {
            Some(t) => *t,
            None => continue,
        };

        if repaint(grid, pos, layer, old_surface, new_surface) {
            changed += 1;
        }

        // Walk outward through sides that actually touch across the edge
        let view = normalized(&current, old_surface);
        for dir in GridDir::ALL {
            let next_pos = pos + dir.offset();
            if visited.contains(&next_pos) {
                continue;
            }
            let neighbor = match grid.tile(next_pos, layer) {
                Some(t) => *t,
                None => continue,
            };
            if neighbor.tile_set != tile_set {
                continue;
            }
            let (side0, side1) = view.surface_touches(&neighbor, dir);
            let connected = (side0 && neighbor.surface(0) == old_surface)
                || (side1 && neighbor.surface(1) == old_surface);
            if connected {
                visited.insert(next_pos);
                queue.push_back(next_pos);
            }
        }
    }

    if changed > 0 {
        log::debug!(
            "Flood repaint {} -> {} touched {} tiles from ({}, {})",
            old_surface,
            new_surface,
            changed,
            start.x,
            start.y
        );
    }
    changed
}

/// The surface the flood operates on: side 0 when it carries material,
/// otherwise side 1
fn flooded_surface(tile: &Tile) -> u8 {
    if tile.surface(0) != MaterialId::VOID {
        tile.surface(0)
    } else {
        tile.surface(1)
    }
}

/// View of a tile with the flooded surface on side 0, so the connectivity
/// predicate (which tests the caller's side 0) sees the right region
fn normalized(tile: &Tile, surface: u8) -> Tile {
    if tile.surface(0) != surface && tile.surface(1) == surface {
        tile.inverted()
    } else {
        *tile
    }
}

fn repaint(grid: &mut WorldGrid, pos: IVec2, layer: usize, old: u8, new: u8) -> bool {
    let (patch_idx, x, y) = grid.layout().tile_to_patch(pos);
    let Some(patch) = grid.patch_mut(patch_idx) else {
        return false;
    };
    let tile = patch.tile_mut(x, y, layer);
    let mut hit = false;
    for side in 0..2 {
        if tile.surface(side) == old {
            tile.set_surface(side, new);
            hit = true;
        }
    }
    if hit {
        patch.rebuild_physics();
    }
    hit
}
