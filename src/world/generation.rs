//! Built-in default dataset
//!
//! A small rolling terrain used whenever no save data can be loaded: rock
//! below a noise-driven heightline, a split tile following the slope at
//! the surface, everything above clear. Deterministic for a fixed seed so
//! load-failure fallbacks are reproducible.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use glam::{IVec2, Vec2};

use crate::materials::MaterialId;
use crate::world::grid::{GridLayout, WorldGrid};
use crate::world::tile::Tile;

pub const DEFAULT_SEED: i32 = 1337;

/// Terrain layer; layers above it stay clear in the default dataset
const GROUND_LAYER: usize = 0;

pub fn default_grid(layout: &GridLayout, seed: i32) -> WorldGrid {
    let mut noise = FastNoiseLite::with_seed(seed);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(0.03));

    let extent = (layout.grid_width * layout.patch_size) as i32;
    let base = extent as f32 * 0.4;
    let amplitude = extent as f32 * 0.15;

    // Column heights, one extra entry so every tile has a right edge height
    let mut heights = Vec::with_capacity(extent as usize + 1);
    for x in 0..=extent {
        let h = base + noise.get_noise_2d(x as f32, 0.0) * amplitude;
        heights.push(h.clamp(1.0, extent as f32 - 1.0));
    }

    let mut grid = WorldGrid::new(layout.clone());
    for x in 0..extent {
        let left = heights[x as usize];
        let right = heights[x as usize + 1];
        let top = left.min(right).floor() as i32;

        for y in 0..top {
            grid.set_tile(IVec2::new(x, y), GROUND_LAYER, Tile::full(MaterialId::ROCK, 0));
        }

        // Surface tile sloping between the column heights. Walking the
        // line right-to-left puts side 0 (left of the direction) below,
        // keeping the rock under the surface.
        let fl = (left - top as f32).clamp(0.1, 0.9);
        let fr = (right - top as f32).clamp(0.1, 0.9);
        let mut surface = Tile::full(MaterialId::ROCK, 0);
        if surface.resurface(Vec2::new(1.0, fr), Vec2::new(0.0, fl)) {
            grid.set_tile(IVec2::new(x, top), GROUND_LAYER, surface);
        }
    }

    let mid = extent / 2;
    grid.spawn_point = Vec2::new(mid as f32, heights[mid as usize] + 2.0);
    log::info!(
        "Generated default {}x{} patch world (seed {}), spawn at ({:.1}, {:.1})",
        layout.grid_width,
        layout.grid_width,
        seed,
        grid.spawn_point.x,
        grid.spawn_point.y
    );
    grid
}
