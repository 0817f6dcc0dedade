//! Collision synthesis from tile data
//!
//! Pure functions from one layer of a patch's tile array to a set of
//! collision primitives. Attachment (and the proxy budget) is the caller's
//! business; synthesis only decides WHAT shapes the terrain needs.

use glam::Vec2;

use crate::materials::MaterialId;
use crate::world::tile::Tile;

use super::ShapeDef;

/// One synthesized primitive plus the surface it snapshots
#[derive(Clone, Debug, PartialEq)]
pub struct PatchShape {
    pub shape: ShapeDef,
    pub material: u8,
}

/// How to express split-tile geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynthesisMode {
    /// One line segment per split tile (cheap, hollow)
    Edge,
    /// Merged boxes for solid runs plus one convex polygon per
    /// partially-solid surface (default)
    Polygon,
}

/// Synthesize collision for one layer of a patch.
///
/// `tiles` is the layer's row-major `size * size` slice. Shapes come out in
/// patch-local coordinates (tile units, origin at the patch's lower-left
/// corner).
pub fn synthesize_layer(tiles: &[Tile], size: usize, mode: SynthesisMode) -> Vec<PatchShape> {
    debug_assert_eq!(tiles.len(), size * size);
    match mode {
        SynthesisMode::Edge => synthesize_edges(tiles, size),
        SynthesisMode::Polygon => synthesize_polygons(tiles, size),
    }
}

fn synthesize_edges(tiles: &[Tile], size: usize) -> Vec<PatchShape> {
    let mut out = Vec::new();
    for y in 0..size {
        for x in 0..size {
            let tile = &tiles[y * size + x];
            if !tile.is_split() {
                continue;
            }
            let material = solid_surface(tile);
            if material == MaterialId::VOID {
                continue;
            }
            if let Some((a, b)) = tile.edge_points() {
                let offset = Vec2::new(x as f32, y as f32);
                out.push(PatchShape {
                    shape: ShapeDef::Segment {
                        a: a + offset,
                        b: b + offset,
                    },
                    material,
                });
            }
        }
    }
    out
}

fn synthesize_polygons(tiles: &[Tile], size: usize) -> Vec<PatchShape> {
    let mut out = Vec::new();
    let mut consumed = vec![false; size * size];

    for y in 0..size {
        for x in 0..size {
            let idx = y * size + x;
            if consumed[idx] {
                continue;
            }
            let tile = &tiles[idx];

            if is_merge_solid(tile) {
                let (w, h) = grow_rect(tiles, &consumed, size, x, y);
                for cy in y..y + h {
                    for cx in x..x + w {
                        consumed[cy * size + cx] = true;
                    }
                }
                out.push(PatchShape {
                    shape: ShapeDef::Rect {
                        min: Vec2::new(x as f32, y as f32),
                        max: Vec2::new((x + w) as f32, (y + h) as f32),
                    },
                    material: tile.surface(0),
                });
            } else if tile.is_split() {
                consumed[idx] = true;
                // Normalize so side 0 is the solid side before emitting
                let tile = if tile.surface(0) == MaterialId::VOID
                    && tile.surface(1) != MaterialId::VOID
                {
                    tile.inverted()
                } else {
                    *tile
                };
                let offset = Vec2::new(x as f32, y as f32);
                for side in 0..2 {
                    if tile.surface(side) == MaterialId::VOID {
                        continue;
                    }
                    if let Some(poly) = tile.side_polygon(side) {
                        out.push(PatchShape {
                            shape: ShapeDef::Polygon {
                                verts: poly.iter().map(|v| *v + offset).collect(),
                            },
                            material: tile.surface(side),
                        });
                    }
                }
            }
        }
    }
    out
}

/// Greedy maximal rectangle: scan right while tiles match, then grow down
/// row by row while the whole x-range still matches. Bounds the shape count
/// by connected-region count rather than tile count.
fn grow_rect(
    tiles: &[Tile],
    consumed: &[bool],
    size: usize,
    x: usize,
    y: usize,
) -> (usize, usize) {
    let seed = &tiles[y * size + x];
    let matches = |cx: usize, cy: usize| {
        let i = cy * size + cx;
        !consumed[i] && merge_compatible(&tiles[i], seed)
    };

    let mut w = 1;
    while x + w < size && matches(x + w, y) {
        w += 1;
    }

    let mut h = 1;
    'grow: while y + h < size {
        for cx in x..x + w {
            if !matches(cx, y + h) {
                break 'grow;
            }
        }
        h += 1;
    }

    (w, h)
}

#[inline]
fn is_merge_solid(tile: &Tile) -> bool {
    tile.is_full() && tile.surface(0) != MaterialId::VOID
}

#[inline]
fn merge_compatible(tile: &Tile, seed: &Tile) -> bool {
    is_merge_solid(tile) && tile.surface(0) == seed.surface(0) && tile.tile_set == seed.tile_set
}

/// The surface a split tile's collision snapshots: side 0 when solid,
/// otherwise side 1.
fn solid_surface(tile: &Tile) -> u8 {
    if tile.surface(0) != MaterialId::VOID {
        tile.surface(0)
    } else {
        tile.surface(1)
    }
}
