//! Tile - unit terrain cell with a quantized split line and two surfaces
//!
//! A tile's geometry is one byte: two boundary points A and B on the
//! perimeter of the unit square, quantized to quarter steps. The directed
//! chord A->B splits the square; side 0 is the region to the LEFT of A->B
//! (equivalently, the region whose boundary walks the perimeter
//! counter-clockwise from B back to A). Both sides are always convex.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::materials::MaterialId;

/// Lattice steps per tile edge; boundary coordinates run 0..=4
pub const LATTICE: i32 = 4;

/// Distinct quantized positions on the tile perimeter
pub const PERIMETER_POINTS: u8 = 16;

/// Reserved edge code: no geometry, non-solid
const EDGE_CLEAR: u8 = 0xFF;
/// Reserved edge code: single solid region, no split
const EDGE_FULL: u8 = 0x00;

/// Minimum fractional area a side must keep after a resurface. Anything
/// smaller collapses the tile to Clear or Full. Applied uniformly to the
/// destructible-deform and free-draw paths (one lattice cell, 1/16).
pub const MIN_SPLIT_AREA: f32 = 1.0 / 16.0;

/// Direction toward a neighboring tile in the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridDir {
    Left,
    Right,
    Down,
    Up,
}

impl GridDir {
    pub const ALL: [GridDir; 4] = [GridDir::Left, GridDir::Right, GridDir::Down, GridDir::Up];

    #[inline]
    pub fn offset(self) -> IVec2 {
        match self {
            GridDir::Left => IVec2::new(-1, 0),
            GridDir::Right => IVec2::new(1, 0),
            GridDir::Down => IVec2::new(0, -1),
            GridDir::Up => IVec2::new(0, 1),
        }
    }

    #[inline]
    pub fn opposite(self) -> GridDir {
        match self {
            GridDir::Left => GridDir::Right,
            GridDir::Right => GridDir::Left,
            GridDir::Down => GridDir::Up,
            GridDir::Up => GridDir::Down,
        }
    }
}

/// Convex vertex loop in tile-local [0,1] coordinates, CCW wound
pub type TilePolygon = SmallVec<[Vec2; 8]>;

/// Smallest addressable terrain cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Quantized split line: `a_index * 16 + b_index`, or a reserved code
    pub edge_data: u8,
    /// Material surface per side; index 0 is primary when the tile is full
    pub surface: [u8; 2],
    /// Which texture/material sheet the surfaces index into
    pub tile_set: u8,
}

/// Lattice position of perimeter index `i`, walking CCW from (0,0)
fn perimeter_point(i: u8) -> IVec2 {
    debug_assert!(i < PERIMETER_POINTS);
    let i = i as i32;
    match i {
        0..=3 => IVec2::new(i, 0),
        4..=7 => IVec2::new(4, i - 4),
        8..=11 => IVec2::new(12 - i, 4),
        _ => IVec2::new(0, 16 - i),
    }
}

/// Inverse of [`perimeter_point`]; None for interior lattice positions
fn perimeter_index(p: IVec2) -> Option<u8> {
    if p.x < 0 || p.x > LATTICE || p.y < 0 || p.y > LATTICE {
        return None;
    }
    if p.y == 0 && p.x < 4 {
        Some(p.x as u8)
    } else if p.x == 4 && p.y < 4 {
        Some((4 + p.y) as u8)
    } else if p.y == 4 && p.x > 0 {
        Some((12 - p.x) as u8)
    } else if p.x == 0 && p.y > 0 {
        Some((16 - p.y) as u8)
    } else {
        None
    }
}

fn encode_edge(a: u8, b: u8) -> u8 {
    debug_assert!(a != b && a < PERIMETER_POINTS && b < PERIMETER_POINTS);
    a * 16 + b
}

fn decode_edge(edge: u8) -> (u8, u8) {
    (edge / 16, edge % 16)
}

/// Vertex loop for one side of a split, in lattice coordinates.
/// Side 0 runs chord A->B then perimeter CCW back to A; side 1 is the
/// complement. Only square corners are emitted between the chord endpoints.
fn side_polygon_lattice(a: u8, b: u8, side: usize) -> SmallVec<[IVec2; 8]> {
    let (start, end) = if side == 0 { (a, b) } else { (b, a) };
    let mut verts: SmallVec<[IVec2; 8]> = SmallVec::new();
    verts.push(perimeter_point(start));
    verts.push(perimeter_point(end));
    let mut i = end;
    loop {
        i = (i + 1) % PERIMETER_POINTS;
        if i == start {
            break;
        }
        if i % 4 == 0 {
            verts.push(perimeter_point(i));
        }
    }
    verts
}

/// Twice the signed area of a lattice polygon (positive = CCW)
fn shoelace2(verts: &[IVec2]) -> i32 {
    let mut sum = 0;
    for i in 0..verts.len() {
        let p = verts[i];
        let q = verts[(i + 1) % verts.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum
}

impl Tile {
    pub const CLEAR: Tile = Tile {
        edge_data: EDGE_CLEAR,
        surface: [MaterialId::VOID; 2],
        tile_set: 0,
    };

    pub fn full(surface: u8, tile_set: u8) -> Self {
        Self {
            edge_data: EDGE_FULL,
            surface: [surface, MaterialId::VOID],
            tile_set,
        }
    }

    #[inline]
    pub fn is_clear(&self) -> bool {
        self.edge_data == EDGE_CLEAR
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.edge_data == EDGE_FULL
    }

    #[inline]
    pub fn is_split(&self) -> bool {
        !self.is_clear() && !self.is_full()
    }

    #[inline]
    pub fn surface(&self, side: usize) -> u8 {
        debug_assert!(side < 2);
        self.surface[side]
    }

    pub fn set_surface(&mut self, side: usize, surface: u8) {
        debug_assert!(side < 2);
        self.surface[side] = surface;
    }

    pub fn make_clear(&mut self) {
        self.edge_data = EDGE_CLEAR;
        self.surface = [MaterialId::VOID; 2];
    }

    pub fn make_full(&mut self, surface: u8) {
        self.edge_data = EDGE_FULL;
        self.surface = [surface, MaterialId::VOID];
    }

    /// Swap side 0 and side 1, including surfaces. Its own inverse. The
    /// physics synthesizer uses this to normalize which side is solid
    /// before merging.
    pub fn inverted(&self) -> Tile {
        let mut out = *self;
        out.surface.swap(0, 1);
        if self.is_split() {
            let (a, b) = decode_edge(self.edge_data);
            out.edge_data = encode_edge(b, a);
        }
        out
    }

    /// The split endpoints A and B in tile-local [0,1] coordinates
    pub fn edge_points(&self) -> Option<(Vec2, Vec2)> {
        if !self.is_split() {
            return None;
        }
        let (a, b) = decode_edge(self.edge_data);
        let pa = perimeter_point(a).as_vec2() / LATTICE as f32;
        let pb = perimeter_point(b).as_vec2() / LATTICE as f32;
        Some((pa, pb))
    }

    /// Fractional coverage of one side of the tile
    pub fn surface_area(&self, side: usize) -> f32 {
        debug_assert!(side < 2);
        if self.is_clear() {
            return 0.0;
        }
        if self.is_full() {
            return if side == 0 { 1.0 } else { 0.0 };
        }
        let (a, b) = decode_edge(self.edge_data);
        let verts = side_polygon_lattice(a, b, side);
        shoelace2(&verts) as f32 / (2.0 * (LATTICE * LATTICE) as f32)
    }

    /// Vertex loop of one side in tile-local [0,1] coordinates, CCW.
    /// None when the side has no area.
    pub fn side_polygon(&self, side: usize) -> Option<TilePolygon> {
        debug_assert!(side < 2);
        if self.is_clear() {
            return None;
        }
        if self.is_full() {
            if side != 0 {
                return None;
            }
            let mut square: TilePolygon = SmallVec::new();
            square.push(Vec2::new(0.0, 0.0));
            square.push(Vec2::new(1.0, 0.0));
            square.push(Vec2::new(1.0, 1.0));
            square.push(Vec2::new(0.0, 1.0));
            return Some(square);
        }
        let (a, b) = decode_edge(self.edge_data);
        let verts = side_polygon_lattice(a, b, side);
        Some(
            verts
                .iter()
                .map(|p| p.as_vec2() / LATTICE as f32)
                .collect(),
        )
    }

    /// Set the split line from two points in tile-local [0,1] space.
    /// The infinite line through them is clipped to the tile; side 0 ends
    /// up on the LEFT of the a->b direction, with both existing surfaces
    /// carried through. Returns false and leaves the tile unchanged when
    /// the line misses the tile, degenerates after quantization, or the
    /// tile is clear (there is nothing to split).
    ///
    /// Near-degenerate results collapse: a side below [`MIN_SPLIT_AREA`]
    /// vanishes (to Clear when the survivor is void, to Full otherwise),
    /// and identical surfaces on both sides collapse to Full.
    pub fn resurface(&mut self, a: Vec2, b: Vec2) -> bool {
        if self.is_clear() {
            return false;
        }
        let d = b - a;
        if d.length_squared() < 1e-12 {
            return false;
        }

        // Liang-Barsky clip of the infinite line to the unit square
        let mut t0 = f32::NEG_INFINITY;
        let mut t1 = f32::INFINITY;
        let checks = [
            (-d.x, a.x),
            (d.x, 1.0 - a.x),
            (-d.y, a.y),
            (d.y, 1.0 - a.y),
        ];
        for (p, q) in checks {
            if p.abs() < 1e-9 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
        }
        if t0 >= t1 {
            return false;
        }

        let ia = match quantize_boundary(a + d * t0) {
            Some(i) => i,
            None => return false,
        };
        let ib = match quantize_boundary(a + d * t1) {
            Some(i) => i,
            None => return false,
        };
        if ia == ib {
            return false;
        }

        let surfaces = self.surface;
        if surfaces[0] == surfaces[1] {
            // A split with identical surfaces is no split at all
            if surfaces[0] == MaterialId::VOID {
                self.make_clear();
            } else {
                self.make_full(surfaces[0]);
            }
            return true;
        }

        let verts = side_polygon_lattice(ia, ib, 0);
        let area0 = shoelace2(&verts) as f32 / (2.0 * (LATTICE * LATTICE) as f32);
        let area1 = 1.0 - area0;

        if area0 < MIN_SPLIT_AREA {
            if surfaces[1] == MaterialId::VOID {
                self.make_clear();
            } else {
                self.make_full(surfaces[1]);
            }
            return true;
        }
        if area1 < MIN_SPLIT_AREA {
            if surfaces[0] == MaterialId::VOID {
                self.make_clear();
            } else {
                self.make_full(surfaces[0]);
            }
            return true;
        }

        self.edge_data = encode_edge(ia, ib);
        true
    }

    /// Lattice span [min,max] that one side of this tile covers along one
    /// of its edges, measured along the edge axis (y for Left/Right,
    /// x for Down/Up). None when the side never reaches that edge.
    pub fn edge_span(&self, side: usize, dir: GridDir) -> Option<(i32, i32)> {
        debug_assert!(side < 2);
        if self.is_clear() {
            return None;
        }
        if self.is_full() {
            return if side == 0 { Some((0, LATTICE)) } else { None };
        }
        let (a, b) = decode_edge(self.edge_data);
        let verts = side_polygon_lattice(a, b, side);
        let mut span: Option<(i32, i32)> = None;
        for v in &verts {
            let on_edge = match dir {
                GridDir::Left => v.x == 0,
                GridDir::Right => v.x == LATTICE,
                GridDir::Down => v.y == 0,
                GridDir::Up => v.y == LATTICE,
            };
            if !on_edge {
                continue;
            }
            let t = match dir {
                GridDir::Left | GridDir::Right => v.y,
                GridDir::Down | GridDir::Up => v.x,
            };
            span = Some(match span {
                Some((lo, hi)) => (lo.min(t), hi.max(t)),
                None => (t, t),
            });
        }
        span
    }

    /// Connectivity predicate for flood fill and physics edge chaining:
    /// for each side of `other` (lying in direction `dir` from this tile),
    /// whether that side shares at least a boundary point of the common
    /// edge with this tile's side 0.
    pub fn surface_touches(&self, other: &Tile, dir: GridDir) -> (bool, bool) {
        let mine = match self.edge_span(0, dir) {
            Some(span) => span,
            None => return (false, false),
        };
        let far = dir.opposite();
        let touch = |span: Option<(i32, i32)>| {
            span.is_some_and(|(lo, hi)| mine.0.max(lo) <= mine.1.min(hi))
        };
        (
            touch(other.edge_span(0, far)),
            touch(other.edge_span(1, far)),
        )
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::CLEAR
    }
}

/// Snap a point on (or numerically near) the unit square boundary to the
/// nearest quantized perimeter position.
fn quantize_boundary(p: Vec2) -> Option<u8> {
    // Which edge is closest decides the pinned coordinate
    let dx = p.x.min(1.0 - p.x);
    let dy = p.y.min(1.0 - p.y);
    let (qx, qy) = if dx <= dy {
        let x = if p.x < 0.5 { 0 } else { LATTICE };
        let y = (p.y * LATTICE as f32).round().clamp(0.0, LATTICE as f32) as i32;
        (x, y)
    } else {
        let x = (p.x * LATTICE as f32).round().clamp(0.0, LATTICE as f32) as i32;
        let y = if p.y < 0.5 { 0 } else { LATTICE };
        (x, y)
    };
    perimeter_index(IVec2::new(qx, qy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_full_invariants() {
        let mut t = Tile::full(MaterialId::ROCK, 0);
        assert!(t.is_full());
        assert!(!t.is_clear());
        t.make_clear();
        assert!(t.is_clear());
        assert!(!t.is_full());
        assert_eq!(t.surface_area(0), 0.0);
    }

    #[test]
    fn test_perimeter_roundtrip() {
        for i in 0..PERIMETER_POINTS {
            assert_eq!(perimeter_index(perimeter_point(i)), Some(i));
        }
        assert_eq!(perimeter_index(IVec2::new(2, 2)), None);
    }

    #[test]
    fn test_invert_is_involution() {
        // Every valid split code plus the reserved ones
        for a in 0..PERIMETER_POINTS {
            for b in 0..PERIMETER_POINTS {
                if a == b {
                    continue;
                }
                let t = Tile {
                    edge_data: encode_edge(a, b),
                    surface: [MaterialId::ROCK, MaterialId::DIRT],
                    tile_set: 3,
                };
                assert_eq!(t.inverted().inverted(), t);
            }
        }
        let clear = Tile::CLEAR;
        assert_eq!(clear.inverted().inverted(), clear);
    }

    #[test]
    fn test_sides_partition_area() {
        for a in 0..PERIMETER_POINTS {
            for b in 0..PERIMETER_POINTS {
                if a == b {
                    continue;
                }
                let t = Tile {
                    edge_data: encode_edge(a, b),
                    surface: [MaterialId::ROCK, MaterialId::VOID],
                    tile_set: 0,
                };
                let total = t.surface_area(0) + t.surface_area(1);
                assert!(
                    (total - 1.0).abs() < 1e-5,
                    "sides of split {}->{} cover {}",
                    a,
                    b,
                    total
                );
            }
        }
    }

    #[test]
    fn test_diagonal_split_halves() {
        // Bottom-left corner to top-right corner
        let t = Tile {
            edge_data: encode_edge(0, 8),
            surface: [MaterialId::ROCK, MaterialId::VOID],
            tile_set: 0,
        };
        assert_eq!(t.surface_area(0), 0.5);
        assert_eq!(t.surface_area(1), 0.5);
    }

    #[test]
    fn test_resurface_vertical_split() {
        let mut t = Tile::full(MaterialId::ROCK, 0);
        // Upward line through x=0.5: side 0 (left of a->b) is x < 0.5
        assert!(t.resurface(Vec2::new(0.5, -1.0), Vec2::new(0.5, 2.0)));
        assert!(t.is_split());
        assert!((t.surface_area(0) - 0.5).abs() < 1e-5);
        assert_eq!(t.surface(0), MaterialId::ROCK);
        assert_eq!(t.surface(1), MaterialId::VOID);
    }

    #[test]
    fn test_resurface_miss_is_noop() {
        let mut t = Tile::full(MaterialId::ROCK, 0);
        let before = t;
        assert!(!t.resurface(Vec2::new(3.0, 3.0), Vec2::new(4.0, 3.0)));
        assert_eq!(t, before);
    }

    #[test]
    fn test_resurface_clear_is_noop() {
        let mut t = Tile::CLEAR;
        assert!(!t.resurface(Vec2::new(0.5, -1.0), Vec2::new(0.5, 2.0)));
        assert!(t.is_clear());
    }

    #[test]
    fn test_resurface_sliver_collapses_to_clear() {
        let mut t = Tile::full(MaterialId::ROCK, 0);
        // Side 0 (left of the upward line at x=0.05) keeps almost nothing:
        // the terrain wears away entirely
        assert!(t.resurface(Vec2::new(0.05, -1.0), Vec2::new(0.05, 2.0)));
        assert!(t.is_clear());
    }

    #[test]
    fn test_resurface_sliver_collapses_to_full() {
        let mut t = Tile::full(MaterialId::ROCK, 0);
        // Shaves almost nothing off the solid side
        assert!(t.resurface(Vec2::new(0.99, -1.0), Vec2::new(0.99, 2.0)));
        assert!(t.is_full());
        assert_eq!(t.surface(0), MaterialId::ROCK);
    }

    #[test]
    fn test_resurface_identical_surfaces_collapses_to_full() {
        let mut t = Tile {
            edge_data: encode_edge(2, 10),
            surface: [MaterialId::ROCK, MaterialId::ROCK],
            tile_set: 0,
        };
        assert!(t.resurface(Vec2::new(0.5, -1.0), Vec2::new(0.5, 2.0)));
        assert!(t.is_full());
    }

    #[test]
    fn test_edge_span_left_half() {
        // Vertical split at x = 0.5; side 0 is the left half
        let t = Tile {
            edge_data: encode_edge(2, 10),
            surface: [MaterialId::ROCK, MaterialId::VOID],
            tile_set: 0,
        };
        assert_eq!(t.edge_span(0, GridDir::Left), Some((0, 4)));
        assert_eq!(t.edge_span(0, GridDir::Right), None);
        assert_eq!(t.edge_span(0, GridDir::Down), Some((0, 2)));
        assert_eq!(t.edge_span(1, GridDir::Right), Some((0, 4)));
    }

    #[test]
    fn test_surface_touches_full_neighbors() {
        let a = Tile::full(MaterialId::ROCK, 0);
        let b = Tile::full(MaterialId::ROCK, 0);
        assert_eq!(a.surface_touches(&b, GridDir::Right), (true, false));
    }

    #[test]
    fn test_surface_touches_disjoint_sides() {
        // Left tile solid on its left half only: never reaches the shared edge
        let a = Tile {
            edge_data: encode_edge(2, 10),
            surface: [MaterialId::ROCK, MaterialId::VOID],
            tile_set: 0,
        };
        let b = Tile::full(MaterialId::ROCK, 0);
        assert_eq!(a.surface_touches(&b, GridDir::Right), (false, false));
        // But through the left edge it connects
        assert_eq!(a.surface_touches(&b, GridDir::Left), (true, false));
    }
}
