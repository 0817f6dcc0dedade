//! World management - tiles, patches, streaming, saving

mod flood;
pub mod generation;
mod grid;
mod patch;
pub mod persistence;
mod streaming;
pub mod tile;

pub use flood::flood_resurface;
pub use generation::{default_grid, DEFAULT_SEED};
pub use grid::{GridLayout, HandleAllocator, WorldGrid};
pub use patch::{DirtyState, Patch};
pub use persistence::{
    from_bytes, load_grid, load_or_default, load_snapshot, save_grid, save_snapshot,
    snapshot_path, to_bytes, LoadError, SAVE_VERSION,
};
pub use streaming::{StreamWindow, Streamer};
pub use tile::{GridDir, Tile, TilePolygon, MIN_SPLIT_AREA};
