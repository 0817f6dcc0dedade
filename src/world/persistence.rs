//! Binary save/load of the whole grid
//!
//! One version-tagged file: a small header (validated before anything
//! else), then every patch in row-major order as its raw tile array plus
//! descriptor list, bincode-encoded and lz4-compressed. Loads never leave
//! the world half-built: any mismatch or corruption is reported and the
//! caller substitutes the built-in default dataset. The same byte layout
//! serves on-disk saves, embedded resource fallbacks, and undo snapshots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::ObjectDescriptor;
use crate::world::generation::default_grid;
use crate::world::grid::{GridLayout, HandleAllocator, WorldGrid};
use crate::world::patch::Patch;
use crate::world::tile::Tile;

pub const SAVE_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("save file version {found} (expected {expected})")]
    VersionMismatch { found: u8, expected: u8 },

    #[error(
        "save file is a {found_width}x{found_width} grid of {found_patch}-tile patches with {found_layers} layers \
         (expected {expected_width}x{expected_width}, {expected_patch} tiles, {expected_layers} layers)"
    )]
    DimensionMismatch {
        found_width: i32,
        found_patch: i32,
        found_layers: i32,
        expected_width: i32,
        expected_patch: i32,
        expected_layers: i32,
    },

    #[error("corrupt save data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Serialize, Deserialize)]
struct SaveHeader {
    version: u8,
    spawn_x: f32,
    spawn_y: f32,
    grid_width: i32,
    patch_size: i32,
    layer_count: i32,
    next_handle: u32,
}

#[derive(Serialize)]
struct PatchRecordRef<'a> {
    tiles: &'a [Tile],
    descriptors: &'a [ObjectDescriptor],
}

#[derive(Deserialize)]
struct PatchRecord {
    tiles: Vec<Tile>,
    descriptors: Vec<ObjectDescriptor>,
}

/// Serialize the grid to its compressed file bytes
pub fn to_bytes(grid: &WorldGrid) -> Result<Vec<u8>> {
    let config = bincode_next::config::standard();
    let layout = grid.layout();
    let header = SaveHeader {
        version: SAVE_VERSION,
        spawn_x: grid.spawn_point.x,
        spawn_y: grid.spawn_point.y,
        grid_width: layout.grid_width as i32,
        patch_size: layout.patch_size as i32,
        layer_count: layout.layer_count as i32,
        next_handle: grid.handle_checkpoint(),
    };

    let mut payload =
        bincode_next::serde::encode_to_vec(&header, config).context("Failed to encode header")?;
    for patch in grid.patches() {
        let record = PatchRecordRef {
            tiles: patch.tiles(),
            descriptors: patch.descriptors(),
        };
        let bytes = bincode_next::serde::encode_to_vec(&record, config)
            .context("Failed to encode patch")?;
        payload.extend_from_slice(&bytes);
    }

    Ok(lz4_flex::compress_prepend_size(&payload))
}

/// Rebuild a grid from file bytes. The header is decoded and validated
/// against the expected layout before any patch data is touched.
pub fn from_bytes(bytes: &[u8], expected: &GridLayout) -> Result<WorldGrid, LoadError> {
    let payload = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| LoadError::Corrupt(format!("decompression failed: {e}")))?;
    let config = bincode_next::config::standard();

    let (header, mut offset): (SaveHeader, usize) =
        bincode_next::serde::decode_from_slice(&payload, config)
            .map_err(|e| LoadError::Corrupt(format!("bad header: {e:?}")))?;

    if header.version != SAVE_VERSION {
        return Err(LoadError::VersionMismatch {
            found: header.version,
            expected: SAVE_VERSION,
        });
    }
    if header.grid_width != expected.grid_width as i32
        || header.patch_size != expected.patch_size as i32
        || header.layer_count != expected.layer_count as i32
    {
        return Err(LoadError::DimensionMismatch {
            found_width: header.grid_width,
            found_patch: header.patch_size,
            found_layers: header.layer_count,
            expected_width: expected.grid_width as i32,
            expected_patch: expected.patch_size as i32,
            expected_layers: expected.layer_count as i32,
        });
    }

    let mut patches = Vec::with_capacity(expected.patch_count());
    for iy in 0..expected.grid_width {
        for ix in 0..expected.grid_width {
            let (record, used): (PatchRecord, usize) =
                bincode_next::serde::decode_from_slice(&payload[offset..], config).map_err(
                    |e| LoadError::Corrupt(format!("bad patch ({ix}, {iy}): {e:?}")),
                )?;
            offset += used;

            if record.tiles.len() != expected.tiles_per_patch() {
                return Err(LoadError::Corrupt(format!(
                    "patch ({ix}, {iy}) holds {} tiles, expected {}",
                    record.tiles.len(),
                    expected.tiles_per_patch()
                )));
            }
            if let Some(d) = record
                .descriptors
                .iter()
                .find(|d| d.handle.raw() >= header.next_handle)
            {
                return Err(LoadError::Corrupt(format!(
                    "descriptor handle {} is not below the saved allocator {}",
                    d.handle.raw(),
                    header.next_handle
                )));
            }

            patches.push(Patch::from_parts(
                IVec2::new(ix as i32, iy as i32),
                expected,
                record.tiles,
                record.descriptors,
            ));
        }
    }

    Ok(WorldGrid::from_parts(
        expected.clone(),
        patches,
        HandleAllocator::starting_at(header.next_handle),
        Vec2::new(header.spawn_x, header.spawn_y),
    ))
}

/// Save the grid to disk. Writes a temp file then renames so a crash
/// mid-save never clobbers the previous file.
pub fn save_grid(grid: &WorldGrid, path: &Path) -> Result<()> {
    let bytes = to_bytes(grid)?;
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, &bytes).context("Failed to write world temp file")?;
    std::fs::rename(&temp_path, path).context("Failed to rename world file")?;
    log::info!(
        "Saved world to {:?} ({} bytes compressed)",
        path,
        bytes.len()
    );
    Ok(())
}

pub fn load_grid(path: &Path, expected: &GridLayout) -> Result<WorldGrid, LoadError> {
    let bytes = std::fs::read(path)?;
    from_bytes(&bytes, expected)
}

/// Load with fallbacks: the on-disk file, then the embedded/packaged
/// resource bytes, then the generated default dataset. Returns the grid
/// plus the condition that forced a fallback, if any, so the UI can
/// surface it.
pub fn load_or_default(
    path: &Path,
    embedded: Option<&[u8]>,
    layout: &GridLayout,
    seed: i32,
) -> (WorldGrid, Option<LoadError>) {
    let disk_error = match load_grid(path, layout) {
        Ok(grid) => {
            log::info!("Loaded world from {:?}", path);
            return (grid, None);
        }
        Err(e) => {
            log::warn!("Failed to load world from {:?}: {}", path, e);
            e
        }
    };

    if let Some(bytes) = embedded {
        match from_bytes(bytes, layout) {
            Ok(grid) => {
                log::info!("Loaded world from embedded resource");
                return (grid, Some(disk_error));
            }
            Err(e) => {
                log::warn!("Failed to load embedded world: {}", e);
            }
        }
    }

    log::warn!("Falling back to generated default world");
    (default_grid(layout, seed), Some(disk_error))
}

/// Path of a numbered undo/redo snapshot in `dir`
pub fn snapshot_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("snapshot_{index:03}.bin"))
}

/// Undo/redo snapshotting writes the ordinary save format to numbered
/// files
pub fn save_snapshot(grid: &WorldGrid, dir: &Path, index: u32) -> Result<()> {
    std::fs::create_dir_all(dir).context("Failed to create snapshot directory")?;
    save_grid(grid, &snapshot_path(dir, index))
}

pub fn load_snapshot(dir: &Path, index: u32, expected: &GridLayout) -> Result<WorldGrid, LoadError> {
    load_grid(&snapshot_path(dir, index), expected)
}
