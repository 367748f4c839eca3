//! Applies the published region index manifest to the engine.
//!
//! The manifest is a JSON document published next to the packages. It
//! lists, per region, the version and byte size of the downloadable main
//! and hillshade packages, plus an entry for the basemap. Fetching it is
//! owned by a network collaborator; this module only parses a reader and
//! feeds the engine's status setters, then marks download sizes as
//! available.

use std::io::Read;

use serde::Deserialize;
use thiserror::Error;
use tilegrid_core::RegionCoordinate;

use crate::index::RegionIndex;

/// Errors raised while applying a region manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest was not valid JSON of the expected shape.
    #[error("failed to parse region manifest: {source}")]
    Parse {
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RegionManifest {
    #[serde(default)]
    basemap: Option<BasemapEntry>,
    #[serde(default)]
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct BasemapEntry {
    version: u16,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    x: i64,
    y: i64,
    version: u16,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    hillshade_version: u16,
    #[serde(default)]
    hillshade_size: u64,
}

/// Counts of manifest entries applied and ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    /// Region entries applied to the grid.
    pub regions: usize,
    /// Entries ignored because their coordinates fall outside the grid.
    pub skipped: usize,
}

/// Parse a manifest from `reader` and apply it to `index`.
///
/// Every valid region entry updates the region's download status; entries
/// outside the grid are counted and skipped. Afterwards download sizes are
/// flagged available, which also auto-deselects any pending download
/// selection the manifest did not price.
pub fn apply_region_manifest(
    index: &mut RegionIndex,
    reader: impl Read,
) -> Result<ManifestSummary, ManifestError> {
    let manifest: RegionManifest =
        serde_json::from_reader(reader).map_err(|source| ManifestError::Parse { source })?;
    let mut summary = ManifestSummary::default();
    if let Some(basemap) = manifest.basemap {
        index.set_basemap_status(basemap.version, basemap.size);
    }
    for entry in manifest.regions {
        let Some(coordinate) = RegionCoordinate::from_raw(entry.x, entry.y) else {
            log::warn!(
                "ignoring manifest region ({}, {}) outside the grid",
                entry.x,
                entry.y
            );
            summary.skipped += 1;
            continue;
        };
        index.set_native_map_status(coordinate, entry.version, entry.size);
        index.set_native_hillshade_status(coordinate, entry.hillshade_version, entry.hillshade_size);
        summary.regions += 1;
    }
    index.set_has_download_sizes(true, false);
    Ok(summary)
}
