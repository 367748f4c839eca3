//! Relational stores backing the region index.
//!
//! Two logical databases live side by side in the store directory: the main
//! store (tiles plus point, name, and feature metadata and the per-region
//! bookkeeping rows) and the hillshade store (tiles only). The engine reads
//! and writes bookkeeping through [`MapStore`]; bulk import and removal live
//! in the sibling modules and run multi-statement work against the raw
//! connections.

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tilegrid_core::{JobId, RegionKey};

use crate::paths;

pub(crate) mod import;
pub(crate) mod removal;
mod schema;

pub use schema::SchemaError;

/// File name of the main store inside the store directory.
pub const MAIN_DATABASE_FILENAME: &str = "maps.db";

/// File name of the hillshade store inside the store directory.
pub const HILLSHADE_DATABASE_FILENAME: &str = "hillshade.db";

/// Errors raised while opening the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store directory could not be created.
    #[error(transparent)]
    Directory(#[from] paths::DestinationError),
    /// Opening one of the SQLite databases failed.
    #[error("failed to open store database at {path:?}")]
    Open {
        /// Location of the database on disk.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the store schema failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// One persisted bookkeeping row, as loaded during reconciliation.
///
/// Coordinates are kept raw here: the basemap sentinel `(-1, -1)` and any
/// out-of-grid garbage are classified by the engine, not the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegionRow {
    pub x: i64,
    pub y: i64,
    pub version: u16,
    pub downloading: Option<JobId>,
    pub hillshade_version: u16,
    pub hillshade_downloading: Option<JobId>,
}

/// Transactional CRUD over the main and hillshade databases.
#[derive(Debug)]
pub struct MapStore {
    main: Connection,
    hillshade: Connection,
    directory: Utf8PathBuf,
}

impl MapStore {
    /// Open (or create) both store databases under `directory`.
    pub fn open(directory: &Utf8Path) -> Result<Self, StoreError> {
        paths::ensure_directory(directory)?;
        let main = open_database(&directory.join(MAIN_DATABASE_FILENAME))?;
        let hillshade = open_database(&directory.join(HILLSHADE_DATABASE_FILENAME))?;
        schema::initialise_main_schema(&main)?;
        schema::initialise_hillshade_schema(&hillshade)?;
        Ok(Self {
            main,
            hillshade,
            directory: directory.to_path_buf(),
        })
    }

    /// Directory holding both database files.
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    pub(crate) fn main(&self) -> &Connection {
        &self.main
    }

    pub(crate) fn main_mut(&mut self) -> &mut Connection {
        &mut self.main
    }

    pub(crate) fn hillshade(&self) -> &Connection {
        &self.hillshade
    }

    pub(crate) fn hillshade_mut(&mut self) -> &mut Connection {
        &mut self.hillshade
    }

    /// Load every bookkeeping row that carries data or an in-flight job.
    pub(crate) fn load_region_rows(&self) -> Result<Vec<RegionRow>, rusqlite::Error> {
        let mut statement = self.main.prepare(
            "SELECT x, y, version, downloading, hillshade_version, hillshade_downloading
             FROM regions
             WHERE version != 0 OR downloading != 0
                OR hillshade_version != 0 OR hillshade_downloading != 0",
        )?;
        let mut rows = statement.query([])?;
        let mut loaded = Vec::new();
        while let Some(row) = rows.next()? {
            loaded.push(RegionRow {
                x: row.get(0)?,
                y: row.get(1)?,
                version: clamp_version(row.get(2)?),
                downloading: job_from_row(row.get(3)?),
                hillshade_version: clamp_version(row.get(4)?),
                hillshade_downloading: job_from_row(row.get(5)?),
            });
        }
        Ok(loaded)
    }

    /// Drop and recreate the bookkeeping table after a corrupt read.
    pub(crate) fn recreate_regions_table(&self) -> Result<(), SchemaError> {
        schema::recreate_regions_table(&self.main)
    }

    /// Persist a region's version stamp, clearing its main job id.
    pub fn write_version(
        &self,
        key: RegionKey,
        version: u16,
    ) -> Result<(), rusqlite::Error> {
        self.main
            .execute(
                "INSERT INTO regions (x, y, version, downloading) VALUES (?1, ?2, ?3, 0)
                 ON CONFLICT (x, y) DO UPDATE SET version = excluded.version, downloading = 0",
                params![key.column(), key.row(), version],
            )
            .map(|_| ())
    }

    /// Persist a region's main download job id (`None` clears it).
    pub fn write_job(
        &self,
        key: RegionKey,
        job: Option<JobId>,
    ) -> Result<(), rusqlite::Error> {
        self.main
            .execute(
                "INSERT INTO regions (x, y, downloading) VALUES (?1, ?2, ?3)
                 ON CONFLICT (x, y) DO UPDATE SET downloading = excluded.downloading",
                params![key.column(), key.row(), job_to_row(job)],
            )
            .map(|_| ())
    }

    /// Persist a region's hillshade version stamp, clearing its hillshade
    /// job id.
    pub fn write_hillshade_version(
        &self,
        key: RegionKey,
        version: u16,
    ) -> Result<(), rusqlite::Error> {
        self.main
            .execute(
                "INSERT INTO regions (x, y, hillshade_version, hillshade_downloading)
                 VALUES (?1, ?2, ?3, 0)
                 ON CONFLICT (x, y) DO UPDATE SET
                    hillshade_version = excluded.hillshade_version,
                    hillshade_downloading = 0",
                params![key.column(), key.row(), version],
            )
            .map(|_| ())
    }

    /// Persist a region's hillshade download job id (`None` clears it).
    pub fn write_hillshade_job(
        &self,
        key: RegionKey,
        job: Option<JobId>,
    ) -> Result<(), rusqlite::Error> {
        self.main
            .execute(
                "INSERT INTO regions (x, y, hillshade_downloading) VALUES (?1, ?2, ?3)
                 ON CONFLICT (x, y) DO UPDATE SET
                    hillshade_downloading = excluded.hillshade_downloading",
                params![key.column(), key.row(), job_to_row(job)],
            )
            .map(|_| ())
    }

    /// Whether the main store carries the full-text mirror of the name
    /// dictionary. Recovered or legacy databases may lack it.
    pub(crate) fn has_full_text_index(&self) -> bool {
        self.main
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'names_fts'",
                [],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .unwrap_or(false)
    }
}

fn open_database(path: &Utf8Path) -> Result<Connection, StoreError> {
    Connection::open(path.as_std_path()).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn clamp_version(value: i64) -> u16 {
    u16::try_from(value).unwrap_or_else(|_| {
        log::warn!("clamping out-of-range version stamp {value}");
        0
    })
}

fn job_from_row(value: i64) -> Option<JobId> {
    (value != 0).then(|| JobId::new(value))
}

fn job_to_row(job: Option<JobId>) -> i64 {
    job.map_or(0, JobId::get)
}
