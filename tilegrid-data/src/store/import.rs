//! Transactional import of downloaded tile packages.
//!
//! A package is a self-contained SQLite file using the same schema as the
//! main store. Import copies it row by row, one transaction per logical
//! table, so that an interrupted import never leaves a table half-visible:
//! names first (with the full-text mirror when the store carries one), then
//! features together with their region-ownership rows, then feature names,
//! then tiles. Hillshade packages carry tiles only. The version stamp from
//! the package metadata is returned to the caller for bookkeeping.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use thiserror::Error;
use tilegrid_core::{ProgressSink, RegionCoordinate};

use super::MapStore;

/// Errors raised while importing a tile package.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The package file could not be opened as a SQLite database.
    #[error("failed to open tile package at {path:?}")]
    OpenPackage {
        /// Location of the package file.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A copy step failed.
    #[error("failed to {operation}")]
    Copy {
        /// Description of the failed step.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The package carried a version stamp that is not a number.
    #[error("package version stamp '{value}' is not a number")]
    InvalidStamp {
        /// Raw stamp value found in the package metadata.
        value: String,
    },
}

/// Copy a main-map package into the main store and return its version
/// stamp.
pub(crate) fn import_map_package(
    store: &mut MapStore,
    coordinate: RegionCoordinate,
    package_path: &Path,
    progress: Option<&dyn ProgressSink>,
) -> Result<u16, ImportError> {
    let package = open_package(package_path)?;
    if let Some(sink) = progress {
        let total = count_rows(&package, "names")?
            + count_rows(&package, "features")?
            + count_rows(&package, "feature_names")?
            + count_rows(&package, "tiles")?;
        sink.started(total);
    }
    let has_fts = store.has_full_text_index();
    let mut counter = ProgressCounter::new(progress);

    copy_names(store.main_mut(), &package, has_fts, &mut counter)?;
    log::debug!("imported names for {coordinate}");
    copy_features(store.main_mut(), &package, coordinate, &mut counter)?;
    log::debug!("imported features for {coordinate}");
    copy_feature_names(store.main_mut(), &package, &mut counter)?;
    log::debug!("imported feature names for {coordinate}");
    copy_tiles(store.main_mut(), &package, &mut counter)?;
    log::debug!("imported tiles for {coordinate}");

    read_version_stamp(&package)
}

/// Copy a hillshade package into the hillshade store and return its
/// version stamp.
pub(crate) fn import_hillshade_package(
    store: &mut MapStore,
    coordinate: RegionCoordinate,
    package_path: &Path,
    progress: Option<&dyn ProgressSink>,
) -> Result<u16, ImportError> {
    let package = open_package(package_path)?;
    if let Some(sink) = progress {
        sink.started(count_rows(&package, "tiles")?);
    }
    let mut counter = ProgressCounter::new(progress);

    copy_tiles(store.hillshade_mut(), &package, &mut counter)?;
    log::debug!("imported hillshade tiles for {coordinate}");

    read_version_stamp(&package)
}

struct ProgressCounter<'a> {
    sink: Option<&'a dyn ProgressSink>,
    completed: u64,
}

impl<'a> ProgressCounter<'a> {
    fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink, completed: 0 }
    }

    fn advance(&mut self) {
        self.completed += 1;
        if let Some(sink) = self.sink {
            sink.progress(self.completed);
        }
    }
}

fn open_package(path: &Path) -> Result<Connection, ImportError> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|source| {
        ImportError::OpenPackage {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn count_rows(package: &Connection, table: &str) -> Result<u64, ImportError> {
    package
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| u64::try_from(count).unwrap_or(0))
        .map_err(|source| ImportError::Copy {
            operation: "count package rows",
            source,
        })
}

fn copy_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> ImportError {
    move |source| ImportError::Copy { operation, source }
}

fn copy_names(
    main: &mut Connection,
    package: &Connection,
    has_fts: bool,
    counter: &mut ProgressCounter<'_>,
) -> Result<(), ImportError> {
    let tx = main
        .transaction()
        .map_err(copy_error("begin names transaction"))?;
    {
        let mut insert = tx
            .prepare_cached("REPLACE INTO names (id, name) VALUES (?1, ?2)")
            .map_err(copy_error("prepare names insert"))?;
        let mut insert_fts = if has_fts {
            Some(
                tx.prepare_cached("REPLACE INTO names_fts (docid, name) VALUES (?1, ?2)")
                    .map_err(copy_error("prepare names_fts insert"))?,
            )
        } else {
            None
        };
        let mut select = package
            .prepare("SELECT id, name FROM names")
            .map_err(copy_error("read package names"))?;
        let mut rows = select.query([]).map_err(copy_error("read package names"))?;
        while let Some(row) = rows.next().map_err(copy_error("read package names"))? {
            let id: i64 = row.get(0).map_err(copy_error("read package names"))?;
            let name: String = row.get(1).map_err(copy_error("read package names"))?;
            insert
                .execute(params![id, name.as_str()])
                .map_err(copy_error("copy names row"))?;
            if let Some(fts) = insert_fts.as_mut() {
                fts.execute(params![id, name.as_str()])
                    .map_err(copy_error("copy names_fts row"))?;
            }
            counter.advance();
        }
    }
    tx.commit().map_err(copy_error("commit names transaction"))
}

fn copy_features(
    main: &mut Connection,
    package: &Connection,
    coordinate: RegionCoordinate,
    counter: &mut ProgressCounter<'_>,
) -> Result<(), ImportError> {
    let tx = main
        .transaction()
        .map_err(copy_error("begin features transaction"))?;
    {
        let mut insert = tx
            .prepare_cached("REPLACE INTO features (id, kind, lat, lon) VALUES (?1, ?2, ?3, ?4)")
            .map_err(copy_error("prepare features insert"))?;
        let mut insert_owner = tx
            .prepare_cached("REPLACE INTO region_features (x, y, feature) VALUES (?1, ?2, ?3)")
            .map_err(copy_error("prepare region_features insert"))?;
        let mut select = package
            .prepare("SELECT id, kind, lat, lon FROM features")
            .map_err(copy_error("read package features"))?;
        let mut rows = select
            .query([])
            .map_err(copy_error("read package features"))?;
        while let Some(row) = rows.next().map_err(copy_error("read package features"))? {
            let id: i64 = row.get(0).map_err(copy_error("read package features"))?;
            let kind: i64 = row.get(1).map_err(copy_error("read package features"))?;
            let lat: f64 = row.get(2).map_err(copy_error("read package features"))?;
            let lon: f64 = row.get(3).map_err(copy_error("read package features"))?;
            insert
                .execute(params![id, kind, lat, lon])
                .map_err(copy_error("copy features row"))?;
            insert_owner
                .execute(params![
                    i64::from(coordinate.x()),
                    i64::from(coordinate.y()),
                    id
                ])
                .map_err(copy_error("copy region_features row"))?;
            counter.advance();
        }
    }
    tx.commit()
        .map_err(copy_error("commit features transaction"))
}

fn copy_feature_names(
    main: &mut Connection,
    package: &Connection,
    counter: &mut ProgressCounter<'_>,
) -> Result<(), ImportError> {
    let tx = main
        .transaction()
        .map_err(copy_error("begin feature_names transaction"))?;
    {
        let mut insert = tx
            .prepare_cached("REPLACE INTO feature_names (feature, lang, name) VALUES (?1, ?2, ?3)")
            .map_err(copy_error("prepare feature_names insert"))?;
        let mut select = package
            .prepare("SELECT feature, lang, name FROM feature_names")
            .map_err(copy_error("read package feature_names"))?;
        let mut rows = select
            .query([])
            .map_err(copy_error("read package feature_names"))?;
        while let Some(row) = rows
            .next()
            .map_err(copy_error("read package feature_names"))?
        {
            let feature: i64 = row.get(0).map_err(copy_error("read package feature_names"))?;
            let lang: i64 = row.get(1).map_err(copy_error("read package feature_names"))?;
            let name: i64 = row.get(2).map_err(copy_error("read package feature_names"))?;
            insert
                .execute(params![feature, lang, name])
                .map_err(copy_error("copy feature_names row"))?;
            counter.advance();
        }
    }
    tx.commit()
        .map_err(copy_error("commit feature_names transaction"))
}

fn copy_tiles(
    target: &mut Connection,
    package: &Connection,
    counter: &mut ProgressCounter<'_>,
) -> Result<(), ImportError> {
    let tx = target
        .transaction()
        .map_err(copy_error("begin tiles transaction"))?;
    {
        let mut insert = tx
            .prepare_cached(
                "REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(copy_error("prepare tiles insert"))?;
        let mut select = package
            .prepare("SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles")
            .map_err(copy_error("read package tiles"))?;
        let mut rows = select.query([]).map_err(copy_error("read package tiles"))?;
        while let Some(row) = rows.next().map_err(copy_error("read package tiles"))? {
            let zoom: i64 = row.get(0).map_err(copy_error("read package tiles"))?;
            let column: i64 = row.get(1).map_err(copy_error("read package tiles"))?;
            let tile_row: i64 = row.get(2).map_err(copy_error("read package tiles"))?;
            let data: Vec<u8> = row.get(3).map_err(copy_error("read package tiles"))?;
            insert
                .execute(params![zoom, column, tile_row, data])
                .map_err(copy_error("copy tiles row"))?;
            counter.advance();
        }
    }
    tx.commit().map_err(copy_error("commit tiles transaction"))
}

fn read_version_stamp(package: &Connection) -> Result<u16, ImportError> {
    let value: Option<Option<String>> = package
        .query_row(
            "SELECT value FROM metadata WHERE name = 'timestamp'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(copy_error("read package version stamp"))?;
    match value.flatten() {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ImportError::InvalidStamp { value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn package_with_stamp(stamp: Option<&str>) -> Connection {
        let connection = Connection::open_in_memory().expect("open in-memory database");
        connection
            .execute(
                "CREATE TABLE metadata (name TEXT PRIMARY KEY, value TEXT)",
                [],
            )
            .expect("create metadata table");
        if let Some(stamp) = stamp {
            connection
                .execute(
                    "INSERT INTO metadata (name, value) VALUES ('timestamp', ?1)",
                    [stamp],
                )
                .expect("insert stamp");
        }
        connection
    }

    #[rstest]
    fn stamp_parses_from_metadata() {
        let package = package_with_stamp(Some("1612"));
        assert_eq!(read_version_stamp(&package).expect("read stamp"), 1612);
    }

    #[rstest]
    fn missing_stamp_reads_as_zero() {
        let package = package_with_stamp(None);
        assert_eq!(read_version_stamp(&package).expect("read stamp"), 0);
    }

    #[rstest]
    fn non_numeric_stamp_is_rejected() {
        let package = package_with_stamp(Some("yesterday"));
        let error = read_version_stamp(&package).expect_err("stamp should not parse");
        assert!(matches!(error, ImportError::InvalidStamp { value } if value == "yesterday"));
    }
}
