//! SQLite schema for the map and hillshade stores.
//!
//! Downloaded tile packages use the same multi-table layout as the main
//! store, which is what makes the row-by-row import a straight copy. The
//! `regions` bookkeeping table is the only table the engine ever recreates
//! on its own: a corrupt bookkeeping schema must not prevent startup.

use rusqlite::Connection;
use thiserror::Error;

/// Errors raised while creating or repairing the store schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A schema statement failed.
    #[error("failed to execute schema step '{step}'")]
    Migration {
        /// Label of the failed step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

const CREATE_REGIONS: &str = "CREATE TABLE IF NOT EXISTS regions (
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    downloading INTEGER NOT NULL DEFAULT 0,
    hillshade_version INTEGER NOT NULL DEFAULT 0,
    hillshade_downloading INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (x, y)
) WITHOUT ROWID";

const CREATE_TILES: &str = "CREATE TABLE IF NOT EXISTS tiles (
    zoom_level INTEGER NOT NULL,
    tile_column INTEGER NOT NULL,
    tile_row INTEGER NOT NULL,
    tile_data BLOB NOT NULL,
    PRIMARY KEY (zoom_level, tile_column, tile_row)
)";

const CREATE_NAMES: &str = "CREATE TABLE IF NOT EXISTS names (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
)";

const CREATE_NAMES_FTS: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS names_fts USING fts4(name)";

const CREATE_FEATURES: &str = "CREATE TABLE IF NOT EXISTS features (
    id INTEGER PRIMARY KEY,
    kind INTEGER NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL
)";

const CREATE_FEATURE_NAMES: &str = "CREATE TABLE IF NOT EXISTS feature_names (
    feature INTEGER NOT NULL,
    lang INTEGER NOT NULL,
    name INTEGER NOT NULL,
    PRIMARY KEY (feature, lang)
) WITHOUT ROWID";

const CREATE_REGION_FEATURES: &str = "CREATE TABLE IF NOT EXISTS region_features (
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    feature INTEGER NOT NULL,
    PRIMARY KEY (x, y, feature)
) WITHOUT ROWID";

const CREATE_METADATA: &str = "CREATE TABLE IF NOT EXISTS metadata (
    name TEXT PRIMARY KEY,
    value TEXT
) WITHOUT ROWID";

/// Create the main store tables when missing.
pub(crate) fn initialise_main_schema(connection: &Connection) -> Result<(), SchemaError> {
    run_schema_step(connection, "create regions", CREATE_REGIONS)?;
    run_schema_step(connection, "create tiles", CREATE_TILES)?;
    run_schema_step(connection, "create names", CREATE_NAMES)?;
    run_schema_step(connection, "create names_fts", CREATE_NAMES_FTS)?;
    run_schema_step(connection, "create features", CREATE_FEATURES)?;
    run_schema_step(connection, "create feature_names", CREATE_FEATURE_NAMES)?;
    run_schema_step(connection, "create region_features", CREATE_REGION_FEATURES)?;
    run_schema_step(connection, "create metadata", CREATE_METADATA)
}

/// Create the hillshade store tables when missing.
pub(crate) fn initialise_hillshade_schema(connection: &Connection) -> Result<(), SchemaError> {
    run_schema_step(connection, "create hillshade tiles", CREATE_TILES)?;
    run_schema_step(connection, "create hillshade metadata", CREATE_METADATA)
}

/// Drop and recreate the `regions` bookkeeping table.
///
/// Recovery path for an unreadable bookkeeping schema: the tile and feature
/// tables are left untouched, only the per-region rows are lost.
pub(crate) fn recreate_regions_table(connection: &Connection) -> Result<(), SchemaError> {
    run_schema_step(connection, "drop regions", "DROP TABLE IF EXISTS regions")?;
    run_schema_step(connection, "create regions", CREATE_REGIONS)
}

fn run_schema_step(
    connection: &Connection,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    connection
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}
