//! Region removal and orphan clean-up.
//!
//! Removal walks a fixed sequence of delete steps: the tile rectangles the
//! region covers at each owned zoom level, the hillshade rectangles when
//! the region carried hillshade data, the feature rows owned by the region,
//! the ownership rows themselves, the feature-name rows left dangling, and
//! finally a global sweep of the shared name dictionary for ids no other
//! region references. The steps run without an enclosing transaction, as
//! each is individually idempotent; a failure aborts the remaining steps
//! and partial removal is accepted.

use rusqlite::params;
use thiserror::Error;
use tilegrid_core::{
    ProgressSink, RegionCoordinate, RegionKey, MAX_HILLSHADE_TILE_ZOOM, MAX_TILE_ZOOM,
    MIN_TILE_ZOOM,
};

use super::MapStore;

/// Errors raised while removing a region from the stores.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// A delete step failed.
    #[error("failed to {step}")]
    Query {
        /// Description of the failed step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

const DELETE_TILE_RECT: &str = "DELETE FROM tiles
    WHERE zoom_level = ?1
      AND tile_column BETWEEN ?2 AND ?3
      AND tile_row BETWEEN ?4 AND ?5";

const SELECT_UNUSED_NAMES: &str =
    "SELECT id FROM names WHERE id NOT IN (SELECT name FROM feature_names)";

const DELETE_UNUSED_NAMES: &str =
    "DELETE FROM names WHERE id NOT IN (SELECT name FROM feature_names)";

/// Delete everything the region owns from both stores and reset its
/// bookkeeping row. Progress, when supplied, receives coarse percentage
/// milestones rather than per-row counts.
pub(crate) fn remove_region(
    store: &MapStore,
    coordinate: RegionCoordinate,
    remove_hillshade: bool,
    progress: Option<&dyn ProgressSink>,
) -> Result<(), RemovalError> {
    if let Some(sink) = progress {
        sink.started(100);
    }
    let milestones = Milestones { sink: progress };

    delete_tiles(store, coordinate)?;
    log::debug!("removed tiles for {coordinate}");
    milestones.report(40);

    if remove_hillshade {
        delete_hillshade_tiles(store, coordinate)?;
        log::debug!("removed hillshade tiles for {coordinate}");
    }
    milestones.report(55);

    store
        .main()
        .execute(
            "DELETE FROM features WHERE id IN
                (SELECT feature FROM region_features WHERE x = ?1 AND y = ?2)",
            params![i64::from(coordinate.x()), i64::from(coordinate.y())],
        )
        .map_err(step_error("delete owned features"))?;
    log::debug!("removed features for {coordinate}");
    milestones.report(70);

    store
        .main()
        .execute(
            "DELETE FROM region_features WHERE x = ?1 AND y = ?2",
            params![i64::from(coordinate.x()), i64::from(coordinate.y())],
        )
        .map_err(step_error("delete ownership rows"))?;
    milestones.report(78);

    store
        .main()
        .execute(
            "DELETE FROM feature_names WHERE feature NOT IN (SELECT id FROM features)",
            [],
        )
        .map_err(step_error("delete orphaned feature names"))?;
    milestones.report(85);

    collect_garbage_names(store)?;
    log::debug!("removed unused names after {coordinate}");
    milestones.report(95);

    let key = RegionKey::from(coordinate);
    store
        .write_version(key, 0)
        .map_err(step_error("reset region version"))?;
    store
        .write_hillshade_version(key, 0)
        .map_err(step_error("reset hillshade version"))?;
    milestones.report(100);

    Ok(())
}

struct Milestones<'a> {
    sink: Option<&'a dyn ProgressSink>,
}

impl Milestones<'_> {
    fn report(&self, completed: u64) {
        if let Some(sink) = self.sink {
            sink.progress(completed);
        }
    }
}

fn step_error(step: &'static str) -> impl Fn(rusqlite::Error) -> RemovalError {
    move |source| RemovalError::Query { step, source }
}

fn delete_tiles(store: &MapStore, coordinate: RegionCoordinate) -> Result<(), RemovalError> {
    let mut statement = store
        .main()
        .prepare_cached(DELETE_TILE_RECT)
        .map_err(step_error("prepare tile delete"))?;
    for zoom in MIN_TILE_ZOOM..=MAX_TILE_ZOOM {
        let Some(rect) = coordinate.tile_rect(zoom) else {
            continue;
        };
        statement
            .execute(params![
                zoom,
                rect.min_column,
                rect.max_column,
                rect.min_row,
                rect.max_row
            ])
            .map_err(step_error("delete tile rectangle"))?;
    }
    Ok(())
}

fn delete_hillshade_tiles(
    store: &MapStore,
    coordinate: RegionCoordinate,
) -> Result<(), RemovalError> {
    let mut statement = store
        .hillshade()
        .prepare_cached(DELETE_TILE_RECT)
        .map_err(step_error("prepare hillshade tile delete"))?;
    for zoom in MIN_TILE_ZOOM..=MAX_HILLSHADE_TILE_ZOOM {
        let Some(rect) = coordinate.tile_rect(zoom) else {
            continue;
        };
        statement
            .execute(params![
                zoom,
                rect.min_column,
                rect.max_column,
                rect.min_row,
                rect.max_row
            ])
            .map_err(step_error("delete hillshade tile rectangle"))?;
    }
    Ok(())
}

/// Drop every name id no feature references any more, together with its
/// full-text mirror row when the store carries the mirror. One global
/// query per removal; the dictionary is shared across regions so the sweep
/// cannot be scoped tighter.
fn collect_garbage_names(store: &MapStore) -> Result<(), RemovalError> {
    if store.has_full_text_index() {
        let mut statement = store
            .main()
            .prepare_cached(SELECT_UNUSED_NAMES)
            .map_err(step_error("prepare unused-name scan"))?;
        let mut rows = statement
            .query([])
            .map_err(step_error("scan unused names"))?;
        let mut unused = Vec::new();
        while let Some(row) = rows.next().map_err(step_error("scan unused names"))? {
            unused.push(row.get::<_, i64>(0).map_err(step_error("scan unused names"))?);
        }
        if !unused.is_empty() {
            store
                .main()
                .execute(&delete_mirror_rows_sql(&unused), [])
                .map_err(step_error("delete full-text mirror rows"))?;
        }
    }
    store
        .main()
        .execute(DELETE_UNUSED_NAMES, [])
        .map_err(step_error("delete unused names"))?;
    Ok(())
}

fn delete_mirror_rows_sql(ids: &[i64]) -> String {
    let list = ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("DELETE FROM names_fts WHERE docid IN ({list})")
}
