//! Test doubles and fixture builders shared by the crate's test suites.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tilegrid_core::{
    DownloadJobManager, IndexStats, JobId, JobManagerError, JobRequest, JobStatus,
    MapStateListener, ProgressSink, RegionAction, RegionCoordinate, RemovalDispatcher,
};

use crate::jobs::{PackageTransport, TransportError};

/// Build a grid coordinate, panicking on invalid test input.
pub fn coordinate(x: u8, y: u8) -> RegionCoordinate {
    RegionCoordinate::new(x, y).expect("test coordinate should be valid")
}

/// Scriptable in-memory [`DownloadJobManager`].
///
/// Submissions are recorded and handed incrementing identifiers starting
/// at 1; statuses default to [`JobStatus::Pending`] until a test scripts
/// them.
#[derive(Debug)]
pub struct FakeJobManager {
    next_id: AtomicI64,
    submitted: Mutex<Vec<JobRequest>>,
    statuses: Mutex<HashMap<JobId, JobStatus>>,
    cancelled: Mutex<Vec<JobId>>,
    reject: AtomicBool,
}

impl FakeJobManager {
    /// Construct an empty manager.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            submitted: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    /// Every request submitted so far, in order.
    pub fn submitted(&self) -> Vec<JobRequest> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every identifier cancelled so far, in order.
    pub fn cancelled(&self) -> Vec<JobId> {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Script the status reported for `id`.
    pub fn set_status(&self, id: JobId, status: JobStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, status);
    }

    /// Make every further submission fail.
    pub fn reject_submissions(&self) {
        self.reject.store(true, Ordering::Relaxed);
    }
}

impl Default for FakeJobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadJobManager for FakeJobManager {
    fn submit(&self, request: JobRequest) -> Result<JobId, JobManagerError> {
        if self.reject.load(Ordering::Relaxed) {
            return Err(JobManagerError::Submit {
                url: request.url,
                message: "rejected by test double".to_owned(),
            });
        }
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, JobStatus::Pending);
        Ok(id)
    }

    fn status(&self, id: JobId) -> JobStatus {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or(JobStatus::Unknown)
    }

    fn cancel(&self, id: JobId) {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// [`RemovalDispatcher`] that records dispatched coordinates.
#[derive(Debug, Default)]
pub struct RecordingRemoval {
    requests: Mutex<Vec<RegionCoordinate>>,
}

impl RecordingRemoval {
    /// Construct an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every coordinate dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<RegionCoordinate> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RemovalDispatcher for RecordingRemoval {
    fn dispatch(&self, coordinate: RegionCoordinate) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(coordinate);
    }
}

/// One observed listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// `on_sizes_available` fired.
    SizesAvailable,
    /// `on_stats_changed` fired.
    StatsChanged,
    /// `on_hillshade_accounting_changed` fired.
    HillshadeAccountingChanged(bool),
    /// `on_region_selected` fired.
    RegionSelected {
        /// Affected region.
        coordinate: RegionCoordinate,
        /// Resulting action.
        action: RegionAction,
        /// Stats snapshot delivered with the event.
        stats: IndexStats,
    },
}

/// [`MapStateListener`] that appends every notification to a shared log.
#[derive(Debug)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ListenerEvent>>>,
}

impl RecordingListener {
    /// Construct a listener appending to `events`.
    pub fn new(events: Arc<Mutex<Vec<ListenerEvent>>>) -> Self {
        Self { events }
    }

    fn push(&self, event: ListenerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl MapStateListener for RecordingListener {
    fn on_sizes_available(&self) {
        self.push(ListenerEvent::SizesAvailable);
    }

    fn on_stats_changed(&self) {
        self.push(ListenerEvent::StatsChanged);
    }

    fn on_hillshade_accounting_changed(&self, enabled: bool) {
        self.push(ListenerEvent::HillshadeAccountingChanged(enabled));
    }

    fn on_region_selected(
        &self,
        coordinate: RegionCoordinate,
        action: RegionAction,
        stats: IndexStats,
    ) {
        self.push(ListenerEvent::RegionSelected {
            coordinate,
            action,
            stats,
        });
    }
}

/// One observed progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `started` fired with the given total.
    Started(u64),
    /// `progress` fired with the given count.
    Progress(u64),
    /// `finished` fired.
    Finished,
}

/// [`ProgressSink`] that records every callback.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    /// Construct an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every callback observed so far, in order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn started(&self, total: u64) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent::Started(total));
    }

    fn progress(&self, completed: u64) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent::Progress(completed));
    }

    fn finished(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent::Finished);
    }
}

/// Stub [`PackageTransport`] backed by in-memory bytes.
#[derive(Debug, Clone)]
pub struct StubTransport {
    payload: Vec<u8>,
    fail: bool,
}

impl StubTransport {
    /// A transport that writes `payload` to every destination.
    pub fn succeeding(payload: Vec<u8>) -> Self {
        Self {
            payload,
            fail: false,
        }
    }

    /// A transport that fails every fetch.
    pub fn failing() -> Self {
        Self {
            payload: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl PackageTransport for StubTransport {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, TransportError> {
        if self.fail {
            return Err(TransportError::Http {
                url: url.to_owned(),
                status: 404,
                message: "stubbed failure".to_owned(),
            });
        }
        tokio::fs::write(destination, &self.payload)
            .await
            .map_err(|source| TransportError::Write {
                path: destination.to_path_buf(),
                source,
            })?;
        Ok(self.payload.len() as u64)
    }
}

/// Row sets for a synthetic tile package.
#[derive(Debug, Clone, Default)]
pub struct PackageContents {
    /// `(id, name)` rows for the shared name dictionary.
    pub names: Vec<(i64, String)>,
    /// `(id, kind, lat, lon)` feature rows.
    pub features: Vec<(i64, i64, f64, f64)>,
    /// `(feature, lang, name)` rows linking features to names.
    pub feature_names: Vec<(i64, i64, i64)>,
    /// `(zoom_level, tile_column, tile_row, tile_data)` rows.
    pub tiles: Vec<(i64, i64, i64, Vec<u8>)>,
    /// Version stamp written to the package metadata.
    pub timestamp: Option<u16>,
}

/// Write a main-map package file with the supplied contents.
pub fn write_map_package(path: &Path, contents: &PackageContents) -> Result<(), rusqlite::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch(
        "CREATE TABLE names (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE features (
            id INTEGER PRIMARY KEY, kind INTEGER NOT NULL,
            lat REAL NOT NULL, lon REAL NOT NULL);
         CREATE TABLE feature_names (
            feature INTEGER NOT NULL, lang INTEGER NOT NULL, name INTEGER NOT NULL,
            PRIMARY KEY (feature, lang)) WITHOUT ROWID;
         CREATE TABLE tiles (
            zoom_level INTEGER NOT NULL, tile_column INTEGER NOT NULL,
            tile_row INTEGER NOT NULL, tile_data BLOB NOT NULL,
            PRIMARY KEY (zoom_level, tile_column, tile_row));
         CREATE TABLE metadata (name TEXT PRIMARY KEY, value TEXT) WITHOUT ROWID;",
    )?;
    for (id, name) in &contents.names {
        connection.execute(
            "INSERT INTO names (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }
    for (id, kind, lat, lon) in &contents.features {
        connection.execute(
            "INSERT INTO features (id, kind, lat, lon) VALUES (?1, ?2, ?3, ?4)",
            params![id, kind, lat, lon],
        )?;
    }
    for (feature, lang, name) in &contents.feature_names {
        connection.execute(
            "INSERT INTO feature_names (feature, lang, name) VALUES (?1, ?2, ?3)",
            params![feature, lang, name],
        )?;
    }
    for (zoom, column, row, data) in &contents.tiles {
        connection.execute(
            "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data)
             VALUES (?1, ?2, ?3, ?4)",
            params![zoom, column, row, data],
        )?;
    }
    if let Some(timestamp) = contents.timestamp {
        connection.execute(
            "INSERT INTO metadata (name, value) VALUES ('timestamp', ?1)",
            params![timestamp.to_string()],
        )?;
    }
    Ok(())
}

/// Write a hillshade package file holding only tiles and a version stamp.
pub fn write_hillshade_package(
    path: &Path,
    tiles: &[(i64, i64, i64, Vec<u8>)],
    timestamp: u16,
) -> Result<(), rusqlite::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch(
        "CREATE TABLE tiles (
            zoom_level INTEGER NOT NULL, tile_column INTEGER NOT NULL,
            tile_row INTEGER NOT NULL, tile_data BLOB NOT NULL,
            PRIMARY KEY (zoom_level, tile_column, tile_row));
         CREATE TABLE metadata (name TEXT PRIMARY KEY, value TEXT) WITHOUT ROWID;",
    )?;
    for (zoom, column, row, data) in tiles {
        connection.execute(
            "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data)
             VALUES (?1, ?2, ?3, ?4)",
            params![zoom, column, row, data],
        )?;
    }
    connection.execute(
        "INSERT INTO metadata (name, value) VALUES ('timestamp', ?1)",
        params![timestamp.to_string()],
    )?;
    Ok(())
}

/// Raw bookkeeping row as persisted, for assertions against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRegionRow {
    /// Persisted version stamp.
    pub version: i64,
    /// Persisted main job id; 0 means none.
    pub downloading: i64,
    /// Persisted hillshade version stamp.
    pub hillshade_version: i64,
    /// Persisted hillshade job id; 0 means none.
    pub hillshade_downloading: i64,
}

/// Read one bookkeeping row straight from a main store database file.
pub fn read_region_row(database: &Path, x: i64, y: i64) -> Option<RawRegionRow> {
    let connection = Connection::open(database).expect("open store database");
    connection
        .query_row(
            "SELECT version, downloading, hillshade_version, hillshade_downloading
             FROM regions WHERE x = ?1 AND y = ?2",
            params![x, y],
            |row| {
                Ok(RawRegionRow {
                    version: row.get(0)?,
                    downloading: row.get(1)?,
                    hillshade_version: row.get(2)?,
                    hillshade_downloading: row.get(3)?,
                })
            },
        )
        .ok()
}
