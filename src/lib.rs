//! Facade crate for the tilegrid offline map engine.
//!
//! This crate re-exports the domain types from `tilegrid-core` and the
//! orchestration engine, stores, and adapters from `tilegrid-data` so that
//! applications can depend on a single crate.

#![forbid(unsafe_code)]

pub use tilegrid_core::{
    DownloadJobManager, IndexStats, JobId, JobManagerError, JobRequest, JobStatus,
    MapStateListener, ProgressSink, RegionAction, RegionCoordinate, RegionCoordinateError,
    RegionKey, RegionStatus, RemovalDispatcher, TileRect, GRID_EXTENT, MAX_HILLSHADE_TILE_ZOOM,
    MAX_TILE_ZOOM, MIN_TILE_ZOOM,
};

pub use tilegrid_data::{
    apply_region_manifest, BaseUrl, HttpTransport, IndexSettings, ListenerToken, ManifestError,
    ManifestSummary, MapStore, PackageJobManager, PackageTransport, RegionIndex, StoreError,
    TransportError, DEFAULT_BASE_URL,
};
