//! Orchestration engine and persistence for the tilegrid offline maps.
//!
//! Responsibilities:
//! - Track which regions of the world grid are present locally, queued for
//!   download or removal, or currently downloading.
//! - Reconcile that state against the relational stores and the download
//!   subsystem on startup.
//! - Import downloaded tile packages and remove regions transactionally.
//!
//! Boundaries:
//! - Domain types and trait seams live in `tilegrid-core`.
//! - Rendering, UI, and the removal worker are external collaborators.
//!
//! Invariants:
//! - No global mutable state; the engine is constructed once and injected.
//! - The engine owns no threads and no lock: mutating calls take
//!   `&mut self` and the integrating application serialises them.

#![forbid(unsafe_code)]

mod index;
mod jobs;
mod manifest;
mod paths;
mod store;
mod urls;

pub mod test_support;

pub use index::{IndexSettings, ListenerToken, RegionIndex};
pub use jobs::{
    HttpTransport, PackageJobManager, PackageTransport, TransportError, DEFAULT_USER_AGENT,
};
pub use manifest::{apply_region_manifest, ManifestError, ManifestSummary};
pub use paths::DestinationError;
pub use store::{
    MapStore, SchemaError, StoreError, HILLSHADE_DATABASE_FILENAME, MAIN_DATABASE_FILENAME,
};
pub use urls::{region_index_url, BaseUrl, DEFAULT_BASE_URL};
