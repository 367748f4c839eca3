//! The region index: the long-lived state machine over the world grid.
//!
//! One `RegionIndex` is constructed per application session. Construction
//! reconciles the in-memory grid against the persisted bookkeeping rows and
//! the download subsystem, after which the index serves the selection,
//! commit, cancel, import, and removal operations and fans state changes
//! out to subscribed listeners.
//!
//! The index owns no threads and no lock. Every mutating entry point takes
//! `&mut self`; the integrating application must serialise calls arriving
//! from UI handlers and from the download-completion callback, typically by
//! wrapping the index in a mutex. The grid is the sole shared resource
//! under that lock. Listeners are invoked synchronously on the calling
//! thread and must not call back into the index.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tilegrid_core::{
    DownloadJobManager, IndexStats, JobId, JobRequest, MapStateListener, ProgressSink,
    RegionAction, RegionCoordinate, RegionKey, RegionStatus, RemovalDispatcher, GRID_EXTENT,
};

use crate::paths;
use crate::store::{import, removal, MapStore};
use crate::urls::{self, BaseUrl};

const GRID_CELLS: usize = (GRID_EXTENT as usize) * (GRID_EXTENT as usize);

/// Size reported for the basemap before the manifest supplies a real one.
const BASEMAP_SIZE_STUB: u64 = 40 * 1024 * 1024;

const PACKAGE_DESCRIPTION: &str = "tilegrid offline maps";

/// Static configuration of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    base_url: BaseUrl,
    downloads_dir: Utf8PathBuf,
}

impl IndexSettings {
    /// Build settings from a base endpoint and a downloads directory.
    ///
    /// The base URL is sanitised the way [`BaseUrl::new`] does it.
    pub fn new(base_url: impl Into<String>, downloads_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_url: BaseUrl::new(base_url),
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Endpoint package URLs are derived from.
    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Directory downloads are written to.
    pub fn downloads_dir(&self) -> &Utf8Path {
        &self.downloads_dir
    }
}

/// Handle returned by [`RegionIndex::subscribe`]; pass it back to
/// [`RegionIndex::unsubscribe`] during collaborator teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerToken(u64);

/// Orchestration engine over the region grid, the stores, and the
/// download subsystem.
pub struct RegionIndex {
    store: MapStore,
    jobs: Arc<dyn DownloadJobManager + Send + Sync>,
    removal: Arc<dyn RemovalDispatcher + Send + Sync>,
    settings: IndexSettings,
    cells: Vec<RegionStatus>,
    listeners: BTreeMap<ListenerToken, Box<dyn MapStateListener + Send>>,
    next_listener: u64,
    loaded_maps: u32,
    downloading_regions: u32,
    pending_download: u32,
    pending_remove: u32,
    pending_download_size: u64,
    has_download_sizes: bool,
    expired_download_sizes: bool,
    hillshade_accounting: bool,
    basemap_version: u16,
    basemap_download_version: u16,
    basemap_download_size: u64,
    basemap_job: Option<JobId>,
}

impl fmt::Debug for RegionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionIndex")
            .field("loaded_maps", &self.loaded_maps)
            .field("downloading_regions", &self.downloading_regions)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl RegionIndex {
    /// Construct the index and reconcile it against the store and the job
    /// manager.
    ///
    /// Construction never fails: an unreadable bookkeeping table is
    /// recreated and the index starts with an empty grid, and stale job
    /// ids are cleared silently.
    pub fn new(
        store: MapStore,
        jobs: Arc<dyn DownloadJobManager + Send + Sync>,
        removal: Arc<dyn RemovalDispatcher + Send + Sync>,
        settings: IndexSettings,
    ) -> Self {
        let mut index = Self {
            store,
            jobs,
            removal,
            settings,
            cells: vec![RegionStatus::default(); GRID_CELLS],
            listeners: BTreeMap::new(),
            next_listener: 0,
            loaded_maps: 0,
            downloading_regions: 0,
            pending_download: 0,
            pending_remove: 0,
            pending_download_size: 0,
            has_download_sizes: false,
            expired_download_sizes: false,
            hillshade_accounting: false,
            basemap_version: 0,
            basemap_download_version: 0,
            basemap_download_size: 0,
            basemap_job: None,
        };
        index.reconcile();
        index
    }

    /// Static configuration the index was built with.
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// The relational stores backing the index.
    pub fn store(&self) -> &MapStore {
        &self.store
    }

    fn reconcile(&mut self) {
        let rows = match self.store.load_region_rows() {
            Ok(rows) => rows,
            Err(error) => {
                log::error!("failed to read the region index: {error}");
                if let Err(error) = self.store.recreate_regions_table() {
                    log::error!("failed to recreate the region table: {error}");
                }
                return;
            }
        };
        for row in rows {
            if row.x == -1 && row.y == -1 {
                self.basemap_version = row.version;
                continue;
            }
            let Some(coordinate) = RegionCoordinate::from_raw(row.x, row.y) else {
                log::warn!(
                    "ignoring persisted region row ({}, {}) outside the grid",
                    row.x,
                    row.y
                );
                continue;
            };
            log::debug!("index({}, {}, {})", row.x, row.y, row.version);
            let key = RegionKey::from(coordinate);
            let downloading =
                reconcile_job(self.jobs.as_ref(), &self.store, key, row.downloading, false);
            let hillshade_downloading = reconcile_job(
                self.jobs.as_ref(),
                &self.store,
                key,
                row.hillshade_downloading,
                true,
            );
            let cell = &mut self.cells[coordinate.index()];
            cell.created = row.version;
            cell.hillshade_version = row.hillshade_version;
            cell.downloading = downloading;
            cell.hillshade_downloading = hillshade_downloading;
            if downloading.is_some() || hillshade_downloading.is_some() {
                self.downloading_regions += 1;
            }
            if row.version > 0 {
                self.loaded_maps += 1;
            }
        }
    }

    /// Current status of one region.
    pub fn native_map(&self, coordinate: RegionCoordinate) -> RegionStatus {
        self.cells[coordinate.index()]
    }

    /// Whether either package of the region is currently downloading.
    pub fn is_downloading(&self, coordinate: RegionCoordinate) -> bool {
        self.cells[coordinate.index()].is_downloading()
    }

    /// Fast-path statistics snapshot maintained incrementally.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            loaded: self.loaded_maps,
            download: self.pending_download,
            remove: self.pending_remove,
            downloading: self.downloading_regions,
            download_size: self.pending_download_size,
        }
    }

    /// Recompute every counter from the grid and heal the running
    /// snapshot. Used for full refreshes; selection uses the incremental
    /// fast path.
    pub fn map_stats(&mut self) -> IndexStats {
        let mut loaded = 0u32;
        let mut download = 0u32;
        let mut remove = 0u32;
        let mut downloading = 0u32;
        let mut download_size = 0u64;
        for cell in &self.cells {
            if cell.is_loaded() {
                loaded += 1;
            }
            match cell.action {
                RegionAction::Download => {
                    download += 1;
                    if self.has_download_sizes {
                        download_size += self.selected_download_size(cell);
                    }
                }
                RegionAction::Remove => remove += 1,
                RegionAction::None => {}
            }
            if cell.is_downloading() {
                downloading += 1;
            }
        }
        self.loaded_maps = loaded;
        self.pending_download = download;
        self.pending_remove = remove;
        self.downloading_regions = downloading;
        self.pending_download_size = download_size;
        self.stats()
    }

    /// Toggle a pending action on a region.
    ///
    /// Selecting the action a cell already carries clears it back to
    /// [`RegionAction::None`], as does selecting `None` explicitly; any
    /// other action replaces the prior one. Listeners are notified with
    /// the resulting action and an updated stats snapshot.
    pub fn select_native_map(&mut self, coordinate: RegionCoordinate, action: RegionAction) {
        let index = coordinate.index();
        let current = self.cells[index].action;
        let next = if current == action {
            RegionAction::None
        } else {
            action
        };
        if next != current {
            let cell = self.cells[index];
            match current {
                RegionAction::Download => {
                    self.pending_download = self.pending_download.saturating_sub(1);
                    if self.has_download_sizes {
                        self.pending_download_size = self
                            .pending_download_size
                            .saturating_sub(self.selected_download_size(&cell));
                    }
                }
                RegionAction::Remove => {
                    self.pending_remove = self.pending_remove.saturating_sub(1);
                }
                RegionAction::None => {}
            }
            match next {
                RegionAction::Download => {
                    self.pending_download += 1;
                    if self.has_download_sizes {
                        self.pending_download_size += self.selected_download_size(&cell);
                    }
                }
                RegionAction::Remove => self.pending_remove += 1,
                RegionAction::None => {}
            }
            self.cells[index].action = next;
        }
        let stats = self.stats();
        self.notify_region_selected(coordinate, next, stats);
    }

    /// Discard every pending selection without notifying per cell.
    pub fn clear_selections(&mut self) {
        for cell in &mut self.cells {
            cell.action = RegionAction::None;
        }
        self.pending_download = 0;
        self.pending_remove = 0;
        self.pending_download_size = 0;
    }

    /// Commit every pending selection.
    ///
    /// Removal selections are dispatched to the removal worker and
    /// download selections become submitted jobs; a hillshade job is
    /// added when `hillshades_enabled` and the region's hillshade is
    /// outdated. No cell keeps a pending action afterwards, regardless of
    /// the branch taken or of submission failures.
    pub fn manage_native_maps(&mut self, hillshades_enabled: bool) {
        for coordinate in RegionCoordinate::all() {
            let index = coordinate.index();
            let cell = self.cells[index];
            match cell.action {
                RegionAction::None => continue,
                RegionAction::Remove => {
                    self.cells[index].action = RegionAction::None;
                    self.removal.dispatch(coordinate);
                }
                RegionAction::Download => {
                    self.cells[index].action = RegionAction::None;
                    self.request_map_download(coordinate);
                    if hillshades_enabled && cell.is_hillshade_outdated() {
                        self.request_hillshade_download(coordinate);
                    }
                }
            }
        }
        self.pending_download = 0;
        self.pending_remove = 0;
        self.pending_download_size = 0;
    }

    /// Cancel the region's in-flight downloads and revert its selection.
    pub fn cancel_download(&mut self, coordinate: RegionCoordinate) {
        let cell = self.cells[coordinate.index()];
        if let Some(job) = cell.downloading {
            self.jobs.cancel(job);
        }
        if let Some(job) = cell.hillshade_downloading {
            self.jobs.cancel(job);
        }
        self.set_map_job(coordinate, None);
        self.set_hillshade_job(coordinate, None);
        self.select_native_map(coordinate, RegionAction::None);
    }

    /// Import a downloaded main-map package.
    ///
    /// Returns `true` on success. The package file is deleted and the
    /// progress sink finished in every outcome; a failed import clears
    /// the cell's job id so the region is never stuck "downloading".
    pub fn process_downloaded_map(
        &mut self,
        coordinate: RegionCoordinate,
        package_path: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> bool {
        log::debug!(
            "importing map package for {coordinate} from {}",
            package_path.display()
        );
        let outcome = import::import_map_package(&mut self.store, coordinate, package_path, progress);
        if let Some(sink) = progress {
            sink.finished();
        }
        delete_package_file(package_path);
        match outcome {
            Ok(version) => {
                self.finish_map_import(coordinate, version);
                true
            }
            Err(error) => {
                log::error!("map import failed for {coordinate}: {error}");
                self.set_map_job(coordinate, None);
                false
            }
        }
    }

    /// Import a downloaded hillshade package.
    ///
    /// Same contract as [`RegionIndex::process_downloaded_map`].
    pub fn process_downloaded_hillshade(
        &mut self,
        coordinate: RegionCoordinate,
        package_path: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> bool {
        log::debug!(
            "importing hillshade package for {coordinate} from {}",
            package_path.display()
        );
        let outcome =
            import::import_hillshade_package(&mut self.store, coordinate, package_path, progress);
        if let Some(sink) = progress {
            sink.finished();
        }
        delete_package_file(package_path);
        match outcome {
            Ok(version) => {
                self.finish_hillshade_import(coordinate, version);
                true
            }
            Err(error) => {
                log::error!("hillshade import failed for {coordinate}: {error}");
                self.set_hillshade_job(coordinate, None);
                false
            }
        }
    }

    /// Remove a region's data from both stores.
    ///
    /// A region that has never held data is a successful no-op. Returns
    /// `false` when a delete step failed; the in-memory cell then keeps
    /// its previous state (partial deletion in the store is accepted).
    pub fn remove_native_map(
        &mut self,
        coordinate: RegionCoordinate,
        progress: Option<&dyn ProgressSink>,
    ) -> bool {
        let cell = self.cells[coordinate.index()];
        if !cell.is_loaded() {
            return true;
        }
        log::debug!("removing map {coordinate}");
        let outcome = removal::remove_region(
            &self.store,
            coordinate,
            cell.hillshade_version != 0,
            progress,
        );
        if let Some(sink) = progress {
            sink.finished();
        }
        match outcome {
            Ok(()) => {
                let index = coordinate.index();
                self.cells[index].created = 0;
                self.cells[index].hillshade_version = 0;
                self.loaded_maps = self.loaded_maps.saturating_sub(1);
                self.notify_stats_changed();
                true
            }
            Err(error) => {
                log::error!("removal failed for {coordinate}: {error}");
                false
            }
        }
    }

    /// Record what the remote index offers for a region's main package.
    pub fn set_native_map_status(
        &mut self,
        coordinate: RegionCoordinate,
        version: u16,
        size: u64,
    ) {
        let cell = &mut self.cells[coordinate.index()];
        cell.download_created = version;
        cell.download_size = size;
    }

    /// Record what the remote index offers for a region's hillshade
    /// package.
    pub fn set_native_hillshade_status(
        &mut self,
        coordinate: RegionCoordinate,
        version: u16,
        size: u64,
    ) {
        let cell = &mut self.cells[coordinate.index()];
        cell.hillshade_download_version = version;
        cell.hillshade_download_size = size;
    }

    /// Whether download sizes can currently be trusted.
    pub fn has_download_sizes(&self) -> bool {
        self.has_download_sizes
    }

    /// Whether the known download sizes are stale and due a refresh.
    pub fn expired_download_sizes(&self) -> bool {
        self.expired_download_sizes
    }

    /// Flip the size-availability flags.
    ///
    /// When sizes newly become available, any pending download selection
    /// on a region whose size is still unknown is deselected (a selection
    /// without a known cost must not stay committed), the running size is
    /// recomputed, and listeners are told sizes are available.
    pub fn set_has_download_sizes(&mut self, has: bool, expired: bool) {
        self.has_download_sizes = has;
        self.expired_download_sizes = expired;
        if !has {
            return;
        }
        for coordinate in RegionCoordinate::all() {
            let cell = self.cells[coordinate.index()];
            if cell.action == RegionAction::Download && cell.download_size == 0 {
                self.select_native_map(coordinate, RegionAction::None);
            }
        }
        self.refresh_pending_download_size();
        self.notify_sizes_available();
    }

    /// Whether hillshade sizes count towards the download total.
    pub fn hillshade_accounting(&self) -> bool {
        self.hillshade_accounting
    }

    /// Toggle hillshade size accounting and recompute the running size.
    pub fn set_hillshade_accounting(&mut self, enabled: bool) {
        self.hillshade_accounting = enabled;
        self.refresh_pending_download_size();
        self.notify_hillshade_accounting(enabled);
    }

    /// Version of the basemap present locally; 0 when absent.
    pub fn basemap_version(&self) -> u16 {
        self.basemap_version
    }

    /// Whether a newer basemap is available for download.
    pub fn is_basemap_outdated(&self) -> bool {
        self.basemap_version > 0 && self.basemap_version < self.basemap_download_version
    }

    /// Download size of the basemap, or a fixed stub before the manifest
    /// reports one.
    pub fn basemap_size(&self) -> u64 {
        if self.basemap_download_size > 0 {
            self.basemap_download_size
        } else {
            BASEMAP_SIZE_STUB
        }
    }

    /// Record what the remote index offers for the basemap.
    pub fn set_basemap_status(&mut self, version: u16, size: u64) {
        self.basemap_download_version = version;
        self.basemap_download_size = size;
    }

    /// Record a freshly installed basemap and persist its sentinel row.
    pub fn set_basemap_version(&mut self, version: u16) {
        if let Err(error) = self.store.write_version(RegionKey::Basemap, version) {
            log::warn!("failed to persist basemap version: {error}");
        }
        self.basemap_version = version;
        self.basemap_job = None;
    }

    /// Whether a basemap download is in flight.
    pub fn is_basemap_downloading(&self) -> bool {
        self.basemap_job.is_some()
    }

    /// Submit a download job for the basemap package.
    pub fn download_basemap(&mut self) {
        let url = match urls::basemap_url(self.settings.base_url()) {
            Ok(url) => url,
            Err(error) => {
                log::error!("invalid basemap URL: {error}");
                return;
            }
        };
        let destination = paths::basemap_destination(self.settings.downloads_dir());
        if let Err(error) = paths::prepare_destination(&destination) {
            log::error!("cannot prepare basemap destination: {error}");
            return;
        }
        let request = JobRequest {
            url: url.into(),
            destination: destination.into_std_path_buf(),
            title: "Basemap".to_owned(),
            description: PACKAGE_DESCRIPTION.to_owned(),
        };
        match self.jobs.submit(request) {
            Ok(job) => self.basemap_job = Some(job),
            Err(error) => log::error!("failed to submit basemap download: {error}"),
        }
    }

    /// Register a listener; the index holds it strongly until
    /// [`RegionIndex::unsubscribe`] is called with the returned token.
    pub fn subscribe(&mut self, listener: Box<dyn MapStateListener + Send>) -> ListenerToken {
        self.next_listener += 1;
        let token = ListenerToken(self.next_listener);
        self.listeners.insert(token, listener);
        token
    }

    /// Drop a previously registered listener.
    pub fn unsubscribe(&mut self, token: ListenerToken) {
        if self.listeners.remove(&token).is_none() {
            log::warn!("unsubscribe for unknown listener token");
        }
    }

    fn request_map_download(&mut self, coordinate: RegionCoordinate) {
        let url = match urls::map_package_url(self.settings.base_url(), coordinate) {
            Ok(url) => url,
            Err(error) => {
                log::error!("invalid map package URL for {coordinate}: {error}");
                return;
            }
        };
        let destination = paths::map_destination(self.settings.downloads_dir(), coordinate);
        if let Err(error) = paths::prepare_destination(&destination) {
            log::error!("cannot prepare download destination for {coordinate}: {error}");
            return;
        }
        let request = JobRequest {
            url: url.into(),
            destination: destination.into_std_path_buf(),
            title: format!("Map {coordinate}"),
            description: PACKAGE_DESCRIPTION.to_owned(),
        };
        match self.jobs.submit(request) {
            Ok(job) => self.set_map_job(coordinate, Some(job)),
            Err(error) => log::error!("failed to submit map download for {coordinate}: {error}"),
        }
    }

    fn request_hillshade_download(&mut self, coordinate: RegionCoordinate) {
        let url = match urls::hillshade_package_url(self.settings.base_url(), coordinate) {
            Ok(url) => url,
            Err(error) => {
                log::error!("invalid hillshade package URL for {coordinate}: {error}");
                return;
            }
        };
        let destination = paths::hillshade_destination(self.settings.downloads_dir(), coordinate);
        if let Err(error) = paths::prepare_destination(&destination) {
            log::error!("cannot prepare hillshade destination for {coordinate}: {error}");
            return;
        }
        let request = JobRequest {
            url: url.into(),
            destination: destination.into_std_path_buf(),
            title: format!("Hillshade {coordinate}"),
            description: PACKAGE_DESCRIPTION.to_owned(),
        };
        match self.jobs.submit(request) {
            Ok(job) => self.set_hillshade_job(coordinate, Some(job)),
            Err(error) => {
                log::error!("failed to submit hillshade download for {coordinate}: {error}");
            }
        }
    }

    fn set_map_job(&mut self, coordinate: RegionCoordinate, job: Option<JobId>) {
        let index = coordinate.index();
        let before = self.cells[index].is_downloading();
        self.cells[index].downloading = job;
        let after = self.cells[index].is_downloading();
        self.update_downloading_counter(before, after);
        if let Err(error) = self.store.write_job(coordinate.into(), job) {
            log::warn!("failed to persist job id for {coordinate}: {error}");
        }
        self.notify_stats_changed();
    }

    fn set_hillshade_job(&mut self, coordinate: RegionCoordinate, job: Option<JobId>) {
        let index = coordinate.index();
        let before = self.cells[index].is_downloading();
        self.cells[index].hillshade_downloading = job;
        let after = self.cells[index].is_downloading();
        self.update_downloading_counter(before, after);
        if let Err(error) = self.store.write_hillshade_job(coordinate.into(), job) {
            log::warn!("failed to persist hillshade job id for {coordinate}: {error}");
        }
        self.notify_stats_changed();
    }

    fn update_downloading_counter(&mut self, before: bool, after: bool) {
        if before && !after {
            self.downloading_regions = self.downloading_regions.saturating_sub(1);
        } else if !before && after {
            self.downloading_regions += 1;
        }
    }

    fn finish_map_import(&mut self, coordinate: RegionCoordinate, version: u16) {
        if let Err(error) = self.store.write_version(coordinate.into(), version) {
            log::warn!("failed to persist version for {coordinate}: {error}");
        }
        let index = coordinate.index();
        let was_loaded = self.cells[index].is_loaded();
        let before = self.cells[index].is_downloading();
        self.cells[index].created = version;
        self.cells[index].downloading = None;
        let after = self.cells[index].is_downloading();
        self.update_downloading_counter(before, after);
        if !was_loaded && version > 0 {
            self.loaded_maps += 1;
        }
        self.notify_stats_changed();
    }

    fn finish_hillshade_import(&mut self, coordinate: RegionCoordinate, version: u16) {
        if let Err(error) = self.store.write_hillshade_version(coordinate.into(), version) {
            log::warn!("failed to persist hillshade version for {coordinate}: {error}");
        }
        let index = coordinate.index();
        let before = self.cells[index].is_downloading();
        self.cells[index].hillshade_version = version;
        self.cells[index].hillshade_downloading = None;
        let after = self.cells[index].is_downloading();
        self.update_downloading_counter(before, after);
        self.notify_stats_changed();
    }

    fn selected_download_size(&self, cell: &RegionStatus) -> u64 {
        let mut size = cell.download_size;
        if self.hillshade_accounting && cell.is_hillshade_outdated() {
            size += cell.hillshade_download_size;
        }
        size
    }

    fn refresh_pending_download_size(&mut self) {
        let size: u64 = if self.has_download_sizes {
            self.cells
                .iter()
                .filter(|cell| cell.action == RegionAction::Download)
                .map(|cell| self.selected_download_size(cell))
                .sum()
        } else {
            0
        };
        self.pending_download_size = size;
    }

    fn notify_region_selected(
        &self,
        coordinate: RegionCoordinate,
        action: RegionAction,
        stats: IndexStats,
    ) {
        for listener in self.listeners.values() {
            listener.on_region_selected(coordinate, action, stats);
        }
    }

    fn notify_stats_changed(&self) {
        for listener in self.listeners.values() {
            listener.on_stats_changed();
        }
    }

    fn notify_sizes_available(&self) {
        for listener in self.listeners.values() {
            listener.on_sizes_available();
        }
    }

    fn notify_hillshade_accounting(&self, enabled: bool) {
        for listener in self.listeners.values() {
            listener.on_hillshade_accounting_changed(enabled);
        }
    }
}

fn reconcile_job(
    jobs: &dyn DownloadJobManager,
    store: &MapStore,
    key: RegionKey,
    job: Option<JobId>,
    hillshade: bool,
) -> Option<JobId> {
    let job = job?;
    let status = jobs.status(job);
    if status.is_active() {
        log::debug!("  keeping live job {job} for {key}");
        return Some(job);
    }
    log::debug!("  clearing stale job {job} for {key}");
    let cleared = if hillshade {
        store.write_hillshade_job(key, None)
    } else {
        store.write_job(key, None)
    };
    if let Err(error) = cleared {
        log::warn!("failed to clear stale job for {key}: {error}");
    }
    None
}

fn delete_package_file(path: &Path) {
    if let Err(error) = std::fs::remove_file(path) {
        if error.kind() != std::io::ErrorKind::NotFound {
            log::warn!("failed to delete package file {}: {error}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn settings_sanitise_the_base_url() {
        let settings = IndexSettings::new("https://tiles.example.org/", "/tmp/downloads");
        assert_eq!(settings.base_url().as_ref(), "https://tiles.example.org");
        assert_eq!(settings.downloads_dir(), Utf8Path::new("/tmp/downloads"));
    }
}
