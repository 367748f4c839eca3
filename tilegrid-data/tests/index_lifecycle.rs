//! Behavioural tests for the selection, commit, cancel, and reconciliation
//! lifecycle of the region index.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use tilegrid_core::{JobId, JobStatus, RegionAction, RegionKey};
use tilegrid_data::test_support::{
    coordinate, read_region_row, FakeJobManager, ListenerEvent, RecordingListener,
    RecordingRemoval,
};
use tilegrid_data::{IndexSettings, MapStore, RegionIndex, MAIN_DATABASE_FILENAME};

struct World {
    _temp: TempDir,
    directory: Utf8PathBuf,
    jobs: Arc<FakeJobManager>,
    removal: Arc<RecordingRemoval>,
    index: RegionIndex,
}

impl World {
    fn main_database(&self) -> PathBuf {
        self.directory
            .join("store")
            .join(MAIN_DATABASE_FILENAME)
            .into_std_path_buf()
    }
}

fn build_world(prepare: impl FnOnce(&MapStore), jobs: Arc<FakeJobManager>) -> World {
    let temp = TempDir::new().expect("create temp dir");
    let directory =
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    {
        let store = MapStore::open(&directory.join("store")).expect("open store for seeding");
        prepare(&store);
    }
    let store = MapStore::open(&directory.join("store")).expect("open store");
    let removal = Arc::new(RecordingRemoval::new());
    let index = RegionIndex::new(
        store,
        jobs.clone(),
        removal.clone(),
        IndexSettings::new("https://tiles.example.org", directory.join("downloads")),
    );
    World {
        _temp: temp,
        directory,
        jobs,
        removal,
        index,
    }
}

#[fixture]
fn world() -> World {
    build_world(|_| {}, Arc::new(FakeJobManager::new()))
}

#[rstest]
fn selecting_download_twice_returns_to_none(mut world: World) {
    let region = coordinate(3, 5);
    world.index.set_native_map_status(region, 7, 2048);
    world.index.set_has_download_sizes(true, false);
    let baseline = world.index.stats();

    world.index.select_native_map(region, RegionAction::Download);
    let selected = world.index.stats();
    assert_eq!(selected.download, baseline.download + 1);
    assert_eq!(selected.download_size, baseline.download_size + 2048);

    world.index.select_native_map(region, RegionAction::Download);
    assert_eq!(world.index.native_map(region).action, RegionAction::None);
    assert_eq!(world.index.stats(), baseline);
}

#[rstest]
fn selecting_a_different_action_replaces_the_prior_one(mut world: World) {
    let region = coordinate(3, 5);
    world.index.select_native_map(region, RegionAction::Download);
    world.index.select_native_map(region, RegionAction::Remove);

    assert_eq!(world.index.native_map(region).action, RegionAction::Remove);
    let stats = world.index.stats();
    assert_eq!((stats.download, stats.remove), (0, 1));
}

#[rstest]
fn selection_notifies_listeners_with_a_stats_snapshot(mut world: World) {
    let events = Arc::new(Mutex::new(Vec::new()));
    world
        .index
        .subscribe(Box::new(RecordingListener::new(events.clone())));
    let region = coordinate(3, 5);

    world.index.select_native_map(region, RegionAction::Download);

    let events = events.lock().expect("listener log");
    assert_eq!(events.len(), 1);
    match &events[0] {
        ListenerEvent::RegionSelected {
            coordinate: selected,
            action,
            stats,
        } => {
            assert_eq!(*selected, region);
            assert_eq!(*action, RegionAction::Download);
            assert_eq!(stats.download, 1);
        }
        other => panic!("expected a selection event, got {other:?}"),
    }
}

#[rstest]
fn unsubscribed_listeners_stop_receiving_events(mut world: World) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let token = world
        .index
        .subscribe(Box::new(RecordingListener::new(events.clone())));

    world.index.unsubscribe(token);
    world
        .index
        .select_native_map(coordinate(3, 5), RegionAction::Download);

    assert!(events.lock().expect("listener log").is_empty());
}

#[rstest]
fn clear_selections_resets_every_action_without_notifying(mut world: World) {
    world
        .index
        .select_native_map(coordinate(3, 5), RegionAction::Download);
    world
        .index
        .select_native_map(coordinate(4, 5), RegionAction::Remove);
    let events = Arc::new(Mutex::new(Vec::new()));
    world
        .index
        .subscribe(Box::new(RecordingListener::new(events.clone())));

    world.index.clear_selections();

    assert_eq!(world.index.native_map(coordinate(3, 5)).action, RegionAction::None);
    assert_eq!(world.index.native_map(coordinate(4, 5)).action, RegionAction::None);
    let stats = world.index.stats();
    assert_eq!((stats.download, stats.remove, stats.download_size), (0, 0, 0));
    assert!(events.lock().expect("listener log").is_empty());
}

#[rstest]
fn manage_submits_download_jobs_and_clears_the_action(mut world: World) {
    let region = coordinate(3, 5);
    world.index.select_native_map(region, RegionAction::Download);

    world.index.manage_native_maps(false);

    let submitted = world.jobs.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].url,
        "https://tiles.example.org/maps/3/3-5.tiles"
    );
    assert_eq!(
        submitted[0].destination,
        world.directory.join("downloads/3-5.tiles").into_std_path_buf()
    );
    assert_eq!(submitted[0].title, "Map 3-5");

    let status = world.index.native_map(region);
    assert_eq!(status.action, RegionAction::None);
    assert_eq!(status.downloading, Some(JobId::new(1)));
    let stats = world.index.stats();
    assert_eq!((stats.download, stats.downloading), (0, 1));

    let row = read_region_row(&world.main_database(), 3, 5).expect("persisted row");
    assert_eq!(row.downloading, 1);
}

#[rstest]
fn manage_deletes_a_stale_partial_download(mut world: World) {
    let region = coordinate(3, 5);
    let downloads = world.directory.join("downloads");
    std::fs::create_dir_all(downloads.as_std_path()).expect("create downloads dir");
    let stale = downloads.join("3-5.tiles");
    std::fs::write(stale.as_std_path(), b"partial").expect("write stale file");
    world.index.select_native_map(region, RegionAction::Download);

    world.index.manage_native_maps(false);

    assert!(!stale.exists(), "stale partial should be deleted");
    assert_eq!(world.jobs.submitted().len(), 1);
}

#[rstest]
fn manage_requests_hillshade_only_when_enabled_and_outdated(mut world: World) {
    let region = coordinate(3, 5);
    world.index.set_native_hillshade_status(region, 2, 512);
    world.index.select_native_map(region, RegionAction::Download);

    world.index.manage_native_maps(true);

    let submitted = world.jobs.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(
        submitted[1].url,
        "https://tiles.example.org/hillshades/3/3-5.hillshade"
    );
    assert_eq!(submitted[1].title, "Hillshade 3-5");
    let status = world.index.native_map(region);
    assert_eq!(status.downloading, Some(JobId::new(1)));
    assert_eq!(status.hillshade_downloading, Some(JobId::new(2)));
    let row = read_region_row(&world.main_database(), 3, 5).expect("persisted row");
    assert_eq!(row.hillshade_downloading, 2);
}

#[rstest]
fn manage_skips_hillshade_when_disabled(mut world: World) {
    let region = coordinate(3, 5);
    world.index.set_native_hillshade_status(region, 2, 512);
    world.index.select_native_map(region, RegionAction::Download);

    world.index.manage_native_maps(false);

    assert_eq!(world.jobs.submitted().len(), 1);
    assert_eq!(world.index.native_map(region).hillshade_downloading, None);
}

#[rstest]
fn manage_dispatches_removals_and_clears_the_action(mut world: World) {
    let region = coordinate(3, 5);
    world.index.select_native_map(region, RegionAction::Remove);

    world.index.manage_native_maps(false);

    assert_eq!(world.removal.dispatched(), vec![region]);
    assert_eq!(world.index.native_map(region).action, RegionAction::None);
    assert_eq!(world.index.stats().remove, 0);
    assert!(world.jobs.submitted().is_empty());
}

#[rstest]
fn manage_clears_the_action_even_when_submission_fails() {
    let jobs = Arc::new(FakeJobManager::new());
    jobs.reject_submissions();
    let mut world = build_world(|_| {}, jobs);
    let region = coordinate(3, 5);
    world.index.select_native_map(region, RegionAction::Download);

    world.index.manage_native_maps(false);

    let status = world.index.native_map(region);
    assert_eq!(status.action, RegionAction::None);
    assert_eq!(status.downloading, None);
    let stats = world.index.stats();
    assert_eq!((stats.download, stats.downloading), (0, 0));
}

#[rstest]
fn cancel_download_cancels_jobs_and_reverts_the_selection(mut world: World) {
    let region = coordinate(3, 5);
    world.index.set_native_hillshade_status(region, 2, 512);
    world.index.select_native_map(region, RegionAction::Download);
    world.index.manage_native_maps(true);
    assert!(world.index.is_downloading(region));

    world.index.cancel_download(region);

    assert_eq!(
        world.jobs.cancelled(),
        vec![JobId::new(1), JobId::new(2)]
    );
    let status = world.index.native_map(region);
    assert_eq!(status.downloading, None);
    assert_eq!(status.hillshade_downloading, None);
    assert_eq!(status.action, RegionAction::None);
    assert!(!world.index.is_downloading(region));
    assert_eq!(world.index.stats().downloading, 0);
    let row = read_region_row(&world.main_database(), 3, 5).expect("persisted row");
    assert_eq!((row.downloading, row.hillshade_downloading), (0, 0));
}

#[rstest]
fn unpriced_selections_are_deselected_when_sizes_arrive(mut world: World) {
    let region = coordinate(3, 5);
    let events = Arc::new(Mutex::new(Vec::new()));
    world
        .index
        .subscribe(Box::new(RecordingListener::new(events.clone())));
    world.index.select_native_map(region, RegionAction::Download);
    assert_eq!(world.index.stats().download, 1);

    world.index.set_has_download_sizes(true, false);

    assert_eq!(world.index.native_map(region).action, RegionAction::None);
    assert_eq!(world.index.stats().download, 0);
    let events = events.lock().expect("listener log");
    assert!(events.contains(&ListenerEvent::SizesAvailable));
}

#[rstest]
fn priced_selections_survive_the_size_arrival(mut world: World) {
    let region = coordinate(3, 5);
    world.index.set_native_map_status(region, 7, 2048);
    world.index.select_native_map(region, RegionAction::Download);

    world.index.set_has_download_sizes(true, false);

    assert_eq!(world.index.native_map(region).action, RegionAction::Download);
    let stats = world.index.stats();
    assert_eq!((stats.download, stats.download_size), (1, 2048));
    assert!(world.index.has_download_sizes());
}

#[rstest]
fn hillshade_accounting_adds_outdated_hillshade_sizes(mut world: World) {
    let region = coordinate(3, 5);
    let events = Arc::new(Mutex::new(Vec::new()));
    world
        .index
        .subscribe(Box::new(RecordingListener::new(events.clone())));
    world.index.set_native_map_status(region, 7, 2048);
    world.index.set_native_hillshade_status(region, 2, 512);
    world.index.select_native_map(region, RegionAction::Download);
    world.index.set_has_download_sizes(true, false);
    assert_eq!(world.index.stats().download_size, 2048);

    world.index.set_hillshade_accounting(true);

    assert_eq!(world.index.stats().download_size, 2048 + 512);
    assert!(events
        .lock()
        .expect("listener log")
        .contains(&ListenerEvent::HillshadeAccountingChanged(true)));

    world.index.set_hillshade_accounting(false);
    assert_eq!(world.index.stats().download_size, 2048);
}

#[rstest]
fn map_stats_recomputes_the_running_counters(mut world: World) {
    let region = coordinate(3, 5);
    world.index.set_native_map_status(region, 7, 2048);
    world.index.set_has_download_sizes(true, false);
    world.index.select_native_map(region, RegionAction::Download);
    world
        .index
        .select_native_map(coordinate(4, 5), RegionAction::Remove);

    let recomputed = world.index.map_stats();

    assert_eq!(recomputed, world.index.stats());
    assert_eq!(recomputed.download, 1);
    assert_eq!(recomputed.remove, 1);
    assert_eq!(recomputed.download_size, 2048);
}

#[rstest]
fn reconciliation_clears_a_succeeded_job_and_persists_the_clearing() {
    let jobs = Arc::new(FakeJobManager::new());
    jobs.set_status(JobId::new(7), JobStatus::Succeeded);
    let world = build_world(
        |store| {
            let key = RegionKey::from(coordinate(3, 5));
            store.write_version(key, 5).expect("seed version");
            store
                .write_job(key, Some(JobId::new(7)))
                .expect("seed job id");
        },
        jobs,
    );

    let status = world.index.native_map(coordinate(3, 5));
    assert_eq!(status.created, 5);
    assert_eq!(status.downloading, None);
    assert_eq!(world.index.stats().downloading, 0);
    let row = read_region_row(&world.main_database(), 3, 5).expect("persisted row");
    assert_eq!(row.downloading, 0, "stale job id should be cleared on disk");
}

#[rstest]
#[case(JobStatus::Pending)]
#[case(JobStatus::Running)]
#[case(JobStatus::Paused)]
fn reconciliation_keeps_active_jobs(#[case] status: JobStatus) {
    let jobs = Arc::new(FakeJobManager::new());
    jobs.set_status(JobId::new(7), status);
    let world = build_world(
        |store| {
            let key = RegionKey::from(coordinate(3, 5));
            store
                .write_job(key, Some(JobId::new(7)))
                .expect("seed job id");
        },
        jobs,
    );

    let cell = world.index.native_map(coordinate(3, 5));
    assert_eq!(cell.downloading, Some(JobId::new(7)));
    assert_eq!(world.index.stats().downloading, 1);
    let row = read_region_row(&world.main_database(), 3, 5).expect("persisted row");
    assert_eq!(row.downloading, 7);
}

#[rstest]
fn reconciliation_counts_loaded_maps_and_reads_the_basemap_row() {
    let world = build_world(
        |store| {
            store
                .write_version(RegionKey::from(coordinate(3, 5)), 5)
                .expect("seed region");
            store
                .write_version(RegionKey::from(coordinate(4, 5)), 6)
                .expect("seed region");
            store
                .write_version(RegionKey::Basemap, 9)
                .expect("seed basemap");
        },
        Arc::new(FakeJobManager::new()),
    );

    assert_eq!(world.index.stats().loaded, 2);
    assert_eq!(world.index.basemap_version(), 9);
}

#[rstest]
fn reconciliation_recovers_from_a_corrupt_region_table() {
    let temp = TempDir::new().expect("create temp dir");
    let directory =
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    let store_dir = directory.join("store");
    std::fs::create_dir_all(store_dir.as_std_path()).expect("create store dir");
    {
        let connection =
            rusqlite::Connection::open(store_dir.join(MAIN_DATABASE_FILENAME).as_std_path())
                .expect("open raw database");
        connection
            .execute("CREATE TABLE regions (junk TEXT)", [])
            .expect("create corrupt table");
    }

    let store = MapStore::open(&store_dir).expect("open store");
    let jobs = Arc::new(FakeJobManager::new());
    let removal = Arc::new(RecordingRemoval::new());
    let mut index = RegionIndex::new(
        store,
        jobs.clone(),
        removal,
        IndexSettings::new("https://tiles.example.org", directory.join("downloads")),
    );

    assert_eq!(index.stats().loaded, 0, "corrupt table yields an empty grid");

    // The recreated table is usable again.
    index.select_native_map(coordinate(3, 5), RegionAction::Download);
    index.manage_native_maps(false);
    let row = read_region_row(
        &store_dir.join(MAIN_DATABASE_FILENAME).into_std_path_buf(),
        3,
        5,
    )
    .expect("persisted row after recovery");
    assert_eq!(row.downloading, 1);
}

#[rstest]
fn basemap_download_submits_a_job(mut world: World) {
    world.index.set_basemap_status(9, 0);
    assert_eq!(world.index.basemap_size(), 40 * 1024 * 1024);

    world.index.download_basemap();

    let submitted = world.jobs.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].url,
        "https://tiles.example.org/maps/basemap.tiles"
    );
    assert!(world.index.is_basemap_downloading());

    world.index.set_basemap_version(9);
    assert!(!world.index.is_basemap_downloading());
    assert_eq!(world.index.basemap_version(), 9);
    assert!(!world.index.is_basemap_outdated());
    let row = read_region_row(&world.main_database(), -1, -1).expect("basemap row");
    assert_eq!(row.version, 9);
}
