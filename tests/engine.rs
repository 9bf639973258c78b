//! A configured engine driving the crawler from the queue and the scheduler.

mod common;

use cmsync::config::SyncConfig;
use cmsync::error::SyncError;
use cmsync::events::{priorities, FnHandler, Outcome, SyncEvent};
use cmsync::store::MetaDataStorage;
use cmsync::sync::SyncEngine;
use cmsync::types::ObjectKind;
use common::{summary, ts, FakeNode, Fixture, LOCAL_ROOT, REMOTE_ROOT_ID, REMOTE_ROOT_PATH};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn config(store: &TempDir) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.repository.root_folder_id = REMOTE_ROOT_ID.to_string();
    config.repository.root_path = REMOTE_ROOT_PATH.to_string();
    config.storage.store_path = Some(store.path().join("store"));
    config.sync.poll_interval_secs = 3600;
    config
}

fn open(fx: &Fixture, config: &SyncConfig) -> Result<SyncEngine, SyncError> {
    SyncEngine::with_file_system(config, Path::new(LOCAL_ROOT), fx.repo.clone(), fx.fs.clone())
}

/// Engine seeded with the fixture's records and an applier logging what
/// reaches the bottom of the bus
fn engine_with_applier(fx: &Fixture, config: &SyncConfig) -> (SyncEngine, Arc<Mutex<Vec<String>>>) {
    let engine = open(fx, config).unwrap();
    let storage = engine.storage();
    for record in &fx.records {
        storage.save_mapped_object(record).unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    engine.manager().add_event_handler(
        priorities::DEFAULT,
        Arc::new(FnHandler::new("applier", move |event| {
            log.lock().push(match event {
                SyncEvent::Object(e) => summary(e),
                SyncEvent::FullSyncCompleted(done) => format!("done {}", done.events_published),
                SyncEvent::StartNextSync(_) => "start".to_string(),
            });
            Ok(Outcome::Consumed)
        })),
    );
    (engine, seen)
}

fn new_file(fx: &Fixture, path: &str) {
    fx.fs.insert(
        path,
        FakeNode {
            kind: ObjectKind::File,
            guid: None,
            modified: ts(100),
            content: b"new".to_vec(),
        },
    );
}

#[test]
fn requested_sync_runs_the_registered_crawler() {
    let store = TempDir::new().unwrap();
    let mut fx = Fixture::new();
    fx.synced_file("a", "a.txt", "root", b"a");
    new_file(&fx, "/sync/b.txt");
    let (engine, seen) = engine_with_applier(&fx, &config(&store));

    engine.request_sync(true);
    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.lock().len() < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(*seen.lock(), vec!["b.txt Created/None", "done 1"]);
    assert!(!engine.is_syncing());
    assert!(engine.shutdown(Duration::from_secs(5)));
}

#[test]
fn engine_keeps_the_configured_checksum_algorithm() {
    let store = TempDir::new().unwrap();
    let fx = Fixture::new();
    let mut config = config(&store);
    config.sync.checksum_algorithm = "sha256".to_string();

    let engine = open(&fx, &config).unwrap();
    assert_eq!(engine.checksum_algorithm(), "sha256");
    assert_eq!(engine.manager().handler_count(), 2);
    assert!(store.path().join("store").is_dir());
    assert!(engine.shutdown(Duration::from_secs(5)));
}

#[test]
fn missing_root_folder_id_is_a_config_error() {
    let store = TempDir::new().unwrap();
    let fx = Fixture::new();
    let mut config = config(&store);
    config.repository.root_folder_id = "  ".to_string();

    let err = open(&fx, &config).err().unwrap();
    assert!(matches!(err, SyncError::ConfigError(ref m) if m.contains("root_folder_id")));
}

#[test]
fn invalid_settings_are_rejected_before_opening_the_store() {
    let store = TempDir::new().unwrap();
    let fx = Fixture::new();
    let mut config = config(&store);
    config.sync.poll_interval_secs = 0;

    assert!(matches!(open(&fx, &config), Err(SyncError::ConfigError(_))));
    assert!(!store.path().join("store").exists());
}

async fn wait_for(seen: &Mutex<Vec<String>>, count: usize, within: Duration) {
    let deadline = Instant::now() + within;
    while seen.lock().len() < count && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn scheduler_syncs_on_start_when_configured() {
    let store = TempDir::new().unwrap();
    let fx = Fixture::new();
    new_file(&fx, "/sync/b.txt");
    let (engine, seen) = engine_with_applier(&fx, &config(&store));

    let scheduler = engine.spawn_scheduler();
    wait_for(&seen, 2, Duration::from_secs(5)).await;
    scheduler.stop().await;

    assert_eq!(*seen.lock(), vec!["b.txt Created/None", "done 1"]);
    assert!(engine.shutdown(Duration::from_secs(5)));
}

#[tokio::test]
async fn scheduler_waits_a_full_interval_without_sync_on_start() {
    let store = TempDir::new().unwrap();
    let fx = Fixture::new();
    new_file(&fx, "/sync/b.txt");
    let mut config = config(&store);
    config.sync.sync_on_start = false;
    let (engine, seen) = engine_with_applier(&fx, &config);

    let scheduler = engine.spawn_scheduler();
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    assert!(seen.lock().is_empty());
    assert!(engine.shutdown(Duration::from_secs(5)));
}
