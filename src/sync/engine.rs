//! Sync Engine
//!
//! Wires a [`SyncConfig`] into a running bus: the sled stores, the filters,
//! the event queue with its manager, and the [`DescendantsCrawler`]
//! registered at [`priorities::CRAWLER`]. Appliers register their own
//! handlers on [`SyncEngine::manager`]; the remote client is supplied by the
//! embedder.

use super::{DescendantsCrawler, SchedulerHandle, SyncScheduler};
use crate::config::SyncConfig;
use crate::error::{StorageError, SyncError};
use crate::events::{
    priorities, DebugLoggingHandler, QueueHandle, StartNextSyncEvent, SyncEvent, SyncEventManager,
    SyncEventQueue,
};
use crate::filter::IgnoreFilters;
use crate::fs::{LocalFileSystem, NativeFileSystem};
use crate::remote::RemoteRepository;
use crate::store::{PathMatcher, SledIgnoredEntitiesStorage, SledMetaDataStorage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct SyncEngine {
    manager: Arc<SyncEventManager>,
    queue: SyncEventQueue,
    crawler: Arc<DescendantsCrawler>,
    storage: Arc<SledMetaDataStorage>,
    ignored: Arc<SledIgnoredEntitiesStorage>,
    poll_interval: Duration,
    sync_on_start: bool,
    checksum_algorithm: String,
}

impl SyncEngine {
    /// Open the engine for the folder at `local_root` on the native
    /// filesystem
    pub fn open(
        config: &SyncConfig,
        local_root: &Path,
        repository: Arc<dyn RemoteRepository>,
    ) -> Result<Self, SyncError> {
        Self::with_file_system(config, local_root, repository, Arc::new(NativeFileSystem::new()))
    }

    pub fn with_file_system(
        config: &SyncConfig,
        local_root: &Path,
        repository: Arc<dyn RemoteRepository>,
        fs: Arc<dyn LocalFileSystem>,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let root_folder_id = config.repository.root_folder_id.trim();
        if root_folder_id.is_empty() {
            return Err(SyncError::ConfigError(
                "repository.root_folder_id must be set to run a sync".to_string(),
            ));
        }

        let store_path = config.storage.resolve_path(local_root)?;
        std::fs::create_dir_all(&store_path).map_err(StorageError::from)?;
        let db = sled::open(&store_path).map_err(StorageError::from)?;
        let matcher = PathMatcher::new(local_root, config.repository.root_path.clone());
        let storage = Arc::new(
            SledMetaDataStorage::from_db(&db, matcher)?
                .with_strict_validation(config.storage.strict_validation),
        );
        let ignored = Arc::new(SledIgnoredEntitiesStorage::from_db(&db)?);

        let manager = Arc::new(SyncEventManager::new());
        let queue = SyncEventQueue::new(Arc::clone(&manager))
            .map_err(SyncError::QueueStart)?;
        let crawler = Arc::new(DescendantsCrawler::new(
            local_root,
            root_folder_id,
            fs,
            repository,
            storage.clone(),
            ignored.clone(),
            Arc::new(IgnoreFilters::new(config.filters.clone())),
            Arc::new(queue.handle()),
        ));
        manager.add_event_handler(priorities::DEBUG, Arc::new(DebugLoggingHandler));
        manager.add_event_handler(priorities::CRAWLER, crawler.clone());

        info!(
            local_root = %local_root.display(),
            remote_root = root_folder_id,
            store = %store_path.display(),
            "Sync engine opened"
        );
        Ok(Self {
            manager,
            queue,
            crawler,
            storage,
            ignored,
            poll_interval: config.sync.poll_interval(),
            sync_on_start: config.sync.sync_on_start,
            checksum_algorithm: config.sync.checksum_algorithm.clone(),
        })
    }

    /// Where appliers register their handlers
    pub fn manager(&self) -> &Arc<SyncEventManager> {
        &self.manager
    }

    pub fn queue(&self) -> &SyncEventQueue {
        &self.queue
    }

    pub fn handle(&self) -> QueueHandle {
        self.queue.handle()
    }

    pub fn storage(&self) -> Arc<SledMetaDataStorage> {
        self.storage.clone()
    }

    pub fn ignored(&self) -> Arc<SledIgnoredEntitiesStorage> {
        self.ignored.clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.crawler.is_busy()
    }

    /// Algorithm appliers record for files they write
    pub fn checksum_algorithm(&self) -> &str {
        &self.checksum_algorithm
    }

    /// Post a pass request
    pub fn request_sync(&self, full_sync: bool) {
        self.queue
            .add_event(SyncEvent::StartNextSync(StartNextSyncEvent::new(full_sync)));
    }

    /// Start the periodic trigger on the current tokio runtime
    pub fn spawn_scheduler(&self) -> SchedulerHandle {
        SyncScheduler::new(self.poll_interval, Arc::new(self.queue.handle()))
            .with_sync_on_start(self.sync_on_start)
            .spawn()
    }

    /// Close the queue, let it drain and wait for the consumer; false on
    /// timeout
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.queue.stop_listener();
        self.queue.wait_for_stopped(timeout)
    }
}
