//! In-memory collaborators and a fixture that keeps the three sides of a
//! synchronized folder consistent until a test changes one of them.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use cmsync::error::SyncError;
use cmsync::events::{AbstractFolderEvent, EventSink, SyncEvent};
use cmsync::filter::IgnoreFilters;
use cmsync::fs::LocalFileSystem;
use cmsync::remote::{RemoteObject, RemoteRepository};
use cmsync::store::{
    InMemoryIgnoredEntities, MappedObject, MetaDataStorage, PathMatcher, SledMetaDataStorage,
    StoredSnapshot,
};
use cmsync::sync::{DescendantsCrawler, Reconciler};
use cmsync::tree::{LocalTreeBuilder, RemoteTreeBuilder};
use cmsync::types::{ContentHash, ObjectKind, BLAKE3};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub const LOCAL_ROOT: &str = "/sync";
pub const REMOTE_ROOT_ID: &str = "root";
pub const REMOTE_ROOT_PATH: &str = "/Sites/docs";

pub fn ts(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset, 0)
        .single()
        .unwrap()
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub kind: ObjectKind,
    pub guid: Option<Uuid>,
    pub modified: DateTime<Utc>,
    pub content: Vec<u8>,
}

/// Local filesystem kept in a map from path to node
#[derive(Debug, Default)]
pub struct FakeFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, FakeNode>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.insert(
            LOCAL_ROOT,
            FakeNode {
                kind: ObjectKind::Folder,
                guid: None,
                modified: ts(0),
                content: Vec::new(),
            },
        );
        fs
    }

    pub fn insert(&self, path: impl Into<PathBuf>, node: FakeNode) {
        self.nodes.write().insert(path.into(), node);
    }

    /// Remove `path` and everything below it
    pub fn remove(&self, path: &Path) {
        self.nodes.write().retain(|p, _| !p.starts_with(path));
    }

    /// Move `from` and everything below it to `to`
    pub fn rename(&self, from: &Path, to: &Path) {
        let mut nodes = self.nodes.write();
        let moved: Vec<(PathBuf, FakeNode)> = nodes
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();
        for (path, node) in moved {
            nodes.remove(&path);
            let rest = path.strip_prefix(from).unwrap();
            nodes.insert(to.join(rest), node);
        }
    }

    pub fn update(&self, path: &Path, f: impl FnOnce(&mut FakeNode)) {
        f(self.nodes.write().get_mut(path).unwrap());
    }

    fn children(&self, dir: &Path, kind: ObjectKind) -> io::Result<Vec<PathBuf>> {
        let nodes = self.nodes.read();
        match nodes.get(dir) {
            Some(node) if node.kind == ObjectKind::Folder => {}
            _ => return Err(io::Error::new(io::ErrorKind::NotFound, "no such directory")),
        }
        Ok(nodes
            .iter()
            .filter(|(p, n)| p.parent() == Some(dir) && n.kind == kind)
            .map(|(p, _)| p.clone())
            .collect())
    }

    fn node(&self, path: &Path) -> io::Result<FakeNode> {
        self.nodes
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such entry"))
    }
}

impl LocalFileSystem for FakeFileSystem {
    fn list_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.children(dir, ObjectKind::Folder)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.children(dir, ObjectKind::File)
    }

    fn read_guid(&self, path: &Path) -> io::Result<Option<Uuid>> {
        Ok(self.node(path)?.guid)
    }

    fn write_guid(&self, path: &Path, guid: Uuid) -> io::Result<()> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such entry"))?;
        node.guid = Some(guid);
        Ok(())
    }

    fn last_write_time(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        Ok(self.node(path)?.modified)
    }

    fn is_symlink(&self, _path: &Path) -> io::Result<bool> {
        Ok(false)
    }

    fn content_hash(&self, path: &Path, algorithm: &str) -> io::Result<Option<Vec<u8>>> {
        if algorithm != BLAKE3 {
            return Ok(None);
        }
        Ok(Some(ContentHash::blake3(&self.node(path)?.content).digest))
    }
}

/// Remote repository kept in a map from object id to object
#[derive(Debug, Default)]
pub struct FakeRepository {
    objects: RwLock<HashMap<String, RemoteObject>>,
    /// Folder ids passed to `get_children`, in call order
    pub listed: Mutex<Vec<String>>,
    panic_next_fetch: AtomicBool,
}

impl FakeRepository {
    pub fn new() -> Self {
        let repo = Self::default();
        repo.insert(RemoteObject::folder(REMOTE_ROOT_ID, "docs", None));
        repo
    }

    pub fn insert(&self, object: RemoteObject) {
        self.objects.write().insert(object.id.clone(), object);
    }

    /// Remove `id` and everything below it
    pub fn remove(&self, id: &str) {
        let mut objects = self.objects.write();
        let mut doomed = vec![id.to_string()];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i].clone();
            doomed.extend(
                objects
                    .values()
                    .filter(|o| o.parent_id.as_deref() == Some(parent.as_str()))
                    .map(|o| o.id.clone()),
            );
            i += 1;
        }
        for id in doomed {
            objects.remove(&id);
        }
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut RemoteObject)) {
        f(self.objects.write().get_mut(id).unwrap());
    }

    /// Make the next `get_object` call panic, as a buggy client would
    pub fn panic_on_next_fetch(&self) {
        self.panic_next_fetch.store(true, Ordering::SeqCst);
    }
}

impl RemoteRepository for FakeRepository {
    fn get_object(&self, id: &str) -> Result<RemoteObject, SyncError> {
        if self.panic_next_fetch.swap(false, Ordering::SeqCst) {
            panic!("remote client crashed fetching {}", id);
        }
        self.objects
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::RemoteError(format!("object {} not found", id)))
    }

    fn get_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>, SyncError> {
        self.listed.lock().push(folder_id.to_string());
        let mut children: Vec<RemoteObject> = self
            .objects
            .read()
            .values()
            .filter(|o| o.parent_id.as_deref() == Some(folder_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}

/// Sink that keeps everything published to it
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<SyncEvent>>,
}

impl EventSink for CollectingSink {
    fn add_event(&self, event: SyncEvent) {
        self.events.lock().push(event);
    }
}

/// Local tree, remote tree and stored records of one synchronized folder
pub struct Fixture {
    pub fs: Arc<FakeFileSystem>,
    pub repo: Arc<FakeRepository>,
    pub records: Vec<MappedObject>,
    pub matcher: PathMatcher,
    local_paths: HashMap<String, PathBuf>,
    tokens: u64,
}

impl Fixture {
    /// A folder where only the root has been synchronized
    pub fn new() -> Self {
        let root = MappedObject::new("", REMOTE_ROOT_ID, ObjectKind::Folder, None)
            .unwrap()
            .with_local_write(ts(0));
        let mut local_paths = HashMap::new();
        local_paths.insert(REMOTE_ROOT_ID.to_string(), PathBuf::from(LOCAL_ROOT));
        Self {
            fs: Arc::new(FakeFileSystem::new()),
            repo: Arc::new(FakeRepository::new()),
            records: vec![root],
            matcher: PathMatcher::new(LOCAL_ROOT, REMOTE_ROOT_PATH),
            local_paths,
            tokens: 0,
        }
    }

    pub fn next_token(&mut self) -> String {
        self.tokens += 1;
        format!("token-{}", self.tokens)
    }

    pub fn local_path(&self, id: &str) -> PathBuf {
        self.local_paths[id].clone()
    }

    pub fn record(&self, id: &str) -> &MappedObject {
        self.records
            .iter()
            .find(|r| r.remote_object_id == id)
            .unwrap()
    }

    /// A folder present and unchanged on both sides
    pub fn synced_folder(&mut self, id: &str, name: &str, parent_id: &str) -> Uuid {
        self.synced(id, name, parent_id, ObjectKind::Folder, b"")
    }

    /// A file present and unchanged on both sides
    pub fn synced_file(&mut self, id: &str, name: &str, parent_id: &str, content: &[u8]) -> Uuid {
        self.synced(id, name, parent_id, ObjectKind::File, content)
    }

    fn synced(
        &mut self,
        id: &str,
        name: &str,
        parent_id: &str,
        kind: ObjectKind,
        content: &[u8],
    ) -> Uuid {
        let token = self.next_token();
        let modified = ts(self.records.len() as i64);
        let path = self.local_path(parent_id).join(name);

        let mut record = MappedObject::new(name, id, kind, Some(parent_id))
            .unwrap()
            .with_change_token(token.clone())
            .with_local_write(modified);
        let mut remote = match kind {
            ObjectKind::Folder => RemoteObject::folder(id, name, Some(parent_id)),
            ObjectKind::File => RemoteObject::document(id, name, parent_id),
        }
        .with_change_token(token);
        if kind == ObjectKind::File {
            let hash = ContentHash::blake3(content);
            record = record.with_checksum(hash.algorithm.clone(), hash.digest.clone());
            remote = remote.with_content_hash(hash);
        }

        self.fs.insert(
            path.clone(),
            FakeNode {
                kind,
                guid: Some(record.guid),
                modified,
                content: content.to_vec(),
            },
        );
        self.repo.insert(remote);
        self.local_paths.insert(id.to_string(), path);
        let guid = record.guid;
        self.records.push(record);
        guid
    }

    /// Run the diff and merge phase over the current state
    pub fn reconcile(&self) -> Vec<AbstractFolderEvent> {
        let filters = IgnoreFilters::permissive();
        let ignored = InMemoryIgnoredEntities::new();
        let local = LocalTreeBuilder::new(self.fs.as_ref(), &filters)
            .build(Path::new(LOCAL_ROOT))
            .unwrap();
        let remote = RemoteTreeBuilder::new(self.repo.as_ref(), &filters, &ignored)
            .build(REMOTE_ROOT_ID)
            .unwrap();
        let snapshot = StoredSnapshot::from_objects(self.records.clone()).unwrap();
        Reconciler::new(self.fs.as_ref(), self.repo.as_ref(), &self.matcher)
            .reconcile(&snapshot, &local, &remote)
    }

    /// Temporary sled store holding the fixture's records
    pub fn storage(&self, strict: bool) -> Arc<SledMetaDataStorage> {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let storage = SledMetaDataStorage::from_db(&db, self.matcher.clone()).unwrap();
        for record in &self.records {
            storage.save_mapped_object(record).unwrap();
        }
        Arc::new(storage.with_strict_validation(strict))
    }

    /// Crawler over the fixture's collaborators publishing into `sink`
    pub fn crawler(
        &self,
        storage: Arc<dyn MetaDataStorage>,
        sink: Arc<dyn EventSink>,
    ) -> DescendantsCrawler {
        DescendantsCrawler::new(
            LOCAL_ROOT,
            REMOTE_ROOT_ID,
            self.fs.clone(),
            self.repo.clone(),
            storage,
            Arc::new(InMemoryIgnoredEntities::new()),
            Arc::new(IgnoreFilters::permissive()),
            sink,
        )
    }
}

/// Compact view of an event for assertions
pub fn summary(event: &AbstractFolderEvent) -> String {
    let name = event
        .change()
        .local_entry
        .as_ref()
        .map(|e| e.name.clone())
        .or_else(|| event.change().remote_object.as_ref().map(|o| o.name.clone()))
        .or_else(|| event.change().stored.as_ref().map(|s| s.name.clone()))
        .unwrap_or_default();
    format!("{} {:?}/{:?}", name, event.local(), event.remote())
}
