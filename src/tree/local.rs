//! Local tree acquisition

use super::ObjectTree;
use crate::error::SyncError;
use crate::filter::{FilterAggregator, FilterDecision};
use crate::fs::{exceeds_path_limit, LocalFileSystem, MAX_PATH_LENGTH};
use crate::types::{LocalIdentity, ObjectKind};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use uuid::Uuid;

/// A file or folder found on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: ObjectKind,
    pub last_write_utc: DateTime<Utc>,
    /// GUID read from the extended attribute, if present and parseable
    pub guid: Option<Uuid>,
}

impl LocalEntry {
    pub fn identity(&self) -> Option<LocalIdentity> {
        self.guid.map(|guid| LocalIdentity { guid })
    }
}

/// Builds the filtered local tree below a root directory
pub struct LocalTreeBuilder<'a> {
    fs: &'a dyn LocalFileSystem,
    filters: &'a dyn FilterAggregator,
}

impl<'a> LocalTreeBuilder<'a> {
    pub fn new(fs: &'a dyn LocalFileSystem, filters: &'a dyn FilterAggregator) -> Self {
        Self { fs, filters }
    }

    /// Walk `root` depth-first. The root itself is never filtered.
    pub fn build(&self, root: &Path) -> Result<ObjectTree<LocalEntry>, SyncError> {
        self.build_folder(root)
    }

    fn build_folder(&self, path: &Path) -> Result<ObjectTree<LocalEntry>, SyncError> {
        let entry = self.entry(path, ObjectKind::Folder)?;
        let mut children = Vec::new();

        let dirs = self.fs.list_directories(path).map_err(|e| self.fail(path, e))?;
        for dir in dirs {
            let name = file_name(&dir);
            let decision = self
                .filters
                .check_folder(&name)
                .or_else(|| self.symlink_decision(&dir));
            if self.skip(&dir, decision) {
                continue;
            }
            children.push(self.build_folder(&dir)?);
        }

        let files = self.fs.list_files(path).map_err(|e| self.fail(path, e))?;
        for file in files {
            let name = file_name(&file);
            let decision = self
                .filters
                .check_file_name(&name)
                .or_else(|| self.symlink_decision(&file));
            if self.skip(&file, decision) {
                continue;
            }
            children.push(ObjectTree::leaf(self.entry(&file, ObjectKind::File)?));
        }

        Ok(ObjectTree::with_children(entry, children))
    }

    fn entry(&self, path: &Path, kind: ObjectKind) -> Result<LocalEntry, SyncError> {
        if exceeds_path_limit(path) {
            error!(
                path = %path.display(),
                limit = MAX_PATH_LENGTH,
                "Local path exceeds the path length limit, aborting"
            );
            return Err(SyncError::PathTooLong {
                path: path.to_path_buf(),
                limit: MAX_PATH_LENGTH,
            });
        }
        let last_write_utc = self
            .fs
            .last_write_time(path)
            .map_err(|e| self.fail(path, e))?;
        let guid = match self.fs.read_guid(path) {
            Ok(guid) => guid,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unable to read guid");
                None
            }
        };
        Ok(LocalEntry {
            name: file_name(path),
            path: path.to_path_buf(),
            kind,
            last_write_utc,
            guid,
        })
    }

    fn symlink_decision(&self, path: &Path) -> FilterDecision {
        match self.fs.is_symlink(path) {
            Ok(is_link) => self.filters.check_symlink(path, is_link),
            Err(e) => FilterDecision::Reject(format!("unable to inspect entry: {}", e)),
        }
    }

    fn skip(&self, path: &Path, decision: FilterDecision) -> bool {
        match decision {
            FilterDecision::Accept => false,
            FilterDecision::Reject(reason) => {
                debug!(path = %path.display(), reason = %reason, "Skipping filtered local entry");
                true
            }
        }
    }

    fn fail(&self, path: &Path, e: std::io::Error) -> SyncError {
        error!(path = %path.display(), error = %e, "Failed to read local tree");
        SyncError::local_io(path, e)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
