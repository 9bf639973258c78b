//! Folder and file change events produced by a reconciliation pass.

use crate::remote::RemoteObject;
use crate::store::MappedObject;
use crate::tree::LocalEntry;
use crate::types::ObjectKind;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

/// Metadata change on one side since the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetaDataChangeType {
    #[default]
    None,
    Created,
    Deleted,
    Changed,
    Moved,
}

/// Content change of a file on one side since the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentChangeType {
    #[default]
    None,
    Changed,
}

/// Both sides of one object's change
#[derive(Debug, Default)]
pub struct ObjectChange {
    pub local: MetaDataChangeType,
    pub remote: MetaDataChangeType,
    /// Live local entry, absent when the object is gone locally
    pub local_entry: Option<LocalEntry>,
    /// Live remote object, absent when the object is gone remotely
    pub remote_object: Option<RemoteObject>,
    /// Record from the last sync, absent for new objects
    pub stored: Option<MappedObject>,
    /// Where the stored record placed the object locally
    pub stored_local_path: Option<PathBuf>,
    /// Previous local path of a locally moved object
    pub old_local_path: Option<PathBuf>,
    /// Previous remote path of a remotely moved object
    pub old_remote_path: Option<String>,
    /// Skip debug logging on the bus
    pub quiet: bool,
    /// Keep out of the queue's in-flight counters
    pub uncounted: bool,
    retry_count: AtomicU32,
}

impl Clone for ObjectChange {
    fn clone(&self) -> Self {
        Self {
            local: self.local,
            remote: self.remote,
            local_entry: self.local_entry.clone(),
            remote_object: self.remote_object.clone(),
            stored: self.stored.clone(),
            stored_local_path: self.stored_local_path.clone(),
            old_local_path: self.old_local_path.clone(),
            old_remote_path: self.old_remote_path.clone(),
            quiet: self.quiet,
            uncounted: self.uncounted,
            retry_count: AtomicU32::new(self.retry_count.load(Ordering::Relaxed)),
        }
    }
}

impl ObjectChange {
    /// Remote id from the live remote object, falling back to the stored record
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_object
            .as_ref()
            .map(|o| o.id.as_str())
            .or_else(|| self.stored.as_ref().map(|s| s.remote_object_id.as_str()))
    }

    /// Best known local path: the live one, else the stored one
    pub fn local_path(&self) -> Option<&PathBuf> {
        self.local_entry
            .as_ref()
            .map(|e| &e.path)
            .or(self.stored_local_path.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FolderEvent {
    pub change: ObjectChange,
}

#[derive(Debug, Clone, Default)]
pub struct FileEvent {
    pub change: ObjectChange,
    pub local_content: ContentChangeType,
    pub remote_content: ContentChangeType,
}

/// A change to one synchronized object
#[derive(Debug, Clone)]
pub enum AbstractFolderEvent {
    Folder(FolderEvent),
    File(FileEvent),
}

impl AbstractFolderEvent {
    /// Empty event of the given kind
    pub fn new(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Folder => AbstractFolderEvent::Folder(FolderEvent::default()),
            ObjectKind::File => AbstractFolderEvent::File(FileEvent::default()),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            AbstractFolderEvent::Folder(_) => ObjectKind::Folder,
            AbstractFolderEvent::File(_) => ObjectKind::File,
        }
    }

    pub fn change(&self) -> &ObjectChange {
        match self {
            AbstractFolderEvent::Folder(e) => &e.change,
            AbstractFolderEvent::File(e) => &e.change,
        }
    }

    pub fn change_mut(&mut self) -> &mut ObjectChange {
        match self {
            AbstractFolderEvent::Folder(e) => &mut e.change,
            AbstractFolderEvent::File(e) => &mut e.change,
        }
    }

    pub fn local(&self) -> MetaDataChangeType {
        self.change().local
    }

    pub fn remote(&self) -> MetaDataChangeType {
        self.change().remote
    }

    /// Local content change; always `None` for folders
    pub fn local_content(&self) -> ContentChangeType {
        match self {
            AbstractFolderEvent::File(e) => e.local_content,
            AbstractFolderEvent::Folder(_) => ContentChangeType::None,
        }
    }

    pub fn remote_content(&self) -> ContentChangeType {
        match self {
            AbstractFolderEvent::File(e) => e.remote_content,
            AbstractFolderEvent::Folder(_) => ContentChangeType::None,
        }
    }

    pub fn set_local_content(&mut self, content: ContentChangeType) {
        if let AbstractFolderEvent::File(e) = self {
            e.local_content = content;
        }
    }

    pub fn set_remote_content(&mut self, content: ContentChangeType) {
        if let AbstractFolderEvent::File(e) = self {
            e.remote_content = content;
        }
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.change().remote_id()
    }

    /// True when neither metadata nor content changed on either side
    pub fn is_unchanged(&self) -> bool {
        self.local() == MetaDataChangeType::None
            && self.remote() == MetaDataChangeType::None
            && self.local_content() == ContentChangeType::None
            && self.remote_content() == ContentChangeType::None
    }

    /// Publish without debug logging
    pub fn quiet(mut self) -> Self {
        self.change_mut().quiet = true;
        self
    }

    /// Publish without touching the in-flight counters
    pub fn uncounted(mut self) -> Self {
        self.change_mut().uncounted = true;
        self
    }

    pub fn retry_count(&self) -> u32 {
        self.change().retry_count.load(Ordering::Acquire)
    }

    /// Bump the retry counter; the only mutation allowed after publication
    pub fn increment_retry_count(&self) -> u32 {
        self.change().retry_count.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl fmt::Display for AbstractFolderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Event [local: {:?}, remote: {:?}",
            match self.kind() {
                ObjectKind::File => "File",
                ObjectKind::Folder => "Folder",
            },
            self.local(),
            self.remote()
        )?;
        if let AbstractFolderEvent::File(e) = self {
            write!(
                f,
                ", content local: {:?}, content remote: {:?}",
                e.local_content, e.remote_content
            )?;
        }
        if let Some(path) = self.change().local_path() {
            write!(f, ", path: {}", path.display())?;
        }
        if let Some(id) = self.remote_id() {
            write!(f, ", remote id: {}", id)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_is_unchanged() {
        assert!(AbstractFolderEvent::new(ObjectKind::File).is_unchanged());
        assert!(AbstractFolderEvent::new(ObjectKind::Folder).is_unchanged());
    }

    #[test]
    fn test_content_only_applies_to_files() {
        let mut folder = AbstractFolderEvent::new(ObjectKind::Folder);
        folder.set_local_content(ContentChangeType::Changed);
        assert_eq!(folder.local_content(), ContentChangeType::None);

        let mut file = AbstractFolderEvent::new(ObjectKind::File);
        file.set_remote_content(ContentChangeType::Changed);
        assert_eq!(file.remote_content(), ContentChangeType::Changed);
        assert!(!file.is_unchanged());
    }

    #[test]
    fn test_retry_counter_survives_clone() {
        let event = AbstractFolderEvent::new(ObjectKind::File);
        assert_eq!(event.increment_retry_count(), 1);
        assert_eq!(event.increment_retry_count(), 2);
        let copy = event.clone();
        assert_eq!(copy.retry_count(), 2);
    }

    #[test]
    fn test_delivery_flags_survive_clone() {
        let event = AbstractFolderEvent::new(ObjectKind::Folder).quiet().uncounted();
        let copy = event.clone();
        assert!(copy.change().quiet);
        assert!(copy.change().uncounted);
        assert!(!AbstractFolderEvent::new(ObjectKind::File).change().quiet);
    }

    #[test]
    fn test_display_mentions_sides() {
        let mut event = AbstractFolderEvent::new(ObjectKind::File);
        event.change_mut().local = MetaDataChangeType::Created;
        let text = event.to_string();
        assert!(text.starts_with("FileEvent"));
        assert!(text.contains("local: Created"));
    }
}
