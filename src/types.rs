//! Core types shared by the trees, the store and the event model.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of a synchronized object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    File,
    Folder,
}

impl ObjectKind {
    pub fn is_folder(self) -> bool {
        matches!(self, ObjectKind::Folder)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::File => f.write_str("file"),
            ObjectKind::Folder => f.write_str("folder"),
        }
    }
}

/// Identity of a local object: the GUID persisted as filesystem metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalIdentity {
    pub guid: Uuid,
}

/// Identity of a remote object: the repository object id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteIdentity {
    pub id: String,
}

impl RemoteIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Digest of a content stream together with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    pub algorithm: String,
    pub digest: Vec<u8>,
}

impl ContentHash {
    pub fn new(algorithm: impl Into<String>, digest: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            digest,
        }
    }

    /// Hash `bytes` with blake3
    pub fn blake3(bytes: &[u8]) -> Self {
        Self::new(BLAKE3, blake3::hash(bytes).as_bytes().to_vec())
    }
}

/// Algorithm name used for locally computed content hashes
pub const BLAKE3: &str = "blake3";

/// Compare two object names the way the filesystem would present them.
///
/// Names are normalized to NFC first so that a decomposed name coming from
/// one side does not look like a rename of the composed form on the other.
pub fn names_equal(a: &str, b: &str) -> bool {
    use unicode_normalization::UnicodeNormalization;
    a == b || a.nfc().eq(b.nfc())
}
