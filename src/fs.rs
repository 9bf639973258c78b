//! Local filesystem accessor.
//!
//! The reconciliation engine never touches `std::fs` directly; it goes through
//! [`LocalFileSystem`] so passes can run against a real directory or a fake.

use crate::types::BLAKE3;
use chrono::{DateTime, Utc};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

/// Extended attribute carrying the object GUID
pub const GUID_XATTR: &str = "user.cmsync.guid";

/// Longest local path the engine accepts before aborting a pass
#[cfg(windows)]
pub const MAX_PATH_LENGTH: usize = 260;
#[cfg(not(windows))]
pub const MAX_PATH_LENGTH: usize = 4096;

/// Capability set the engine needs from the local filesystem
pub trait LocalFileSystem: Send + Sync {
    fn list_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// GUID stored on the entry, `None` when absent or unparseable
    fn read_guid(&self, path: &Path) -> io::Result<Option<Uuid>>;
    fn write_guid(&self, path: &Path, guid: Uuid) -> io::Result<()>;

    fn last_write_time(&self, path: &Path) -> io::Result<DateTime<Utc>>;
    fn is_symlink(&self, path: &Path) -> io::Result<bool>;

    /// Digest of the file content, `None` when `algorithm` is unsupported
    fn content_hash(&self, path: &Path, algorithm: &str) -> io::Result<Option<Vec<u8>>>;
}

/// [`LocalFileSystem`] backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileSystem;

impl NativeFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn children(&self, dir: &Path, want_dirs: bool) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed"))
            })?;
            let is_dir = if entry.path_is_symlink() {
                std::fs::metadata(entry.path())
                    .map(|m| m.is_dir())
                    .unwrap_or(false)
            } else {
                entry.file_type().is_dir()
            };
            if is_dir == want_dirs {
                out.push(entry.into_path());
            }
        }
        Ok(out)
    }
}

impl LocalFileSystem for NativeFileSystem {
    fn list_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.children(dir, true)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.children(dir, false)
    }

    fn read_guid(&self, path: &Path) -> io::Result<Option<Uuid>> {
        let raw = match xattr::get(path, GUID_XATTR) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::Unsupported => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(raw
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok()))
    }

    fn write_guid(&self, path: &Path, guid: Uuid) -> io::Result<()> {
        xattr::set(path, GUID_XATTR, guid.to_string().as_bytes())
    }

    fn last_write_time(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let modified = std::fs::symlink_metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn is_symlink(&self, path: &Path) -> io::Result<bool> {
        Ok(std::fs::symlink_metadata(path)?.file_type().is_symlink())
    }

    fn content_hash(&self, path: &Path, algorithm: &str) -> io::Result<Option<Vec<u8>>> {
        if algorithm != BLAKE3 {
            return Ok(None);
        }
        let mut file = std::fs::File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(Some(hasher.finalize().as_bytes().to_vec()))
    }
}

/// Check a local path against [`MAX_PATH_LENGTH`]
pub fn exceeds_path_limit(path: &Path) -> bool {
    path.as_os_str().len() > MAX_PATH_LENGTH
}
