//! Maps stored records onto local and remote paths.

use std::path::{Path, PathBuf};

/// Root pair shared by both sides of a synchronized folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    local_root: PathBuf,
    remote_root: String,
}

impl PathMatcher {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<String>) -> Self {
        let mut remote_root = remote_root.into();
        while remote_root.len() > 1 && remote_root.ends_with('/') {
            remote_root.pop();
        }
        Self {
            local_root: local_root.into(),
            remote_root,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Local path of the object reached by `names` below the root
    pub fn local_path<S: AsRef<str>>(&self, names: &[S]) -> PathBuf {
        let mut path = self.local_root.clone();
        for name in names {
            path.push(name.as_ref());
        }
        path
    }

    /// Remote path of the object reached by `names` below the root
    pub fn remote_path<S: AsRef<str>>(&self, names: &[S]) -> String {
        let mut path = self.remote_root.clone();
        for name in names {
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(name.as_ref());
        }
        path
    }

    /// Names below the local root leading to `path`, if it lies inside it
    pub fn relative_names(&self, path: &Path) -> Option<Vec<String>> {
        let rest = path.strip_prefix(&self.local_root).ok()?;
        rest.components()
            .map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect()
    }
}
