//! Name and symlink filters consulted by the tree builders.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Verdict of a single filter check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    /// Rejected, with a human readable reason
    Reject(String),
}

impl FilterDecision {
    pub fn is_rejected(&self) -> bool {
        matches!(self, FilterDecision::Reject(_))
    }

    /// Chain another check, keeping the first rejection
    pub fn or_else(self, next: impl FnOnce() -> FilterDecision) -> FilterDecision {
        match self {
            FilterDecision::Accept => next(),
            rejected => rejected,
        }
    }
}

/// Aggregate of every filter the tree builders apply to a child
pub trait FilterAggregator: Send + Sync {
    fn check_folder_name(&self, name: &str) -> FilterDecision;
    fn check_invalid_folder_name(&self, name: &str) -> FilterDecision;
    fn check_file_name(&self, name: &str) -> FilterDecision;
    fn check_symlink(&self, path: &Path, is_symlink: bool) -> FilterDecision;

    /// Folder name checks in the order the builders apply them
    fn check_folder(&self, name: &str) -> FilterDecision {
        self.check_folder_name(name)
            .or_else(|| self.check_invalid_folder_name(name))
    }
}

fn default_ignored_folders() -> Vec<String> {
    vec![".*".to_string(), "~*".to_string()]
}

fn default_ignored_files() -> Vec<String> {
    vec![
        ".*".to_string(),
        "~$*".to_string(),
        "*.tmp".to_string(),
        "*.swp".to_string(),
        "*.sync".to_string(),
        "desktop.ini".to_string(),
        "Thumbs.db".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// Filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Wildcard patterns (`*`, `?`) matched against folder names
    #[serde(default = "default_ignored_folders")]
    pub ignored_folders: Vec<String>,

    /// Wildcard patterns matched against file names
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,

    /// Skip symbolic links while walking the local tree
    #[serde(default = "default_true")]
    pub skip_symlinks: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignored_folders: default_ignored_folders(),
            ignored_files: default_ignored_files(),
            skip_symlinks: default_true(),
        }
    }
}

/// Pattern based [`FilterAggregator`]
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilters {
    config: FilterConfig,
}

impl IgnoreFilters {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Filters that accept everything except invalid folder names
    pub fn permissive() -> Self {
        Self::new(FilterConfig {
            ignored_folders: Vec::new(),
            ignored_files: Vec::new(),
            skip_symlinks: false,
        })
    }

    fn first_match<'a>(patterns: &'a [String], name: &str) -> Option<&'a str> {
        patterns
            .iter()
            .find(|p| wildcard_match(p, name))
            .map(String::as_str)
    }
}

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

impl FilterAggregator for IgnoreFilters {
    fn check_folder_name(&self, name: &str) -> FilterDecision {
        match Self::first_match(&self.config.ignored_folders, name) {
            Some(pattern) => FilterDecision::Reject(format!(
                "folder name {:?} matches ignore pattern {:?}",
                name, pattern
            )),
            None => FilterDecision::Accept,
        }
    }

    fn check_invalid_folder_name(&self, name: &str) -> FilterDecision {
        if name.is_empty() {
            return FilterDecision::Reject("folder name is empty".to_string());
        }
        if let Some(c) = name.chars().find(|c| RESERVED_CHARS.contains(c) || c.is_control()) {
            return FilterDecision::Reject(format!(
                "folder name {:?} contains reserved character {:?}",
                name, c
            ));
        }
        if name.ends_with(' ') || name.ends_with('.') {
            return FilterDecision::Reject(format!(
                "folder name {:?} ends with a space or a dot",
                name
            ));
        }
        FilterDecision::Accept
    }

    fn check_file_name(&self, name: &str) -> FilterDecision {
        match Self::first_match(&self.config.ignored_files, name) {
            Some(pattern) => FilterDecision::Reject(format!(
                "file name {:?} matches ignore pattern {:?}",
                name, pattern
            )),
            None => FilterDecision::Accept,
        }
    }

    fn check_symlink(&self, path: &Path, is_symlink: bool) -> FilterDecision {
        if is_symlink && self.config.skip_symlinks {
            FilterDecision::Reject(format!("{} is a symbolic link", path.display()))
        } else {
            FilterDecision::Accept
        }
    }
}

/// Match `name` against a pattern where `*` spans any run and `?` one character
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
