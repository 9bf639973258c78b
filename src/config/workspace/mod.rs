//! Per-folder settings

pub mod storage_paths;
