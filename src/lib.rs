//! cmsync: bidirectional reconciliation between a local folder and a remote
//! content repository.
//!
//! Each pass builds three trees (the local filesystem, the remote
//! repository and the stored mapping from the last sync), classifies what
//! changed on each side, merges both classifications per object and
//! publishes the result on the event bus for the appliers to act on.

pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod fs;
pub mod logging;
pub mod remote;
pub mod report;
pub mod store;
pub mod sync;
pub mod tree;
pub mod types;

pub use error::{StorageError, SyncError};
pub use events::{SyncEvent, SyncEventManager, SyncEventQueue};
pub use sync::{DescendantsCrawler, SyncEngine};
pub use tree::ObjectTree;
