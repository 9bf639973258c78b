//! Snapshot trees and the builders that acquire them.

pub mod local;
pub mod node;
pub mod remote;

pub use local::{LocalEntry, LocalTreeBuilder};
pub use node::{ObjectTree, PreOrder};
pub use remote::RemoteTreeBuilder;
