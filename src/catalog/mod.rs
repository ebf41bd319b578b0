// src/catalog/mod.rs

//! Local catalog store
//!
//! Keeps the records of archives found in the configured folders, keyed by
//! package name, and the set of installed packages that came from local
//! files. Both are rebuilt by background tasks; progress and completion are
//! reported on a [`CatalogEvent`] channel.

pub mod scanner;
mod store;

pub use scanner::{FolderWatcher, enumerate_archives};
pub use store::{LocalCatalog, LocalFlags};

use serde::Serialize;

/// Notifications sent by background catalog work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CatalogEvent {
    ScanProgress { processed: usize, total: usize },
    ScanFinished { found: usize },
    /// The on-disk record map changed
    LocalPackagesChanged,
    LocallyInstalledDetected { count: usize },
    SandboxPackagesChanged { count: usize },
}
