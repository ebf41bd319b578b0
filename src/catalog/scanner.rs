// src/catalog/scanner.rs

//! Archive folder enumeration and change watching

use crate::error::Result;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// List archive files directly inside each folder
///
/// Folders are visited in order and files within a folder in name order, so
/// a later entry for the same package name deterministically wins. Missing
/// or unreadable folders are skipped.
pub fn enumerate_archives(folders: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    let mut archives = Vec::new();

    for folder in folders {
        let entries = match std::fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping folder {}: {}", folder.display(), e);
                continue;
            }
        };

        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| has_extension(path, extension) && path.is_file())
            .collect();
        found.sort();
        archives.extend(found);
    }

    archives
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Watches folders (non-recursively) for archives appearing or disappearing
///
/// The callback runs on the watcher's thread. Dropping the watcher stops it.
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
}

impl FolderWatcher {
    pub fn watch<F>(folders: &[PathBuf], extension: &str, on_change: F) -> Result<Self>
    where
        F: Fn(&Path) + Send + 'static,
    {
        let extension = extension.to_string();
        let watched = folders.to_vec();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(path) = relevant_path(&event, &watched, &extension) {
                        on_change(path);
                    }
                }
                Err(e) => warn!("Folder watch error: {}", e),
            })?;

        for folder in folders {
            match watcher.watch(folder, RecursiveMode::NonRecursive) {
                Ok(()) => debug!("Watching {}", folder.display()),
                Err(e) => warn!("Cannot watch {}: {}", folder.display(), e),
            }
        }

        Ok(Self { _watcher: watcher })
    }
}

/// First archive path (or watched folder) touched by an event that changes
/// the folder listing
///
/// Data writes are ignored until the writer closes the file, so a copy in
/// progress triggers one rescan at creation and one once complete.
fn relevant_path<'a>(event: &'a Event, folders: &[PathBuf], extension: &str) -> Option<&'a Path> {
    let relevant = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Name(_)) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    };
    if !relevant {
        return None;
    }
    event
        .paths
        .iter()
        .map(PathBuf::as_path)
        .find(|path| {
            has_extension(path, extension)
                || folders.iter().any(|folder| folder.as_path() == *path)
        })
}
