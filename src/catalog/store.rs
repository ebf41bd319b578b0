// src/catalog/store.rs

use crate::catalog::CatalogEvent;
use crate::catalog::scanner::{FolderWatcher, enumerate_archives};
use crate::config::{Config, ToolCommand};
use crate::error::{Error, Result};
use crate::model::repository::PackageDatabase;
use crate::origin::{ListingScan, OriginClassifier, PolicyClassifier, parse_listing};
use crate::packages::{ArchiveParser, LocalPackageRecord, VirtualPackage};
use crate::process::{Limits, run_tool};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Local-origin facts about one package name, read under a single lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalFlags {
    /// An archive for this name sits in a scanned folder
    pub on_disk: bool,
    /// The installed version came from a local file
    pub locally_installed: bool,
}

#[derive(Default)]
struct StoreState {
    folders: Vec<PathBuf>,
    on_disk: BTreeMap<String, LocalPackageRecord>,
    locally_installed: BTreeSet<String>,
}

struct Shared {
    state: Mutex<StoreState>,
    parser: ArchiveParser,
    classifier: Arc<dyn OriginClassifier>,
    listing_tool: ToolCommand,
    listing_limits: Limits,
    extension: String,
    events: Sender<CatalogEvent>,
    scan_generation: AtomicU64,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CatalogEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Rebuild the on-disk map; `None` if a newer scan superseded this one
    fn scan(&self) -> Option<usize> {
        let generation = self.scan_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let folders = self.state().folders.clone();
        let archives = enumerate_archives(&folders, &self.extension);
        let total = archives.len();
        info!("Scanning {} archives in {} folders", total, folders.len());
        self.emit(CatalogEvent::ScanProgress { processed: 0, total });

        // Sent under the lock so `processed` arrives in increasing order
        let processed = Mutex::new(0usize);
        let parsed: Vec<Option<LocalPackageRecord>> = archives
            .par_iter()
            .map(|path| {
                let record = match self.parser.parse(path) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        None
                    }
                };
                let mut done = processed.lock().unwrap_or_else(PoisonError::into_inner);
                *done += 1;
                self.emit(CatalogEvent::ScanProgress {
                    processed: *done,
                    total,
                });
                record
            })
            .collect();

        let mut on_disk = BTreeMap::new();
        for record in parsed.into_iter().flatten() {
            on_disk.insert(record.name.clone(), record);
        }
        let found = on_disk.len();

        {
            let mut state = self.state();
            if self.scan_generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding superseded scan {}", generation);
                return None;
            }
            state.on_disk = on_disk;
        }

        info!("Scan finished: {} local packages", found);
        self.emit(CatalogEvent::ScanFinished { found });
        self.emit(CatalogEvent::LocalPackagesChanged);
        Some(found)
    }

    fn spawn_scan(shared: Arc<Shared>) {
        rayon::spawn(move || {
            shared.scan();
        });
    }

    fn detect(&self) -> usize {
        let detected = match run_tool(&self.listing_tool, Vec::<&str>::new(), self.listing_limits) {
            Ok(output) => match parse_listing(&output.stdout) {
                ListingScan::Flagged(local) => Some(local),
                ListingScan::Unflagged(names) => {
                    debug!("Listing has no status flags, classifying {} packages", names.len());
                    Some(
                        names
                            .par_iter()
                            .filter(|name| self.classifier.is_locally_originated(name))
                            .cloned()
                            .collect(),
                    )
                }
            },
            Err(e) => {
                warn!("Cannot list installed packages: {}", e);
                None
            }
        };

        let count = {
            let mut state = self.state();
            if let Some(local) = detected {
                state.locally_installed = local;
            }
            state.locally_installed.len()
        };
        info!("{} packages installed from local files", count);
        self.emit(CatalogEvent::LocallyInstalledDetected { count });
        count
    }
}

/// Store of local archives and locally installed package names
///
/// Cheap to share: accessors return owned copies taken under the lock, and
/// background work runs on the rayon pool.
pub struct LocalCatalog {
    shared: Arc<Shared>,
    watch_folders: bool,
    watcher: Mutex<Option<FolderWatcher>>,
}

impl LocalCatalog {
    /// Create a store using the tools named in `config`
    pub fn new(config: &Config, events: Sender<CatalogEvent>) -> Self {
        Self::with_services(
            config,
            ArchiveParser::from_config(config),
            Arc::new(PolicyClassifier::from_config(config)),
            events,
        )
    }

    /// Create a store with explicit parser and origin classifier
    pub fn with_services(
        config: &Config,
        parser: ArchiveParser,
        classifier: Arc<dyn OriginClassifier>,
        events: Sender<CatalogEvent>,
    ) -> Self {
        let shared = Shared {
            state: Mutex::new(StoreState::default()),
            parser,
            classifier,
            listing_tool: config.listing_tool.clone(),
            listing_limits: Limits::new(config.listing_timeout(), config.termination_grace()),
            extension: config.archive_extension.clone(),
            events,
            scan_generation: AtomicU64::new(0),
        };
        Self {
            shared: Arc::new(shared),
            watch_folders: config.watch_folders,
            watcher: Mutex::new(None),
        }
    }

    /// Replace the scanned folders and start a rescan
    ///
    /// Empty paths are ignored. With folder watching enabled the new folders
    /// are watched and any archive change triggers another rescan.
    ///
    /// # Errors
    ///
    /// `Watch` if the file-change backend cannot be created. Folders that
    /// cannot be watched are only logged.
    pub fn set_folders(&self, folders: Vec<PathBuf>) -> Result<()> {
        let folders: Vec<PathBuf> = folders
            .into_iter()
            .filter(|folder| !folder.as_os_str().is_empty())
            .collect();
        debug!("Archive folders: {:?}", folders);
        self.shared.state().folders = folders.clone();

        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        *watcher = None;
        if self.watch_folders && !folders.is_empty() {
            let weak = Arc::downgrade(&self.shared);
            *watcher = Some(FolderWatcher::watch(
                &folders,
                &self.shared.extension,
                move |path| {
                    if let Some(shared) = weak.upgrade() {
                        debug!("Archive folder changed: {}", path.display());
                        Shared::spawn_scan(shared);
                    }
                },
            )?);
        }
        drop(watcher);

        self.rescan();
        Ok(())
    }

    pub fn folders(&self) -> Vec<PathBuf> {
        self.shared.state().folders.clone()
    }

    /// Rebuild the on-disk map in the background
    ///
    /// Emits [`CatalogEvent::ScanProgress`], then `ScanFinished` and
    /// `LocalPackagesChanged`. A scan started later supersedes this one.
    pub fn rescan(&self) {
        Shared::spawn_scan(Arc::clone(&self.shared));
    }

    /// Rebuild the on-disk map on the calling thread
    ///
    /// Returns the number of records, or `None` if a concurrent scan
    /// started later and its result will be kept instead.
    pub fn rescan_blocking(&self) -> Option<usize> {
        self.shared.scan()
    }

    /// Refresh the locally-installed set in the background
    pub fn detect_locally_installed(&self) {
        let shared = Arc::clone(&self.shared);
        rayon::spawn(move || {
            shared.detect();
        });
    }

    /// Refresh the locally-installed set on the calling thread
    ///
    /// If the listing cannot be obtained the previous set is kept. Returns
    /// the size of the set.
    pub fn detect_locally_installed_blocking(&self) -> usize {
        self.shared.detect()
    }

    /// Classify one installed package and remember a local verdict
    pub fn classify(&self, name: &str) -> bool {
        let local = self.shared.classifier.is_locally_originated(name);
        if local {
            self.shared
                .state()
                .locally_installed
                .insert(name.to_string());
        }
        local
    }

    pub fn record_for(&self, name: &str) -> Option<LocalPackageRecord> {
        self.shared.state().on_disk.get(name).cloned()
    }

    pub fn is_on_disk(&self, name: &str) -> bool {
        self.shared.state().on_disk.contains_key(name)
    }

    pub fn is_locally_installed(&self, name: &str) -> bool {
        self.shared.state().locally_installed.contains(name)
    }

    pub fn local_flags(&self, name: &str) -> LocalFlags {
        let state = self.shared.state();
        LocalFlags {
            on_disk: state.on_disk.contains_key(name),
            locally_installed: state.locally_installed.contains(name),
        }
    }

    /// Insert or replace one record outside a scan
    ///
    /// The record lives until the next rescan.
    pub fn add_transient(&self, record: LocalPackageRecord) -> Result<()> {
        if !record.is_valid() {
            return Err(Error::UnparseableOutput(format!(
                "record for {} has no package name",
                record.path.display()
            )));
        }
        debug!("Adding transient record {}", record.name);
        self.shared
            .state()
            .on_disk
            .insert(record.name.clone(), record);
        self.shared.emit(CatalogEvent::LocalPackagesChanged);
        Ok(())
    }

    /// Parse an archive from anywhere and add it as a transient record
    pub fn open_archive(&self, path: &Path) -> Result<LocalPackageRecord> {
        let record = self.shared.parser.parse(path)?;
        self.add_transient(record.clone())?;
        Ok(record)
    }

    pub fn records(&self) -> BTreeMap<String, LocalPackageRecord> {
        self.shared.state().on_disk.clone()
    }

    pub fn locally_installed(&self) -> BTreeSet<String> {
        self.shared.state().locally_installed.clone()
    }

    pub fn archive_paths(&self) -> Vec<PathBuf> {
        self.shared
            .state()
            .on_disk
            .values()
            .map(|record| record.path.clone())
            .collect()
    }

    /// Records with no same-named package in `db`, sorted by name
    pub fn virtual_packages(&self, db: &dyn PackageDatabase) -> Vec<VirtualPackage> {
        let records = self.records();
        records
            .into_values()
            .filter(|record| !db.contains(&record.name))
            .map(VirtualPackage::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::repository::{MemoryDatabase, RepoPackage};
    use std::fs;
    use std::sync::mpsc::{self, Receiver};
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    struct FixedClassifier(BTreeSet<String>);

    impl OriginClassifier for FixedClassifier {
        fn is_locally_originated(&self, package: &str) -> bool {
            self.0.contains(package)
        }
    }

    fn test_config() -> Config {
        Config {
            archive_tool: ToolCommand::with_args("sh", ["-c", "cat \"$2\"", "sh"]),
            policy_tool: ToolCommand::with_args("sh", ["-c", "exit 1", "sh"]),
            listing_tool: ToolCommand::with_args("sh", ["-c", "exit 1", "sh"]),
            watch_folders: false,
            termination_grace_ms: 200,
            ..Config::default()
        }
    }

    fn write_archive(dir: &Path, file: &str, name: &str, version: &str) -> PathBuf {
        let path = dir.join(file);
        let control = format!(
            " Package: {}\n Version: {}\n Architecture: amd64\n Section: utils\n Description: {} tool\n",
            name, version, name
        );
        fs::write(&path, control).unwrap();
        path
    }

    fn catalog(config: &Config) -> (LocalCatalog, Receiver<CatalogEvent>) {
        let (tx, rx) = mpsc::channel();
        (LocalCatalog::new(config, tx), rx)
    }

    #[test]
    fn test_rescan_blocking_collects_valid_archives() {
        let dir = tempdir().unwrap();
        write_archive(dir.path(), "foo_1.0_amd64.deb", "foo", "1.0");
        fs::write(dir.path().join("bogus.deb"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"Package: nope\n").unwrap();

        let config = test_config();
        let (catalog, rx) = catalog(&config);
        catalog.shared.state().folders = vec![dir.path().to_path_buf()];

        assert_eq!(catalog.rescan_blocking(), Some(1));
        let records = catalog.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records["foo"].version, "1.0");
        assert!(records["foo"].path.is_absolute());
        assert!(catalog.is_on_disk("foo"));

        let events: Vec<CatalogEvent> = rx.try_iter().collect();
        assert_eq!(
            events.first(),
            Some(&CatalogEvent::ScanProgress {
                processed: 0,
                total: 2
            })
        );
        assert!(events.contains(&CatalogEvent::ScanFinished { found: 1 }));
        assert_eq!(events.last(), Some(&CatalogEvent::LocalPackagesChanged));
    }

    #[test]
    fn test_background_rescan_reports_completion() {
        let dir = tempdir().unwrap();
        write_archive(dir.path(), "a_1_amd64.deb", "alpha", "1");
        write_archive(dir.path(), "b_1_amd64.deb", "beta", "2");

        let config = test_config();
        let (catalog, rx) = catalog(&config);
        catalog.set_folders(vec![dir.path().to_path_buf(), PathBuf::new()]).unwrap();
        assert_eq!(catalog.folders(), vec![dir.path().to_path_buf()]);

        let finished = rx
            .iter()
            .find(|event| matches!(event, CatalogEvent::ScanFinished { .. }));
        assert_eq!(finished, Some(CatalogEvent::ScanFinished { found: 2 }));
        assert_eq!(
            catalog.records().keys().cloned().collect::<Vec<_>>(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn test_rescan_drops_transient_records() {
        let dir = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let outside = write_archive(elsewhere.path(), "tool_3_amd64.deb", "tool", "3");

        let config = test_config();
        let (catalog, rx) = catalog(&config);
        let record = catalog.open_archive(&outside).unwrap();
        assert_eq!(record.name, "tool");
        assert_eq!(catalog.record_for("tool").unwrap().version, "3");
        assert_eq!(rx.try_recv().unwrap(), CatalogEvent::LocalPackagesChanged);

        catalog.shared.state().folders = vec![dir.path().to_path_buf()];
        catalog.rescan_blocking();
        assert!(!catalog.is_on_disk("tool"));
    }

    #[test]
    fn test_open_archive_failure_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.deb");
        fs::write(&empty, b"").unwrap();

        let config = test_config();
        let (catalog, rx) = catalog(&config);
        assert!(catalog.open_archive(&empty).is_err());
        assert!(catalog.open_archive(&dir.path().join("missing.deb")).is_err());
        assert!(catalog.records().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_add_transient_overwrites_by_name() {
        let config = test_config();
        let (catalog, _rx) = catalog(&config);
        let mut record = LocalPackageRecord {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            ..Default::default()
        };
        catalog.add_transient(record.clone()).unwrap();
        record.version = "2.0".to_string();
        catalog.add_transient(record).unwrap();
        assert_eq!(catalog.records().len(), 1);
        assert_eq!(catalog.record_for("foo").unwrap().version, "2.0");

        assert!(catalog.add_transient(LocalPackageRecord::default()).is_err());
    }

    #[test]
    fn test_detect_uses_listing_flags() {
        let config = Config {
            listing_tool: ToolCommand::with_args(
                "sh",
                [
                    "-c",
                    "printf 'Listing...\\nbash/now 5.2 amd64 [installed]\\nmytool/now 1.0 amd64 [installed,local]\\n'",
                    "sh",
                ],
            ),
            ..test_config()
        };
        let (catalog, rx) = catalog(&config);
        assert_eq!(catalog.detect_locally_installed_blocking(), 1);
        assert!(catalog.is_locally_installed("mytool"));
        assert!(!catalog.is_locally_installed("bash"));
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::LocallyInstalledDetected { count: 1 }
        );
    }

    #[test]
    fn test_detect_classifies_unflagged_listing() {
        let config = Config {
            listing_tool: ToolCommand::with_args(
                "sh",
                ["-c", "printf 'bar\\t2.1\\nbash\\t5.2\\n'", "sh"],
            ),
            ..test_config()
        };
        let (tx, _rx) = mpsc::channel();
        let classifier = FixedClassifier(["bar".to_string()].into_iter().collect());
        let catalog = LocalCatalog::with_services(
            &config,
            ArchiveParser::from_config(&config),
            Arc::new(classifier),
            tx,
        );
        assert_eq!(catalog.detect_locally_installed_blocking(), 1);
        assert_eq!(
            catalog.locally_installed().into_iter().collect::<Vec<_>>(),
            vec!["bar".to_string()]
        );
    }

    #[test]
    fn test_detect_failure_keeps_previous_set() {
        let config = test_config();
        let (tx, rx) = mpsc::channel();
        let classifier = FixedClassifier(["bar".to_string()].into_iter().collect());
        let catalog = LocalCatalog::with_services(
            &config,
            ArchiveParser::from_config(&config),
            Arc::new(classifier),
            tx,
        );
        assert!(catalog.classify("bar"));
        assert!(!catalog.classify("bash"));
        assert_eq!(catalog.detect_locally_installed_blocking(), 1);
        assert!(catalog.is_locally_installed("bar"));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            CatalogEvent::LocallyInstalledDetected { count: 1 }
        );
    }

    #[test]
    fn test_virtual_packages_exclude_repository_names() {
        let dir = tempdir().unwrap();
        write_archive(dir.path(), "foo_1.0_amd64.deb", "foo", "1.0");
        write_archive(dir.path(), "gimp_2.10_amd64.deb", "gimp", "2.10");

        let config = test_config();
        let (catalog, _rx) = catalog(&config);
        catalog.shared.state().folders = vec![dir.path().to_path_buf()];
        catalog.rescan_blocking();

        let db = MemoryDatabase::new(vec![RepoPackage::new("gimp", "amd64")]);
        let virtuals = catalog.virtual_packages(&db);
        assert_eq!(virtuals.len(), 1);
        assert_eq!(virtuals[0].name(), "foo");
        assert!(virtuals[0].is_virtual());

        let flags = catalog.local_flags("gimp");
        assert!(flags.on_disk);
        assert!(!flags.locally_installed);
        assert_eq!(catalog.archive_paths().len(), 2);
    }

    #[test]
    fn test_scan_progress_counts_up() {
        let dir = tempdir().unwrap();
        for i in 0..8 {
            write_archive(dir.path(), &format!("p{}_1_amd64.deb", i), &format!("p{}", i), "1");
        }

        let config = test_config();
        let (catalog, rx) = catalog(&config);
        catalog.shared.state().folders = vec![dir.path().to_path_buf()];
        assert_eq!(catalog.rescan_blocking(), Some(8));

        let progress: Vec<usize> = rx
            .try_iter()
            .filter_map(|event| match event {
                CatalogEvent::ScanProgress { processed, total } => {
                    assert_eq!(total, 8);
                    Some(processed)
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress, (0..=8).collect::<Vec<_>>());
    }

    /// Wait until a scan finishes with `found` records
    fn wait_for_found(rx: &Receiver<CatalogEvent>, found: usize) {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(CatalogEvent::ScanFinished { found: n }) if n == found => return,
                Ok(_) => continue,
                Err(e) => panic!("no scan found {} records: {}", found, e),
            }
        }
    }

    #[test]
    fn test_watched_folder_change_triggers_rescan() {
        let dir = tempdir().unwrap();
        write_archive(dir.path(), "a_1_amd64.deb", "a", "1");

        let config = Config {
            watch_folders: true,
            ..test_config()
        };
        let (catalog, rx) = catalog(&config);
        catalog.set_folders(vec![dir.path().to_path_buf()]).unwrap();
        wait_for_found(&rx, 1);

        // Written aside and renamed in so no scan sees a partial file
        let staged = write_archive(dir.path(), "b.partial", "b", "1");
        fs::rename(&staged, dir.path().join("b_1_amd64.deb")).unwrap();
        wait_for_found(&rx, 2);
        assert_eq!(
            catalog.records().keys().cloned().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
