// tests/integration_test.rs

//! Integration tests for the Kydra catalog
//!
//! These tests drive the store, the composite catalog and the view together,
//! with the external tools replaced by small shell scripts.

use kydra_catalog::catalog::{CatalogEvent, LocalCatalog};
use kydra_catalog::config::{Config, ToolCommand};
use kydra_catalog::model::{
    CatalogView, CompositeCatalog, GenericIcons, LocalOrigins, MemoryDatabase, PackageState,
    RepoPackage, Role, RowRef,
};
use kydra_catalog::origin::{OriginClassifier, PolicyClassifier};
use kydra_catalog::packages::{ArchiveParser, LocalPackageRecord, VirtualPackage};
use kydra_catalog::sandbox::SandboxApp;
use kydra_catalog::Error;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Archive "inspector" that prints the file itself
fn cat_tool() -> ToolCommand {
    ToolCommand::with_args("sh", ["-c", "cat \"$2\"", "sh"])
}

fn test_config() -> Config {
    Config {
        archive_tool: cat_tool(),
        policy_tool: ToolCommand::with_args("sh", ["-c", "exit 1", "sh"]),
        listing_tool: ToolCommand::with_args("sh", ["-c", "exit 1", "sh"]),
        sandbox_tool: ToolCommand::with_args("sh", ["-c", "exit 1", "sh"]),
        termination_grace_ms: 200,
        watch_folders: false,
        ..Config::default()
    }
}

fn write_archive(dir: &Path, file: &str, name: &str, section: &str) -> PathBuf {
    let path = dir.join(file);
    let control = format!(
        " new Debian package, version 2.0.
 Package: {name}
 Version: 1.0
 Architecture: amd64
 Maintainer: Jane Packager <jane@example.org>
 Installed-Size: 120
 Depends: libc6 (>= 2.34), libfoo1
 Section: {section}
 Description: {name} utility
  Longer description of {name}.
"
    );
    fs::write(&path, control).unwrap();
    path
}

fn wait_for_scan(rx: &mpsc::Receiver<CatalogEvent>) -> usize {
    loop {
        match rx.recv_timeout(Duration::from_secs(30)).unwrap() {
            CatalogEvent::ScanFinished { found } => return found,
            _ => continue,
        }
    }
}

struct FixedClassifier(BTreeSet<String>);

impl OriginClassifier for FixedClassifier {
    fn is_locally_originated(&self, package: &str) -> bool {
        self.0.contains(package)
    }
}

#[test]
fn test_rescan_skips_bogus_archive_and_reports_virtual() {
    let dir = tempdir().unwrap();
    write_archive(dir.path(), "foo_1.0_amd64.deb", "foo", "utils");
    fs::write(dir.path().join("bogus.deb"), b"").unwrap();

    let config = test_config();
    let (tx, rx) = mpsc::channel();
    let catalog = LocalCatalog::new(&config, tx);
    catalog.set_folders(vec![dir.path().to_path_buf()]).unwrap();
    assert_eq!(wait_for_scan(&rx), 1);

    let records = catalog.records();
    assert_eq!(records.keys().collect::<Vec<_>>(), vec!["foo"]);
    let foo = &records["foo"];
    assert_eq!(foo.depends, vec!["libc6 (>= 2.34)", "libfoo1"]);
    assert_eq!(foo.origin, "local");

    let db = MemoryDatabase::new(vec![RepoPackage::new("bash", "amd64")]);
    let virtuals = catalog.virtual_packages(&db);
    assert_eq!(virtuals.len(), 1);
    assert_eq!(virtuals[0].name(), "foo");
    assert!(virtuals[0].is_virtual());
    assert!(!virtuals[0].is_installed());
    assert_eq!(virtuals[0].installed_size(), 120 * 1024);

    let db = MemoryDatabase::new(vec![RepoPackage::new("foo", "amd64")]);
    assert!(catalog.virtual_packages(&db).is_empty());
}

#[test]
fn test_parse_is_idempotent_and_requires_package_field() {
    let dir = tempdir().unwrap();
    let path = write_archive(dir.path(), "foo_1.0_amd64.deb", "foo", "utils");
    let parser = ArchiveParser::from_config(&test_config());
    assert_eq!(parser.parse(&path).unwrap(), parser.parse(&path).unwrap());

    let nameless = dir.path().join("nameless.deb");
    fs::write(&nameless, " Version: 1.0\n Architecture: all\n").unwrap();
    assert!(matches!(
        parser.parse(&nameless).unwrap_err(),
        Error::UnparseableOutput(_)
    ));
}

#[test]
fn test_policy_report_without_uri_is_local() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("bar.policy"),
        "bar:
  Installed: 2.1
  Candidate: 2.1
  Version table:
 *** 2.1 100
        100 /var/lib/dpkg/status
",
    )
    .unwrap();
    fs::write(
        dir.path().join("vim.policy"),
        "vim:\n  Installed: (none)\n  Candidate: 9.1\n  Version table:\n     9.1 500\n        500 http://archive.ubuntu.com/ubuntu noble/main amd64 Packages\n",
    )
    .unwrap();
    fs::write(dir.path().join("odd.policy"), "odd:\n  Installed: 1.0\n").unwrap();

    let script = format!("cat '{}'/\"$2\".policy", dir.path().display());
    let config = Config {
        policy_tool: ToolCommand::with_args("sh", ["-c".to_string(), script, "sh".to_string()]),
        ..test_config()
    };
    let classifier = PolicyClassifier::from_config(&config);
    assert!(classifier.is_locally_originated("bar"));
    assert!(!classifier.is_locally_originated("vim"));
    assert!(!classifier.is_locally_originated("odd"));
    assert!(!classifier.is_locally_originated("missing"));

    let (tx, _rx) = mpsc::channel();
    let catalog = LocalCatalog::new(&config, tx);
    assert!(catalog.classify("bar"));
    assert!(catalog.is_locally_installed("bar"));
}

fn large_catalog() -> (CompositeCatalog, CatalogView, MemoryDatabase) {
    let packages: Vec<RepoPackage> = (0..1000)
        .map(|i| RepoPackage {
            section: if i % 4 == 0 { "Graphics" } else { "utils" }.to_string(),
            state: PackageState::NOT_INSTALLED,
            ..RepoPackage::new(format!("pkg{:04}", i), "amd64")
        })
        .collect();
    let db = MemoryDatabase::new(packages.clone());

    let virtuals: Vec<VirtualPackage> = (0..5)
        .map(|i| {
            VirtualPackage::new(LocalPackageRecord {
                name: format!("local{}", i),
                version: "1.0".to_string(),
                section: Some(if i == 2 { "Graphics" } else { "utils" }.to_string()),
                origin: "local".to_string(),
                ..Default::default()
            })
        })
        .collect();

    let (tx, _rx) = mpsc::channel();
    let origins: Arc<dyn LocalOrigins> = Arc::new(LocalCatalog::new(&test_config(), tx));
    let mut catalog = CompositeCatalog::new(Arc::clone(&origins), Arc::new(GenericIcons));
    catalog.set_packages(packages);
    catalog.set_virtual_packages(virtuals);
    let view = CatalogView::new(origins, &test_config());
    (catalog, view, db)
}

#[test]
fn test_group_filter_excludes_unmatched_virtual_packages() {
    let (catalog, mut view, _db) = large_catalog();
    assert_eq!(view.rows(&catalog).len(), 1005);

    view.set_group_filter("Graphics");
    let rows = view.rows(&catalog);
    assert_eq!(rows.len(), 251);
    let virtual_rows: Vec<usize> = rows
        .into_iter()
        .filter(|&row| matches!(catalog.locate(row), Some(RowRef::Virtual(_))))
        .collect();
    assert_eq!(virtual_rows.len(), 1);
    assert_eq!(catalog.virtual_package(virtual_rows[0]).unwrap().name(), "local2");
}

#[test]
fn test_single_character_search_reverts_view() {
    let (catalog, mut view, db) = large_catalog();
    view.search("pkg00", &db, &catalog);
    assert!(view.is_sorted_by_relevance());
    assert_eq!(view.rows(&catalog).len(), 100);

    view.search("p", &db, &catalog);
    assert!(!view.is_searching());
    assert!(!view.is_sorted_by_relevance());
    assert_eq!(view.rows(&catalog).len(), 1005);
}

#[test]
fn test_local_origin_filter_asymmetry() {
    let dir = tempdir().unwrap();
    write_archive(dir.path(), "foo_1.0_amd64.deb", "foo", "utils");
    write_archive(dir.path(), "gimp_2.10_amd64.deb", "gimp", "graphics");

    let config = test_config();
    let (tx, rx) = mpsc::channel();
    let store = Arc::new(LocalCatalog::with_services(
        &config,
        ArchiveParser::from_config(&config),
        Arc::new(FixedClassifier(["mytool".to_string()].into_iter().collect())),
        tx,
    ));
    store.set_folders(vec![dir.path().to_path_buf()]).unwrap();
    assert_eq!(wait_for_scan(&rx), 2);
    assert!(store.classify("mytool"));

    let packages = vec![
        RepoPackage::new("bash", "amd64"),
        RepoPackage::new("gimp", "amd64"),
        RepoPackage::new("mytool", "amd64"),
    ];
    let db = MemoryDatabase::new(packages.clone());
    let origins: Arc<dyn LocalOrigins> = store.clone();
    let mut catalog = CompositeCatalog::new(Arc::clone(&origins), Arc::new(GenericIcons));
    catalog.set_packages(packages);
    catalog.set_virtual_packages(store.virtual_packages(&db));
    catalog.set_sandbox_packages(vec![SandboxApp {
        id: "org.a.App".to_string(),
        ..Default::default()
    }]);

    let mut view = CatalogView::new(origins, &config);
    view.set_origin_filter("local");
    let accepted: Vec<usize> = (0..catalog.row_count())
        .filter(|&row| view.accepts_row(&catalog, row))
        .collect();
    // gimp has an archive on disk, mytool was installed from one, foo is virtual
    assert_eq!(accepted, vec![1, 2, 3]);
    assert_eq!(catalog.virtual_package(3).unwrap().name(), "foo");
}

#[test]
fn test_row_space_partition_and_out_of_range() {
    let (mut catalog, _view, _db) = large_catalog();
    catalog.set_sandbox_packages(vec![SandboxApp {
        id: "org.a.App".to_string(),
        ..Default::default()
    }]);
    let (r, v, f) = (1000, 5, 1);
    assert_eq!(catalog.row_count(), r + v + f);

    for row in 0..catalog.row_count() {
        let in_repository = row < r;
        let in_virtual = (r..r + v).contains(&row);
        let in_sandbox = (r + v..r + v + f).contains(&row);
        assert_eq!([in_repository, in_virtual, in_sandbox].iter().filter(|&&b| b).count(), 1);
        let expected = if in_repository {
            RowRef::Repository(row)
        } else if in_virtual {
            RowRef::Virtual(row - r)
        } else {
            RowRef::Sandbox(row - r - v)
        };
        assert_eq!(catalog.locate(row), Some(expected));
    }

    for role in Role::ALL {
        assert!(catalog.attribute_at(r + v + f, role).is_none());
        assert!(catalog.attribute_at(r + v + f + 100, role).is_none());
    }
}

#[test]
fn test_open_archive_outside_folders() {
    let dir = tempdir().unwrap();
    let path = write_archive(dir.path(), "tool_1.0_amd64.deb", "tool", "utils");

    let config = test_config();
    let (tx, rx) = mpsc::channel();
    let catalog = LocalCatalog::new(&config, tx);
    let record = catalog.open_archive(&path).unwrap();
    assert_eq!(record.name, "tool");
    assert_eq!(catalog.archive_paths(), vec![record.path.clone()]);
    assert_eq!(rx.try_recv().unwrap(), CatalogEvent::LocalPackagesChanged);

    assert!(matches!(
        catalog.open_archive(&dir.path().join("gone.deb")).unwrap_err(),
        Error::NotReadable { .. }
    ));
}
