// src/model/mod.rs

//! Catalog model
//!
//! One row space over repository packages, virtual packages and sandboxed
//! applications ([`CompositeCatalog`]), and a filtered, sorted projection of
//! it ([`CatalogView`]).

pub mod composite;
pub mod repository;
pub mod view;

pub use composite::{CatalogObserver, CompositeCatalog, RowChange, RowRef};
pub use repository::{MemoryDatabase, PackageDatabase, PackageState, RepoPackage};
pub use view::{CatalogView, SortColumn, SortOrder};

use crate::catalog::{LocalCatalog, LocalFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Attribute selector for [`CompositeCatalog::attribute_at`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Name,
    Icon,
    Description,
    Status,
    Action,
    Support,
    InstalledSize,
    InstalledSizeDisplay,
    InstalledVersion,
    AvailableVersion,
    IsLocal,
    ToolTip,
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::Name,
        Role::Icon,
        Role::Description,
        Role::Status,
        Role::Action,
        Role::Support,
        Role::InstalledSize,
        Role::InstalledSizeDisplay,
        Role::InstalledVersion,
        Role::AvailableVersion,
        Role::IsLocal,
        Role::ToolTip,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RoleValue {
    Text(String),
    Integer(i64),
    State(PackageState),
    Flag(bool),
    Icon(IconRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IconRef {
    /// Name looked up in the desktop icon theme
    Themed(String),
    File(PathBuf),
}

/// Display-icon lookup, provided by the presentation layer
pub trait IconResolver: Send + Sync {
    fn package_icon(&self, package: &RepoPackage) -> IconRef;

    fn has_theme_icon(&self, name: &str) -> bool;

    /// Icon file extracted from a local archive, if it ships one
    fn archive_icon(&self, _archive: &Path) -> Option<PathBuf> {
        None
    }
}

/// Resolver used when no icon theme is available
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericIcons;

impl IconResolver for GenericIcons {
    fn package_icon(&self, _package: &RepoPackage) -> IconRef {
        IconRef::Themed("package-x-generic".to_string())
    }

    fn has_theme_icon(&self, _name: &str) -> bool {
        false
    }
}

/// Local-origin lookups the model needs from the catalog store
pub trait LocalOrigins: Send + Sync {
    fn local_flags(&self, name: &str) -> LocalFlags;
}

impl LocalOrigins for LocalCatalog {
    fn local_flags(&self, name: &str) -> LocalFlags {
        LocalCatalog::local_flags(self, name)
    }
}

/// Format a byte count with binary units, e.g. `1.5 MiB`
pub fn format_byte_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
