// src/model/composite.rs

//! Composite catalog
//!
//! A single row space over three sources, in this order:
//!
//! ```text
//! [0, R)          repository packages
//! [R, R+V)        virtual packages
//! [R+V, R+V+F)    sandboxed applications
//! ```
//!
//! Rows are kept as a tagged index ([`RowRef`]) rebuilt on every mutation,
//! so range arithmetic lives only here. Every mutation is bracketed by
//! observer notifications covering exactly the affected rows.

use crate::model::repository::{PackageState, RepoPackage};
use crate::model::{IconRef, IconResolver, LocalOrigins, Role, RoleValue, format_byte_size};
use crate::packages::VirtualPackage;
use crate::sandbox::SandboxApp;
use std::sync::Arc;
use tracing::debug;

const VIRTUAL_ICON: &str = "package-x-generic";
const SANDBOX_ICON: &str = "application-x-executable";

/// Which source a row belongs to, and its index there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowRef {
    Repository(usize),
    Virtual(usize),
    Sandbox(usize),
}

/// Row-space change, announced before and after it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Reset,
    /// Rows `first..=last` are inserted
    Insert { first: usize, last: usize },
    /// Rows `first..=last` are removed
    Remove { first: usize, last: usize },
    /// Attribute values of rows `first..=last` changed
    DataChanged { first: usize, last: usize },
}

/// Receives row-space notifications
pub trait CatalogObserver: Send + Sync {
    fn about_to_change(&self, _change: &RowChange) {}

    /// Called once the change is applied; `row_count` is the new count
    fn changed(&self, change: &RowChange, row_count: usize);
}

pub struct CompositeCatalog {
    packages: Vec<RepoPackage>,
    virtuals: Vec<VirtualPackage>,
    sandbox: Vec<SandboxApp>,
    rows: Vec<RowRef>,
    origins: Arc<dyn LocalOrigins>,
    icons: Arc<dyn IconResolver>,
    observers: Vec<Arc<dyn CatalogObserver>>,
}

impl CompositeCatalog {
    pub fn new(origins: Arc<dyn LocalOrigins>, icons: Arc<dyn IconResolver>) -> Self {
        Self {
            packages: Vec::new(),
            virtuals: Vec::new(),
            sandbox: Vec::new(),
            rows: Vec::new(),
            origins,
            icons,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Arc<dyn CatalogObserver>) {
        self.observers.push(observer);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn locate(&self, row: usize) -> Option<RowRef> {
        self.rows.get(row).copied()
    }

    pub fn packages(&self) -> &[RepoPackage] {
        &self.packages
    }

    pub fn virtual_packages(&self) -> &[VirtualPackage] {
        &self.virtuals
    }

    pub fn sandbox_apps(&self) -> &[SandboxApp] {
        &self.sandbox
    }

    pub fn repository_package(&self, row: usize) -> Option<&RepoPackage> {
        match self.locate(row)? {
            RowRef::Repository(index) => self.packages.get(index),
            _ => None,
        }
    }

    pub fn virtual_package(&self, row: usize) -> Option<&VirtualPackage> {
        match self.locate(row)? {
            RowRef::Virtual(index) => self.virtuals.get(index),
            _ => None,
        }
    }

    pub fn sandbox_app(&self, row: usize) -> Option<&SandboxApp> {
        match self.locate(row)? {
            RowRef::Sandbox(index) => self.sandbox.get(index),
            _ => None,
        }
    }

    pub fn set_packages(&mut self, packages: Vec<RepoPackage>) {
        self.apply(RowChange::Reset, |catalog| catalog.packages = packages);
    }

    pub fn set_virtual_packages(&mut self, packages: Vec<VirtualPackage>) {
        let packages = self.with_archive_icons(packages);
        self.apply(RowChange::Reset, |catalog| catalog.virtuals = packages);
    }

    /// Append virtual packages after the existing ones
    pub fn add_virtual_packages(&mut self, packages: Vec<VirtualPackage>) {
        if packages.is_empty() {
            return;
        }
        let first = self.packages.len() + self.virtuals.len();
        let last = first + packages.len() - 1;
        let packages = self.with_archive_icons(packages);
        self.apply(RowChange::Insert { first, last }, |catalog| {
            catalog.virtuals.extend(packages)
        });
    }

    pub fn clear_virtual_packages(&mut self) {
        if self.virtuals.is_empty() {
            return;
        }
        let first = self.packages.len();
        let last = first + self.virtuals.len() - 1;
        self.apply(RowChange::Remove { first, last }, |catalog| {
            catalog.virtuals.clear()
        });
    }

    pub fn set_sandbox_packages(&mut self, apps: Vec<SandboxApp>) {
        self.apply(RowChange::Reset, |catalog| catalog.sandbox = apps);
    }

    /// Remove every row from all three sources
    pub fn clear(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        self.apply(RowChange::Remove { first: 0, last }, |catalog| {
            catalog.packages.clear();
            catalog.virtuals.clear();
            catalog.sandbox.clear();
        });
    }

    /// Announce that attribute values may have changed for all rows
    ///
    /// Used when the local-origin sets or the icon theme change underneath.
    pub fn external_data_changed(&self) {
        if self.rows.is_empty() {
            return;
        }
        let change = RowChange::DataChanged {
            first: 0,
            last: self.rows.len() - 1,
        };
        for observer in &self.observers {
            observer.about_to_change(&change);
        }
        for observer in &self.observers {
            observer.changed(&change, self.rows.len());
        }
    }

    fn with_archive_icons(&self, packages: Vec<VirtualPackage>) -> Vec<VirtualPackage> {
        packages
            .into_iter()
            .map(|package| {
                if package.icon_path().is_some() {
                    return package;
                }
                match self.icons.archive_icon(package.path()) {
                    Some(icon) => package.with_icon_path(icon),
                    None => package,
                }
            })
            .collect()
    }

    fn apply(&mut self, change: RowChange, mutate: impl FnOnce(&mut Self)) {
        for observer in &self.observers {
            observer.about_to_change(&change);
        }
        mutate(self);
        self.rebuild_rows();
        debug!(
            "Catalog {:?}: {} repository, {} virtual, {} sandboxed",
            change,
            self.packages.len(),
            self.virtuals.len(),
            self.sandbox.len()
        );
        for observer in &self.observers {
            observer.changed(&change, self.rows.len());
        }
    }

    fn rebuild_rows(&mut self) {
        self.rows = (0..self.packages.len())
            .map(RowRef::Repository)
            .chain((0..self.virtuals.len()).map(RowRef::Virtual))
            .chain((0..self.sandbox.len()).map(RowRef::Sandbox))
            .collect();
    }

    /// Value of `role` for `row`; `None` for out-of-range rows and for roles
    /// a source has no value for
    pub fn attribute_at(&self, row: usize, role: Role) -> Option<RoleValue> {
        match self.locate(row)? {
            RowRef::Repository(index) => self.repository_attribute(self.packages.get(index)?, role),
            RowRef::Virtual(index) => virtual_attribute(self.virtuals.get(index)?, role),
            RowRef::Sandbox(index) => self.sandbox_attribute(self.sandbox.get(index)?, role),
        }
    }

    fn repository_attribute(&self, package: &RepoPackage, role: Role) -> Option<RoleValue> {
        let value = match role {
            Role::Name if package.foreign_arch => {
                RoleValue::Text(format!("{} ({})", package.name, package.architecture))
            }
            Role::Name => RoleValue::Text(package.name.clone()),
            Role::Icon => RoleValue::Icon(self.icons.package_icon(package)),
            Role::Description => RoleValue::Text(package.short_description.clone()),
            Role::Status | Role::Action => RoleValue::State(package.state),
            Role::Support => RoleValue::Flag(package.supported),
            Role::InstalledSize => RoleValue::Integer(package.installed_size),
            Role::InstalledSizeDisplay => size_display(package.installed_size)?,
            Role::InstalledVersion => RoleValue::Text(package.installed_version.clone()),
            Role::AvailableVersion => RoleValue::Text(package.available_version.clone()),
            Role::IsLocal => {
                RoleValue::Flag(self.origins.local_flags(&package.name).locally_installed)
            }
            Role::ToolTip => return None,
        };
        Some(value)
    }

    fn sandbox_attribute(&self, app: &SandboxApp, role: Role) -> Option<RoleValue> {
        let value = match role {
            Role::Name => RoleValue::Text(app.display_name().to_string()),
            Role::Icon if self.icons.has_theme_icon(&app.id) => {
                RoleValue::Icon(IconRef::Themed(app.id.clone()))
            }
            Role::Icon => RoleValue::Icon(IconRef::Themed(SANDBOX_ICON.to_string())),
            Role::Description => RoleValue::Text(app.description.clone()),
            Role::Status | Role::Action => RoleValue::State(PackageState::INSTALLED),
            Role::Support => RoleValue::Flag(true),
            Role::InstalledSize => RoleValue::Integer(0),
            Role::InstalledSizeDisplay => return None,
            Role::InstalledVersion | Role::AvailableVersion => RoleValue::Text(app.version.clone()),
            Role::IsLocal => RoleValue::Flag(false),
            Role::ToolTip => RoleValue::Text(format!("Flatpak: {}", app.id)),
        };
        Some(value)
    }
}

fn virtual_attribute(package: &VirtualPackage, role: Role) -> Option<RoleValue> {
    let value = match role {
        Role::Name => RoleValue::Text(package.name().to_string()),
        Role::Icon => RoleValue::Icon(match package.icon_path() {
            Some(icon) => IconRef::File(icon.to_path_buf()),
            None => IconRef::Themed(VIRTUAL_ICON.to_string()),
        }),
        Role::Description => RoleValue::Text(package.short_description().to_string()),
        Role::Status | Role::Action => RoleValue::State(PackageState::EMPTY),
        Role::Support => RoleValue::Flag(false),
        Role::InstalledSize => RoleValue::Integer(package.installed_size()),
        Role::InstalledSizeDisplay => size_display(package.installed_size())?,
        Role::InstalledVersion => RoleValue::Text(package.installed_version().to_string()),
        Role::AvailableVersion => RoleValue::Text(package.available_version().to_string()),
        Role::IsLocal => RoleValue::Flag(true),
        Role::ToolTip => {
            RoleValue::Text(format!("Local package: {}", package.path().display()))
        }
    };
    Some(value)
}

fn size_display(size: i64) -> Option<RoleValue> {
    (size != -1).then(|| RoleValue::Text(format_byte_size(size)))
}
