// src/model/repository.rs

//! Repository package database interface
//!
//! The distribution's package database is an external provider. The catalog
//! only needs a snapshot of each package's display and state data, a
//! name lookup, and a relevance-ordered search.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Package state bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageState(u32);

impl PackageState {
    pub const EMPTY: PackageState = PackageState(0);
    pub const TO_KEEP: PackageState = PackageState(1 << 0);
    pub const TO_INSTALL: PackageState = PackageState(1 << 1);
    pub const NEW_INSTALL: PackageState = PackageState(1 << 2);
    pub const TO_REINSTALL: PackageState = PackageState(1 << 3);
    pub const TO_UPGRADE: PackageState = PackageState(1 << 4);
    pub const TO_DOWNGRADE: PackageState = PackageState(1 << 5);
    pub const TO_REMOVE: PackageState = PackageState(1 << 6);
    pub const HELD: PackageState = PackageState(1 << 7);
    pub const INSTALLED: PackageState = PackageState(1 << 8);
    pub const UPGRADEABLE: PackageState = PackageState(1 << 9);
    pub const NOW_BROKEN: PackageState = PackageState(1 << 10);
    pub const INSTALL_BROKEN: PackageState = PackageState(1 << 11);
    pub const ORPHANED: PackageState = PackageState(1 << 12);
    pub const PINNED: PackageState = PackageState(1 << 13);
    pub const NEW: PackageState = PackageState(1 << 14);
    pub const RESIDUAL_CONFIG: PackageState = PackageState(1 << 15);
    pub const NOT_DOWNLOADABLE: PackageState = PackageState(1 << 16);
    pub const TO_PURGE: PackageState = PackageState(1 << 17);
    pub const IS_AUTO: PackageState = PackageState(1 << 20);
    pub const IS_GARBAGE: PackageState = PackageState(1 << 21);
    pub const NOT_INSTALLED: PackageState = PackageState(1 << 24);

    /// Bits the status column sorts on
    pub const STATUS_SORT_MASK: PackageState = PackageState(
        Self::INSTALLED.0 | Self::UPGRADEABLE.0 | Self::NOW_BROKEN.0 | Self::NEW.0,
    );

    /// Bits the requested-action column sorts on
    pub const REQUESTED_SORT_MASK: PackageState = PackageState(
        Self::TO_INSTALL.0
            | Self::TO_UPGRADE.0
            | Self::TO_REMOVE.0
            | Self::TO_PURGE.0
            | Self::TO_REINSTALL.0
            | Self::TO_DOWNGRADE.0
            | Self::TO_KEEP.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(self, other: PackageState) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: PackageState) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PackageState {
    type Output = PackageState;

    fn bitor(self, rhs: Self) -> Self::Output {
        PackageState(self.0 | rhs.0)
    }
}

impl BitOrAssign for PackageState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PackageState {
    type Output = PackageState;

    fn bitand(self, rhs: Self) -> Self::Output {
        PackageState(self.0 & rhs.0)
    }
}

/// Snapshot of one repository package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPackage {
    pub name: String,
    pub architecture: String,
    /// Architecture differs from the native one
    pub foreign_arch: bool,
    pub state: PackageState,
    pub section: String,
    pub origin: String,
    pub installed_version: String,
    pub available_version: String,
    /// Bytes, -1 when unknown
    pub installed_size: i64,
    pub short_description: String,
    pub long_description: String,
    pub maintainer: String,
    pub supported: bool,
    /// Foreign-arch package also available natively
    pub multi_arch_duplicate: bool,
}

impl RepoPackage {
    pub fn new(name: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            architecture: architecture.into(),
            installed_size: -1,
            ..Default::default()
        }
    }

    /// Identity within the database: `name`, or `name:arch` for foreign packages
    pub fn key(&self) -> String {
        if self.foreign_arch {
            format!("{}:{}", self.name, self.architecture)
        } else {
            self.name.clone()
        }
    }
}

/// Read access to the repository package database
pub trait PackageDatabase: Send + Sync {
    /// Whether any package with this name exists
    fn contains(&self, name: &str) -> bool;

    /// Every package, in database order
    fn packages(&self) -> Vec<RepoPackage>;

    /// Keys of packages matching `text`, most relevant first
    fn search(&self, text: &str) -> Vec<String>;
}

/// Database held in memory
///
/// Search ranks exact name matches first, then name prefixes, then names
/// containing the text.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    packages: Vec<RepoPackage>,
    by_name: HashMap<String, usize>,
}

impl MemoryDatabase {
    pub fn new(packages: Vec<RepoPackage>) -> Self {
        let by_name = packages
            .iter()
            .enumerate()
            .map(|(index, package)| (package.name.clone(), index))
            .collect();
        Self { packages, by_name }
    }
}

impl PackageDatabase for MemoryDatabase {
    fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    fn packages(&self) -> Vec<RepoPackage> {
        self.packages.clone()
    }

    fn search(&self, text: &str) -> Vec<String> {
        let needle = text.to_lowercase();
        let mut ranked: Vec<(u8, &RepoPackage)> = self
            .packages
            .iter()
            .filter_map(|package| {
                let name = package.name.to_lowercase();
                if name == needle {
                    Some((0, package))
                } else if name.starts_with(&needle) {
                    Some((1, package))
                } else if name.contains(&needle) {
                    Some((2, package))
                } else {
                    None
                }
            })
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        ranked.into_iter().map(|(_, package)| package.key()).collect()
    }
}
