// src/packages/mod.rs

//! Local archive support
//!
//! Parsing standalone `.deb` archives into [`LocalPackageRecord`]s and
//! presenting the ones without a repository counterpart as
//! [`VirtualPackage`]s.

pub mod archive;
pub mod control;
pub mod deb;
pub mod record;
pub mod virtual_package;

pub use archive::{ArchiveInspector, ArchiveParser, DpkgDebInspector};
pub use deb::NativeDebInspector;
pub use record::{LOCAL_ORIGIN, LocalPackageRecord};
pub use virtual_package::VirtualPackage;
