// src/lib.rs

//! Kydra package catalog
//!
//! Reconciles three package inventories into one catalog: the distribution's
//! repository database, standalone `.deb` archives found in local folders,
//! and installed Flatpak applications. Also tells which installed packages
//! came from a local file rather than a configured repository.
//!
//! # Architecture
//!
//! - Archives are read through an external inspector (`dpkg-deb --info`)
//!   into [`packages::LocalPackageRecord`]s
//! - [`catalog::LocalCatalog`] keeps archive records and locally installed
//!   names, rebuilt by background tasks that report on a channel
//! - Archives with no repository counterpart become
//!   [`packages::VirtualPackage`]s
//! - [`model::CompositeCatalog`] addresses all three sources as one row
//!   space; [`model::CatalogView`] filters and sorts it
//! - External tools run with a bounded wait and a normalized locale

pub mod catalog;
pub mod config;
mod error;
pub mod model;
pub mod origin;
pub mod packages;
pub mod process;
pub mod sandbox;
pub mod version;

pub use error::{Error, Result};
