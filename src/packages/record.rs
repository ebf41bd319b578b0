// src/packages/record.rs

//! Local package record
//!
//! One standalone archive found on disk (or opened explicitly), as described
//! by its control block.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Origin tag carried by every record produced from an archive
pub const LOCAL_ORIGIN: &str = "local";

/// Control metadata of one local archive
///
/// `name` is the store key; a record with an empty name is never kept.
/// Sizes stay as the decimal strings the inspector printed and are parsed
/// on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPackageRecord {
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub maintainer: Option<String>,
    /// Short description, then a line break, then the long description
    pub description: Option<String>,
    pub section: Option<String>,
    pub depends: Vec<String>,
    pub pre_depends: Vec<String>,
    pub recommends: Vec<String>,
    pub suggests: Vec<String>,
    pub enhances: Vec<String>,
    pub conflicts: Vec<String>,
    pub breaks: Vec<String>,
    pub provides: Vec<String>,
    pub replaces: Vec<String>,
    /// Kibibytes
    pub installed_size: Option<String>,
    /// Bytes
    pub download_size: Option<String>,
    pub homepage: Option<String>,
    pub priority: Option<String>,
    pub standards_version: Option<String>,
    pub source: Option<String>,
    pub origin: String,
    /// Absolute path of the archive this record was parsed from
    pub path: PathBuf,
}

impl LocalPackageRecord {
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}
