// src/origin/mod.rs

//! Install-origin detection
//!
//! Classifies installed packages as repository-backed or installed from a
//! local file, either one name at a time from the policy report or in bulk
//! from the installed-package listing.

pub mod listing;
pub mod policy;

pub use listing::{ListingScan, parse_listing};
pub use policy::{InstallOrigin, OriginClassifier, PolicyClassifier, classify_report};
