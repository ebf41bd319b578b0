// src/origin/policy.rs

//! Policy-report classifier
//!
//! Decides whether the installed version of a package came from a configured
//! repository by reading `apt-cache policy <name>`:
//!
//! ```text
//! mypackage:
//!   Installed: 1.0-local
//!   Candidate: 1.0-local
//!   Version table:
//!  *** 1.0-local 100
//!         100 /var/lib/dpkg/status
//!      0.9-repo 500
//!         500 http://archive.ubuntu.com/ubuntu noble/main amd64 Packages
//! ```
//!
//! The table lists every known version with its sources, so only the block
//! of the installed version (`***` entry) is inspected for a URI. Version
//! entries are indented by fewer than six columns, their source lines by
//! eight; that width is what separates one block from the next.
//!
//! This reads human-oriented output and depends on its layout. Callers only
//! see [`OriginClassifier`], so it can be swapped for a structured query.

use crate::config::{Config, ToolCommand};
use crate::error::{Error, Result};
use crate::process::{Limits, run_tool};
use tracing::debug;

/// Value of `Installed:` when nothing is installed
pub const NO_VERSION: &str = "(none)";

const INSTALLED_FIELD: &str = "Installed:";
const VERSION_TABLE: &str = "Version table:";
const INSTALLED_ENTRY: &str = "***";
const URI_MARKER: &str = "://";
const SOURCE_INDENT: &str = "      ";

/// Where the installed version of a package comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOrigin {
    NotInstalled,
    /// At least one repository source carries the installed version
    Repository,
    /// Only local sources (typically the dpkg status file) carry it
    Local,
}

/// Answers "was this package installed from a local file?"
pub trait OriginClassifier: Send + Sync {
    /// `false` whenever the answer cannot be determined
    fn is_locally_originated(&self, package: &str) -> bool;
}

/// Classify a policy report
///
/// # Errors
///
/// `AmbiguousClassification` if the report has no version table, or the
/// table has no `***` entry for the installed version.
pub fn classify_report(report: &str) -> Result<InstallOrigin> {
    let installed = report
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(INSTALLED_FIELD))
        .map(str::trim)
        .unwrap_or_default();

    if installed.is_empty() || installed == NO_VERSION {
        return Ok(InstallOrigin::NotInstalled);
    }

    let mut in_table = false;
    let mut found_block = false;
    let mut in_installed_block = false;
    let mut has_repo_source = false;

    for line in report.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(VERSION_TABLE) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }

        if trimmed.starts_with(INSTALLED_ENTRY) {
            let mut parts = trimmed.split_whitespace().skip(1);
            in_installed_block = parts.next() == Some(installed);
            if in_installed_block {
                found_block = true;
                continue;
            }
        } else if !line.starts_with(SOURCE_INDENT) {
            in_installed_block = false;
        }

        if in_installed_block && line.contains(URI_MARKER) {
            has_repo_source = true;
            break;
        }
    }

    if !in_table {
        return Err(Error::AmbiguousClassification("no version table".to_string()));
    }
    if !found_block {
        return Err(Error::AmbiguousClassification(format!(
            "no table entry for installed version {}",
            installed
        )));
    }

    Ok(if has_repo_source {
        InstallOrigin::Repository
    } else {
        InstallOrigin::Local
    })
}

/// Runs `<tool> policy <name>` and classifies the report
pub struct PolicyClassifier {
    tool: ToolCommand,
    limits: Limits,
}

impl PolicyClassifier {
    pub fn new(tool: ToolCommand, limits: Limits) -> Self {
        Self { tool, limits }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.policy_tool.clone(),
            Limits::new(config.policy_timeout(), config.termination_grace()),
        )
    }

    pub fn origin_of(&self, package: &str) -> Result<InstallOrigin> {
        if package.is_empty() || package.starts_with('-') {
            return Err(Error::UnparseableOutput(format!(
                "invalid package name '{}'",
                package
            )));
        }
        let output = run_tool(&self.tool, ["policy", package], self.limits)?;
        classify_report(&output.stdout)
    }
}

impl OriginClassifier for PolicyClassifier {
    fn is_locally_originated(&self, package: &str) -> bool {
        match self.origin_of(package) {
            Ok(origin) => {
                debug!("{}: installed origin {:?}", package, origin);
                origin == InstallOrigin::Local
            }
            Err(e) => {
                debug!("{}: cannot classify origin: {}", package, e);
                false
            }
        }
    }
}
