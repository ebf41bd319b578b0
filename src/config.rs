// src/config.rs

//! Catalog configuration
//!
//! Everything the catalog needs from its environment: which folders to scan,
//! which external tools to run and how long to wait for them, and the view
//! behaviour toggles. Loaded from a JSON file; every field has a default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// An external program plus leading arguments
///
/// Operation-specific arguments are appended after `args`, so a tool can be
/// wrapped (for example run through `sh -c`) purely from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folders scanned for standalone archives
    pub folders: Vec<PathBuf>,
    /// File extension of archives, without the dot
    pub archive_extension: String,
    /// Invoked as `<tool> --info <path>`
    pub archive_tool: ToolCommand,
    /// Invoked as `<tool> policy <name>`
    pub policy_tool: ToolCommand,
    /// Lists installed packages, one per line
    pub listing_tool: ToolCommand,
    /// Invoked as `<tool> list --app --columns=...`
    pub sandbox_tool: ToolCommand,
    pub archive_timeout_secs: u64,
    pub policy_timeout_secs: u64,
    pub listing_timeout_secs: u64,
    pub sandbox_timeout_secs: u64,
    /// Wait between the polite termination request and the kill
    pub termination_grace_ms: u64,
    /// Read the control member directly when the archive tool cannot be started
    pub native_archive_fallback: bool,
    pub show_multi_arch_dupes: bool,
    /// Substring scan when the relevance search finds nothing
    pub use_slow_search: bool,
    pub watch_folders: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            archive_extension: "deb".to_string(),
            archive_tool: ToolCommand::new("dpkg-deb"),
            policy_tool: ToolCommand::new("apt-cache"),
            listing_tool: ToolCommand::with_args(
                "apt",
                ["list", "--installed", "-o", "APT::Color::Mode=never"],
            ),
            sandbox_tool: ToolCommand::new("flatpak"),
            archive_timeout_secs: 30,
            policy_timeout_secs: 10,
            listing_timeout_secs: 60,
            sandbox_timeout_secs: 60,
            termination_grace_ms: 1000,
            native_archive_fallback: false,
            show_multi_arch_dupes: false,
            use_slow_search: false,
            watch_folders: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| Error::NotReadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.archive_extension.is_empty() || self.archive_extension.starts_with('.') {
            return Err(Error::Config(format!(
                "archive_extension must be a bare extension, got '{}'",
                self.archive_extension
            )));
        }
        for tool in [
            &self.archive_tool,
            &self.policy_tool,
            &self.listing_tool,
            &self.sandbox_tool,
        ] {
            if tool.program.trim().is_empty() {
                return Err(Error::Config("tool program must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn policy_timeout(&self) -> Duration {
        Duration::from_secs(self.policy_timeout_secs)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox_timeout_secs)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}
