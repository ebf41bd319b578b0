// src/packages/archive.rs

//! Archive parser
//!
//! Turns a path to a standalone archive into a [`LocalPackageRecord`]. The
//! control text comes from an [`ArchiveInspector`]; by default that is the
//! system's `dpkg-deb --info`, with the built-in reader as an optional
//! fallback when the tool cannot be started.

use crate::config::{Config, ToolCommand};
use crate::error::{Error, Result};
use crate::packages::control::parse_control;
use crate::packages::deb::NativeDebInspector;
use crate::packages::record::LocalPackageRecord;
use crate::process::{Limits, run_tool};
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Source of the textual control block of an archive
pub trait ArchiveInspector: Send + Sync {
    /// Return the control block for the archive at `path`
    fn control_block(&self, path: &Path) -> Result<String>;
}

/// Runs `<tool> --info <path>`
pub struct DpkgDebInspector {
    tool: ToolCommand,
    limits: Limits,
}

impl DpkgDebInspector {
    pub fn new(tool: ToolCommand, limits: Limits) -> Self {
        Self { tool, limits }
    }
}

impl ArchiveInspector for DpkgDebInspector {
    fn control_block(&self, path: &Path) -> Result<String> {
        let output = run_tool(
            &self.tool,
            [OsStr::new("--info"), path.as_os_str()],
            self.limits,
        )?;
        Ok(output.stdout)
    }
}

pub struct ArchiveParser {
    inspector: Box<dyn ArchiveInspector>,
    fallback: Option<Box<dyn ArchiveInspector>>,
}

impl ArchiveParser {
    pub fn new(inspector: Box<dyn ArchiveInspector>) -> Self {
        Self {
            inspector,
            fallback: None,
        }
    }

    /// Inspector used when the primary one cannot be started
    pub fn with_fallback(mut self, fallback: Box<dyn ArchiveInspector>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let inspector = DpkgDebInspector::new(
            config.archive_tool.clone(),
            Limits::new(config.archive_timeout(), config.termination_grace()),
        );
        let parser = Self::new(Box::new(inspector));
        if config.native_archive_fallback {
            parser.with_fallback(Box::new(NativeDebInspector))
        } else {
            parser
        }
    }

    /// Parse the archive at `path`
    ///
    /// # Errors
    ///
    /// * `NotReadable` - the path is missing, unreadable or not a file
    /// * `Timeout` / `ToolError` / `Spawn` - the inspector failed. A non-zero
    ///   exit is always `ToolError`, whatever the tool printed
    /// * `UnparseableOutput` - the inspector succeeded but no package name
    ///   could be extracted
    pub fn parse(&self, path: &Path) -> Result<LocalPackageRecord> {
        debug!("Parsing archive: {}", path.display());

        let not_readable = |source| Error::NotReadable {
            path: path.to_path_buf(),
            source,
        };
        let metadata = std::fs::metadata(path).map_err(not_readable)?;
        if !metadata.is_file() {
            return Err(not_readable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        File::open(path).map_err(not_readable)?;

        let block = match self.inspector.control_block(path) {
            Err(Error::Spawn { tool, source }) => match &self.fallback {
                Some(fallback) => {
                    warn!("{} unavailable ({}), reading control member directly", tool, source);
                    fallback.control_block(path)?
                }
                None => return Err(Error::Spawn { tool, source }),
            },
            other => other?,
        };

        let mut record = parse_control(&block);
        if !record.is_valid() {
            return Err(Error::UnparseableOutput(format!(
                "no Package field in control data of {}",
                path.display()
            )));
        }

        record.path = std::path::absolute(path)?;
        if record.download_size.is_none() {
            record.download_size = Some(metadata.len().to_string());
        }

        debug!(
            "Parsed archive: {} version {} ({} dependencies)",
            record.name,
            record.version,
            record.depends.len()
        );
        Ok(record)
    }
}
