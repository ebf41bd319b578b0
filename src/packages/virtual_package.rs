// src/packages/virtual_package.rs

//! Package-like view of a local archive with no repository counterpart

use crate::packages::record::LocalPackageRecord;
use std::path::{Path, PathBuf};

/// Read-only view over a [`LocalPackageRecord`]
///
/// Virtual packages are never installed: they exist only as an archive on
/// disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPackage {
    record: LocalPackageRecord,
    icon: Option<PathBuf>,
}

impl From<LocalPackageRecord> for VirtualPackage {
    fn from(record: LocalPackageRecord) -> Self {
        Self::new(record)
    }
}

impl VirtualPackage {
    pub fn new(record: LocalPackageRecord) -> Self {
        Self { record, icon: None }
    }

    /// Attach the icon extracted from the archive
    pub fn with_icon_path(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn version(&self) -> &str {
        &self.record.version
    }

    pub fn architecture(&self) -> &str {
        self.record.architecture.as_deref().unwrap_or_default()
    }

    pub fn origin(&self) -> &str {
        &self.record.origin
    }

    pub fn section(&self) -> &str {
        self.record.section.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.record.description.as_deref().unwrap_or_default()
    }

    /// First line of the description
    pub fn short_description(&self) -> &str {
        let description = self.description();
        match description.find('\n') {
            Some(pos) if pos > 0 => &description[..pos],
            _ => description,
        }
    }

    /// Everything after the first line, empty if there is nothing
    pub fn long_description(&self) -> &str {
        let description = self.description();
        match description.find('\n') {
            Some(pos) if pos > 0 && pos + 1 < description.len() => &description[pos + 1..],
            _ => "",
        }
    }

    pub fn maintainer(&self) -> &str {
        self.record.maintainer.as_deref().unwrap_or_default()
    }

    pub fn homepage(&self) -> &str {
        self.record.homepage.as_deref().unwrap_or_default()
    }

    /// Installed size in bytes, or -1 when unknown
    pub fn installed_size(&self) -> i64 {
        self.record
            .installed_size
            .as_deref()
            .and_then(|size| size.trim().parse::<i64>().ok())
            .map_or(-1, |kib| kib.saturating_mul(1024))
    }

    /// Archive size in bytes, or -1 when unknown
    pub fn download_size(&self) -> i64 {
        self.record
            .download_size
            .as_deref()
            .and_then(|size| size.trim().parse::<i64>().ok())
            .unwrap_or(-1)
    }

    pub fn path(&self) -> &Path {
        &self.record.path
    }

    /// Icon shipped in the archive, `None` when none is known
    pub fn icon_path(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    pub fn depends(&self) -> &[String] {
        &self.record.depends
    }

    pub fn pre_depends(&self) -> &[String] {
        &self.record.pre_depends
    }

    pub fn recommends(&self) -> &[String] {
        &self.record.recommends
    }

    pub fn suggests(&self) -> &[String] {
        &self.record.suggests
    }

    pub fn conflicts(&self) -> &[String] {
        &self.record.conflicts
    }

    pub fn breaks(&self) -> &[String] {
        &self.record.breaks
    }

    pub fn provides(&self) -> &[String] {
        &self.record.provides
    }

    pub fn replaces(&self) -> &[String] {
        &self.record.replaces
    }

    pub fn enhances(&self) -> &[String] {
        &self.record.enhances
    }

    pub fn is_installed(&self) -> bool {
        false
    }

    pub fn is_virtual(&self) -> bool {
        true
    }

    pub fn installed_version(&self) -> &str {
        ""
    }

    pub fn available_version(&self) -> &str {
        &self.record.version
    }

    pub fn record(&self) -> &LocalPackageRecord {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(description: Option<&str>, installed_size: Option<&str>) -> VirtualPackage {
        VirtualPackage::new(LocalPackageRecord {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            description: description.map(str::to_string),
            installed_size: installed_size.map(str::to_string),
            origin: "local".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_description_split_on_first_line_break() {
        let pkg = package(Some("Short line\nLong text\nmore"), None);
        assert_eq!(pkg.short_description(), "Short line");
        assert_eq!(pkg.long_description(), "Long text\nmore");
    }

    #[test]
    fn test_single_line_description() {
        let pkg = package(Some("Only short"), None);
        assert_eq!(pkg.short_description(), "Only short");
        assert_eq!(pkg.long_description(), "");

        let trailing = package(Some("Short\n"), None);
        assert_eq!(trailing.short_description(), "Short");
        assert_eq!(trailing.long_description(), "");
    }

    #[test]
    fn test_installed_size_kib_to_bytes() {
        assert_eq!(package(None, Some("120")).installed_size(), 120 * 1024);
        assert_eq!(package(None, Some("n/a")).installed_size(), -1);
        assert_eq!(package(None, None).installed_size(), -1);
    }

    #[test]
    fn test_always_uninstalled_and_virtual() {
        let pkg = package(None, None);
        assert!(!pkg.is_installed());
        assert!(pkg.is_virtual());
        assert_eq!(pkg.installed_version(), "");
        assert_eq!(pkg.available_version(), "1.0");
        assert_eq!(pkg.origin(), "local");
        assert_eq!(pkg.section(), "");
    }

    #[test]
    fn test_icon_path_unknown_until_attached() {
        let pkg = package(None, None);
        assert_eq!(pkg.icon_path(), None);

        let pkg = pkg.with_icon_path("/tmp/foo/icon.png");
        assert_eq!(pkg.icon_path(), Some(Path::new("/tmp/foo/icon.png")));
    }

    #[test]
    fn test_relation_accessors() {
        let pkg = VirtualPackage::new(LocalPackageRecord {
            name: "foo".to_string(),
            provides: vec!["editor".to_string()],
            replaces: vec!["foo-legacy (<< 1.0)".to_string()],
            enhances: vec!["bar".to_string(), "baz".to_string()],
            breaks: vec!["qux (<< 2)".to_string()],
            ..Default::default()
        });
        assert_eq!(pkg.provides(), ["editor"]);
        assert_eq!(pkg.replaces(), ["foo-legacy (<< 1.0)"]);
        assert_eq!(pkg.enhances(), ["bar", "baz"]);
        assert_eq!(pkg.breaks(), ["qux (<< 2)"]);
        assert!(pkg.conflicts().is_empty());
    }
}
