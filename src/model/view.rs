// src/model/view.rs

//! Filtered and sorted projection of the composite catalog
//!
//! Every active predicate must pass for a row to be accepted. The `local`
//! origin value is not a field comparison: repository rows pass when the
//! package was installed from a local file or has an archive on disk, and
//! virtual rows always pass it.

use crate::config::Config;
use crate::model::composite::{CompositeCatalog, RowRef};
use crate::model::repository::{PackageDatabase, PackageState, RepoPackage};
use crate::model::{LocalOrigins, Role, RoleValue};
use crate::packages::{LOCAL_ORIGIN, VirtualPackage};
use crate::sandbox::SandboxApp;
use crate::version::compare_versions;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shortest search text that triggers a search
const MIN_SEARCH_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Name,
    Status,
    Requested,
    InstalledSize,
    InstalledVersion,
    AvailableVersion,
}

impl SortColumn {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Name),
            1 => Some(Self::Status),
            2 => Some(Self::Requested),
            3 => Some(Self::InstalledSize),
            4 => Some(Self::InstalledVersion),
            5 => Some(Self::AvailableVersion),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Name => "Package",
            Self::Status => "Status",
            Self::Requested => "Requested",
            Self::InstalledSize => "Installed Size",
            Self::InstalledVersion => "Installed Version",
            Self::AvailableVersion => "Available Version",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct SearchResults {
    /// Lowercased search text, for rows the database does not index
    needle: String,
    /// Repository package key to relevance position
    ranks: HashMap<String, usize>,
}

pub struct CatalogView {
    origins: Arc<dyn LocalOrigins>,
    group_filter: String,
    state_filter: PackageState,
    origin_filter: String,
    arch_filter: String,
    show_multi_arch_dupes: bool,
    use_slow_search: bool,
    search: Option<SearchResults>,
    sort_by_relevance: bool,
    sort_column: SortColumn,
    sort_order: SortOrder,
}

impl CatalogView {
    pub fn new(origins: Arc<dyn LocalOrigins>, config: &Config) -> Self {
        Self {
            origins,
            group_filter: String::new(),
            state_filter: PackageState::EMPTY,
            origin_filter: String::new(),
            arch_filter: String::new(),
            show_multi_arch_dupes: config.show_multi_arch_dupes,
            use_slow_search: config.use_slow_search,
            search: None,
            sort_by_relevance: false,
            sort_column: SortColumn::Name,
            sort_order: SortOrder::Ascending,
        }
    }

    /// Section substring; empty for no constraint
    pub fn set_group_filter(&mut self, group: impl Into<String>) {
        self.group_filter = group.into();
    }

    /// State bits a row must share; empty for no constraint
    pub fn set_state_filter(&mut self, state: PackageState) {
        self.state_filter = state;
    }

    /// Origin name or `local`; empty for no constraint
    pub fn set_origin_filter(&mut self, origin: impl Into<String>) {
        self.origin_filter = origin.into();
    }

    pub fn set_arch_filter(&mut self, arch: impl Into<String>) {
        self.arch_filter = arch.into();
    }

    /// Narrow the view to packages matching `text`
    ///
    /// Text shorter than two characters clears the search and relevance
    /// ordering. Otherwise the database's relevance-ordered results are used,
    /// falling back to a substring scan of the catalog's repository packages
    /// when the database finds nothing and slow search is enabled. The first
    /// search switches relevance ordering on.
    pub fn search(&mut self, text: &str, db: &dyn PackageDatabase, catalog: &CompositeCatalog) {
        if text.chars().count() < MIN_SEARCH_CHARS {
            self.search = None;
            self.sort_by_relevance = false;
            return;
        }

        let needle = text.to_lowercase();
        let mut keys = db.search(text);
        if keys.is_empty() && self.use_slow_search {
            keys = catalog
                .packages()
                .iter()
                .filter(|package| repository_matches(package, &needle))
                .map(RepoPackage::key)
                .collect();
            debug!("Slow search for '{}' found {} packages", text, keys.len());
        }

        let mut ranks = HashMap::with_capacity(keys.len());
        for (position, key) in keys.into_iter().enumerate() {
            ranks.entry(key).or_insert(position);
        }

        if self.search.is_none() {
            self.sort_by_relevance = true;
        }
        self.search = Some(SearchResults { needle, ranks });
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    pub fn set_sort_by_relevance(&mut self, enabled: bool) {
        self.sort_by_relevance = enabled;
    }

    pub fn is_sorted_by_relevance(&self) -> bool {
        self.sort_by_relevance
    }

    pub fn sort(&mut self, column: SortColumn, order: SortOrder) {
        self.sort_column = column;
        self.sort_order = order;
    }

    pub fn accepts_row(&self, catalog: &CompositeCatalog, row: usize) -> bool {
        match catalog.locate(row) {
            Some(RowRef::Repository(_)) => catalog
                .repository_package(row)
                .is_some_and(|package| self.accepts_repository(package)),
            Some(RowRef::Virtual(_)) => catalog
                .virtual_package(row)
                .is_some_and(|package| self.accepts_virtual(package)),
            Some(RowRef::Sandbox(_)) => catalog
                .sandbox_app(row)
                .is_some_and(|app| self.accepts_sandbox(app)),
            None => false,
        }
    }

    fn accepts_repository(&self, package: &RepoPackage) -> bool {
        if !self.group_filter.is_empty() && !package.section.contains(&self.group_filter) {
            return false;
        }
        if !self.state_filter.is_empty() && !package.state.intersects(self.state_filter) {
            return false;
        }
        if self.origin_filter == LOCAL_ORIGIN {
            let flags = self.origins.local_flags(&package.name);
            if !flags.locally_installed && !flags.on_disk {
                return false;
            }
        } else if !self.origin_filter.is_empty() && package.origin != self.origin_filter {
            return false;
        }
        if !self.arch_filter.is_empty() && package.architecture != self.arch_filter {
            return false;
        }
        if !self.show_multi_arch_dupes && package.multi_arch_duplicate {
            return false;
        }
        match &self.search {
            Some(search) => search.ranks.contains_key(&package.key()),
            None => true,
        }
    }

    fn accepts_virtual(&self, package: &VirtualPackage) -> bool {
        if !self.group_filter.is_empty() && !package.section().contains(&self.group_filter) {
            return false;
        }
        // Never installed
        if !self.state_filter.is_empty() && !self.state_filter.intersects(PackageState::NOT_INSTALLED)
        {
            return false;
        }
        if !self.origin_filter.is_empty()
            && self.origin_filter != LOCAL_ORIGIN
            && package.origin() != self.origin_filter
        {
            return false;
        }
        if !self.arch_filter.is_empty() && package.architecture() != self.arch_filter {
            return false;
        }
        match &self.search {
            Some(search) => virtual_matches(package, &search.needle),
            None => true,
        }
    }

    fn accepts_sandbox(&self, app: &SandboxApp) -> bool {
        if !self.group_filter.is_empty() && !app.section().contains(&self.group_filter) {
            return false;
        }
        if !self.state_filter.is_empty() && !self.state_filter.intersects(PackageState::INSTALLED) {
            return false;
        }
        if self.origin_filter == LOCAL_ORIGIN
            || (!self.origin_filter.is_empty() && app.remote != self.origin_filter)
        {
            return false;
        }
        if !self.arch_filter.is_empty() && app.arch != self.arch_filter {
            return false;
        }
        match &self.search {
            Some(search) => sandbox_matches(app, &search.needle),
            None => true,
        }
    }

    /// Ascending comparison of two rows on `column`
    ///
    /// Repository rows order before virtual rows, and virtual rows before
    /// sandboxed applications, whatever the column.
    pub fn compare(
        &self,
        catalog: &CompositeCatalog,
        left: usize,
        right: usize,
        column: SortColumn,
    ) -> Ordering {
        let (Some(left_ref), Some(right_ref)) = (catalog.locate(left), catalog.locate(right))
        else {
            return Ordering::Equal;
        };

        match (left_ref, right_ref) {
            (RowRef::Repository(_), RowRef::Repository(_)) => {
                match (catalog.repository_package(left), catalog.repository_package(right)) {
                    (Some(a), Some(b)) => self.compare_repository(catalog, left, right, a, b, column),
                    _ => Ordering::Equal,
                }
            }
            (RowRef::Virtual(_), RowRef::Virtual(_)) => {
                match (catalog.virtual_package(left), catalog.virtual_package(right)) {
                    (Some(a), Some(b)) => compare_virtual(a, b, column),
                    _ => Ordering::Equal,
                }
            }
            (RowRef::Sandbox(_), RowRef::Sandbox(_)) => {
                match (catalog.sandbox_app(left), catalog.sandbox_app(right)) {
                    (Some(a), Some(b)) => compare_sandbox(a, b, column),
                    _ => Ordering::Equal,
                }
            }
            (a, b) => source_rank(a).cmp(&source_rank(b)),
        }
    }

    fn compare_repository(
        &self,
        catalog: &CompositeCatalog,
        left_row: usize,
        right_row: usize,
        left: &RepoPackage,
        right: &RepoPackage,
        column: SortColumn,
    ) -> Ordering {
        match column {
            SortColumn::Name => match (&self.search, self.sort_by_relevance) {
                // Earlier results are more relevant and sort last
                (Some(search), true) => {
                    search_position(search, right).cmp(&search_position(search, left))
                }
                _ => display_name(catalog, left_row).cmp(&display_name(catalog, right_row)),
            },
            SortColumn::Status => (left.state & PackageState::STATUS_SORT_MASK)
                .bits()
                .cmp(&(right.state & PackageState::STATUS_SORT_MASK).bits()),
            SortColumn::Requested => (left.state & PackageState::REQUESTED_SORT_MASK)
                .bits()
                .cmp(&(right.state & PackageState::REQUESTED_SORT_MASK).bits()),
            SortColumn::InstalledSize => left.installed_size.cmp(&right.installed_size),
            SortColumn::InstalledVersion => {
                compare_versions(&left.installed_version, &right.installed_version)
            }
            SortColumn::AvailableVersion => {
                compare_versions(&left.available_version, &right.available_version)
            }
        }
    }

    /// Accepted rows in the active sort order
    ///
    /// Only comparisons within one source follow the sort order; the source
    /// grouping stays repository, virtual, sandboxed.
    pub fn rows(&self, catalog: &CompositeCatalog) -> Vec<usize> {
        let mut rows: Vec<(u8, usize)> = (0..catalog.row_count())
            .filter(|&row| self.accepts_row(catalog, row))
            .filter_map(|row| catalog.locate(row).map(|row_ref| (source_rank(row_ref), row)))
            .collect();

        rows.sort_by(|(left_rank, left), (right_rank, right)| {
            left_rank.cmp(right_rank).then_with(|| {
                let ordering = self.compare(catalog, *left, *right, self.sort_column);
                match self.sort_order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
        });
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

fn source_rank(row: RowRef) -> u8 {
    match row {
        RowRef::Repository(_) => 0,
        RowRef::Virtual(_) => 1,
        RowRef::Sandbox(_) => 2,
    }
}

/// Relevance position, with non-results ranked before every result
fn search_position(search: &SearchResults, package: &RepoPackage) -> i64 {
    search
        .ranks
        .get(&package.key())
        .map_or(-1, |&position| position as i64)
}

fn display_name(catalog: &CompositeCatalog, row: usize) -> String {
    match catalog.attribute_at(row, Role::Name) {
        Some(RoleValue::Text(name)) => name,
        _ => String::new(),
    }
}

fn compare_virtual(left: &VirtualPackage, right: &VirtualPackage, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Name => left.name().cmp(right.name()),
        SortColumn::InstalledSize => left.installed_size().cmp(&right.installed_size()),
        SortColumn::AvailableVersion => {
            compare_versions(left.available_version(), right.available_version())
        }
        SortColumn::Status | SortColumn::Requested | SortColumn::InstalledVersion => {
            Ordering::Equal
        }
    }
}

fn compare_sandbox(left: &SandboxApp, right: &SandboxApp, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Name => left.display_name().cmp(right.display_name()),
        SortColumn::InstalledVersion | SortColumn::AvailableVersion => {
            compare_versions(&left.version, &right.version)
        }
        SortColumn::Status | SortColumn::Requested | SortColumn::InstalledSize => Ordering::Equal,
    }
}

fn contains_lower(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn repository_matches(package: &RepoPackage, needle: &str) -> bool {
    [
        package.name.as_str(),
        &package.short_description,
        &package.long_description,
        &package.maintainer,
        &package.section,
        &package.origin,
    ]
    .iter()
    .any(|field| contains_lower(field, needle))
}

fn virtual_matches(package: &VirtualPackage, needle: &str) -> bool {
    [
        package.name(),
        package.short_description(),
        package.long_description(),
        package.maintainer(),
        package.section(),
        package.origin(),
    ]
    .iter()
    .any(|field| contains_lower(field, needle))
}

fn sandbox_matches(app: &SandboxApp, needle: &str) -> bool {
    [
        app.id.as_str(),
        &app.name,
        &app.description,
        &app.remote,
    ]
    .iter()
    .any(|field| contains_lower(field, needle))
}
