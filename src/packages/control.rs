// src/packages/control.rs

//! Control-block parser
//!
//! Reads the `Field: value` block printed by `dpkg-deb --info` (fields
//! indented by one space, continuation lines by more) as well as a raw
//! `control` file (fields at column zero). A field is recognised at the start
//! of a line; its value is then extracted by a pattern scan over the whole
//! block, which also picks up the continuation lines that follow it.
//! Unknown fields are ignored.

use crate::packages::record::{LOCAL_ORIGIN, LocalPackageRecord};
use regex::Regex;
use std::sync::LazyLock;

/// Separator between entries of a relationship field
pub const RELATION_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Package,
    Version,
    Architecture,
    Maintainer,
    Description,
    Section,
    Depends,
    PreDepends,
    Recommends,
    Suggests,
    Enhances,
    Conflicts,
    Breaks,
    Provides,
    Replaces,
    InstalledSize,
    Size,
    Homepage,
    Priority,
    StandardsVersion,
    Source,
}

impl Field {
    const ALL: [Field; 21] = [
        Field::Package,
        Field::Version,
        Field::Architecture,
        Field::Maintainer,
        Field::Description,
        Field::Section,
        Field::Depends,
        Field::PreDepends,
        Field::Recommends,
        Field::Suggests,
        Field::Enhances,
        Field::Conflicts,
        Field::Breaks,
        Field::Provides,
        Field::Replaces,
        Field::InstalledSize,
        Field::Size,
        Field::Homepage,
        Field::Priority,
        Field::StandardsVersion,
        Field::Source,
    ];

    fn label(self) -> &'static str {
        match self {
            Field::Package => "Package",
            Field::Version => "Version",
            Field::Architecture => "Architecture",
            Field::Maintainer => "Maintainer",
            Field::Description => "Description",
            Field::Section => "Section",
            Field::Depends => "Depends",
            Field::PreDepends => "Pre-Depends",
            Field::Recommends => "Recommends",
            Field::Suggests => "Suggests",
            Field::Enhances => "Enhances",
            Field::Conflicts => "Conflicts",
            Field::Breaks => "Breaks",
            Field::Provides => "Provides",
            Field::Replaces => "Replaces",
            Field::InstalledSize => "Installed-Size",
            Field::Size => "Size",
            Field::Homepage => "Homepage",
            Field::Priority => "Priority",
            Field::StandardsVersion => "Standards-Version",
            Field::Source => "Source",
        }
    }
}

static FIELD_PATTERNS: LazyLock<Vec<(Field, Regex)>> = LazyLock::new(|| {
    Field::ALL
        .iter()
        .filter_map(|&field| {
            let pattern = format!(r"(?m)^([ \t]*){}:[ \t]*(.*)$", regex::escape(field.label()));
            Regex::new(&pattern).ok().map(|regex| (field, regex))
        })
        .collect()
});

/// Parse a control block into a record
///
/// The returned record has `origin` set to [`LOCAL_ORIGIN`] and an empty
/// path; it is only meaningful if [`LocalPackageRecord::is_valid`] holds.
pub fn parse_control(block: &str) -> LocalPackageRecord {
    let mut record = LocalPackageRecord {
        origin: LOCAL_ORIGIN.to_string(),
        ..Default::default()
    };

    for line in block.lines() {
        let line = line.trim_start();
        let Some(field) = Field::ALL
            .iter()
            .copied()
            .find(|field| line.strip_prefix(field.label()).is_some_and(|rest| rest.starts_with(':')))
        else {
            continue;
        };

        let Some(value) = extract_field(block, field) else {
            continue;
        };
        apply_field(&mut record, field, value);
    }

    record
}

fn apply_field(record: &mut LocalPackageRecord, field: Field, value: String) {
    match field {
        Field::Package => record.name = value,
        Field::Version => record.version = value,
        Field::Architecture => record.architecture = Some(value),
        Field::Maintainer => record.maintainer = Some(value),
        Field::Description => record.description = Some(value),
        Field::Section => record.section = Some(value),
        Field::Depends => record.depends = split_relations(&value),
        Field::PreDepends => record.pre_depends = split_relations(&value),
        Field::Recommends => record.recommends = split_relations(&value),
        Field::Suggests => record.suggests = split_relations(&value),
        Field::Enhances => record.enhances = split_relations(&value),
        Field::Conflicts => record.conflicts = split_relations(&value),
        Field::Breaks => record.breaks = split_relations(&value),
        Field::Provides => record.provides = split_relations(&value),
        Field::Replaces => record.replaces = split_relations(&value),
        Field::InstalledSize => record.installed_size = Some(value),
        Field::Size => record.download_size = Some(value),
        Field::Homepage => record.homepage = Some(value),
        Field::Priority => record.priority = Some(value),
        Field::StandardsVersion => record.standards_version = Some(value),
        Field::Source => record.source = Some(value),
    }
}

/// Value of `field`, including continuation lines
///
/// Continuation lines are the non-blank lines directly after the field that
/// are indented deeper than the field itself. Description continuations keep
/// their line breaks (a lone `.` is an empty paragraph line); other fields are
/// folded onto one line.
fn extract_field(block: &str, field: Field) -> Option<String> {
    let (_, regex) = FIELD_PATTERNS.iter().find(|(f, _)| *f == field)?;
    let captures = regex.captures(block)?;
    let indent = captures.get(1)?.as_str().len();
    let first = captures.get(2)?.as_str().trim();
    let matched_end = captures.get(0)?.end();

    let continuation: Vec<&str> = block[matched_end..]
        .lines()
        .skip(1)
        .take_while(|line| {
            let body = line.trim_start();
            !body.is_empty() && line.len() - body.len() > indent
        })
        .map(str::trim)
        .collect();

    if continuation.is_empty() {
        return Some(first.to_string());
    }

    let value = if field == Field::Description {
        let mut lines = vec![first];
        lines.extend(continuation.iter().map(|line| if *line == "." { "" } else { line }));
        lines.join("\n")
    } else {
        let mut parts = vec![first];
        parts.extend(continuation);
        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };

    Some(value)
}

/// Split a relationship field into its raw expressions, kept verbatim
pub fn split_relations(value: &str) -> Vec<String> {
    value
        .split(RELATION_SEPARATOR)
        .map(str::trim)
        .filter(|relation| !relation.is_empty())
        .map(str::to_string)
        .collect()
}
