// src/origin/listing.rs

//! Installed-package listing parser
//!
//! `apt list --installed` prints one package per line with its status flags:
//!
//! ```text
//! Listing... Done
//! bash/noble,now 5.2.21-2ubuntu4 amd64 [installed]
//! mytool/now 1.0 amd64 [installed,local]
//! ```
//!
//! The `local` flag is apt's own verdict that no repository carries the
//! installed version. Listings without flags (e.g. `dpkg-query -W`) only
//! yield names, which then need per-package classification.

use std::collections::BTreeSet;

/// Status flag apt attaches to installs with no repository source
pub const LOCAL_FLAG: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScan {
    /// The listing carried status flags; these names are flagged local
    Flagged(BTreeSet<String>),
    /// No status flags; every installed name, to be classified one by one
    Unflagged(Vec<String>),
}

/// Parse a bulk listing of installed packages
pub fn parse_listing(output: &str) -> ListingScan {
    let mut any_flags = false;
    let mut local = BTreeSet::new();
    let mut names = Vec::new();

    for line in output.lines() {
        let Some(name) = package_name(line) else {
            continue;
        };

        match status_flags(line) {
            Some(flags) => {
                any_flags = true;
                if flags.iter().any(|flag| *flag == LOCAL_FLAG) {
                    local.insert(name.to_string());
                }
            }
            None => names.push(name.to_string()),
        }
    }

    if any_flags {
        ListingScan::Flagged(local)
    } else {
        names.sort();
        names.dedup();
        ListingScan::Unflagged(names)
    }
}

/// Leading package name, with any `/suite` or `:arch` qualifier removed
fn package_name(line: &str) -> Option<&str> {
    let token = line.split_whitespace().next()?;
    let name = token.split('/').next()?;
    let name = name.split(':').next()?;
    is_valid_name(name).then_some(name)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() >= 2
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
}

fn status_flags(line: &str) -> Option<Vec<&str>> {
    let line = line.trim_end();
    let inner = line.strip_suffix(']')?;
    let start = inner.rfind('[')?;
    Some(inner[start + 1..].split(',').map(str::trim).collect())
}
