// src/sandbox.rs

//! Sandboxed application inventory
//!
//! Installed Flatpak applications, listed with
//! `flatpak list --app --columns=application,name,description,version,arch,branch,origin`.
//! Each output line is tab separated in that column order.

use crate::catalog::CatalogEvent;
use crate::config::{Config, ToolCommand};
use crate::error::Result;
use crate::process::{Limits, run_tool};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Section every sandboxed application is grouped under
pub const SANDBOX_SECTION: &str = "Flatpak";

const LIST_ARGS: [&str; 3] = [
    "list",
    "--app",
    "--columns=application,name,description,version,arch,branch,origin",
];
const COLUMN_COUNT: usize = 7;

/// One installed sandboxed application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxApp {
    /// Reverse-DNS application id
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub arch: String,
    pub branch: String,
    /// Remote the application was installed from
    pub remote: String,
}

impl SandboxApp {
    pub fn section(&self) -> &str {
        SANDBOX_SECTION
    }

    pub fn is_installed(&self) -> bool {
        true
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Parse the tab-separated application listing
///
/// Lines with fewer than seven columns are skipped.
pub fn parse_app_list(output: &str) -> Vec<SandboxApp> {
    output
        .lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split('\t').map(str::trim).collect();
            if columns.len() < COLUMN_COUNT || columns[0].is_empty() {
                return None;
            }
            Some(SandboxApp {
                id: columns[0].to_string(),
                name: columns[1].to_string(),
                description: columns[2].to_string(),
                version: columns[3].to_string(),
                arch: columns[4].to_string(),
                branch: columns[5].to_string(),
                remote: columns[6].to_string(),
            })
        })
        .collect()
}

/// Current list of sandboxed applications, refreshed from the sandbox tool
pub struct SandboxInventory {
    tool: ToolCommand,
    limits: Limits,
    apps: Arc<Mutex<Vec<SandboxApp>>>,
    events: Sender<CatalogEvent>,
}

impl SandboxInventory {
    pub fn new(tool: ToolCommand, limits: Limits, events: Sender<CatalogEvent>) -> Self {
        Self {
            tool,
            limits,
            apps: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    pub fn from_config(config: &Config, events: Sender<CatalogEvent>) -> Self {
        Self::new(
            config.sandbox_tool.clone(),
            Limits::new(config.sandbox_timeout(), config.termination_grace()),
            events,
        )
    }

    fn lock(apps: &Mutex<Vec<SandboxApp>>) -> MutexGuard<'_, Vec<SandboxApp>> {
        apps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the known applications
    pub fn apps(&self) -> Vec<SandboxApp> {
        Self::lock(&self.apps).clone()
    }

    /// Query the sandbox tool in the background
    ///
    /// Sends [`CatalogEvent::SandboxPackagesChanged`] when done. On failure
    /// the list is emptied.
    pub fn refresh(&self) {
        let tool = self.tool.clone();
        let limits = self.limits;
        let apps = Arc::clone(&self.apps);
        let events = self.events.clone();
        rayon::spawn(move || {
            let _ = Self::refresh_into(&tool, limits, &apps, &events);
        });
    }

    /// Query the sandbox tool on the calling thread
    ///
    /// # Errors
    ///
    /// The tool failure; the list is emptied and the change event still sent.
    pub fn refresh_blocking(&self) -> Result<usize> {
        Self::refresh_into(&self.tool, self.limits, &self.apps, &self.events)
    }

    fn refresh_into(
        tool: &ToolCommand,
        limits: Limits,
        apps: &Mutex<Vec<SandboxApp>>,
        events: &Sender<CatalogEvent>,
    ) -> Result<usize> {
        let listed = run_tool(tool, LIST_ARGS, limits).map(|output| parse_app_list(&output.stdout));
        let count = match &listed {
            Ok(found) => found.len(),
            Err(e) => {
                warn!("Cannot list sandboxed applications: {}", e);
                0
            }
        };
        *Self::lock(apps) = listed.as_ref().cloned().unwrap_or_default();
        info!("{} sandboxed applications", count);
        let _ = events.send(CatalogEvent::SandboxPackagesChanged { count });
        listed.map(|found| found.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    const LISTING: &str = "org.gimp.GIMP\tGNU Image Manipulation Program\tCreate images and edit photographs\t2.10.38\tx86_64\tstable\tflathub
org.mozilla.firefox\tFirefox\tFast, Private & Safe Web Browser\t131.0\tx86_64\tstable\tflathub
broken line\twith too few
";

    fn limits() -> Limits {
        Limits::new(Duration::from_secs(10), Duration::from_millis(200))
    }

    #[test]
    fn test_parse_app_list() {
        let apps = parse_app_list(LISTING);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].id, "org.gimp.GIMP");
        assert_eq!(apps[0].version, "2.10.38");
        assert_eq!(apps[0].remote, "flathub");
        assert_eq!(apps[1].display_name(), "Firefox");
        assert_eq!(apps[1].section(), SANDBOX_SECTION);
        assert!(apps[1].is_installed());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let apps = parse_app_list("org.example.Tool\t\t\t1.0\tx86_64\tstable\tlocal-remote\n");
        assert_eq!(apps[0].display_name(), "org.example.Tool");
    }

    #[test]
    fn test_refresh_blocking_runs_tool_with_columns() {
        let script = "[ \"$1 $2\" = 'list --app' ] && printf 'org.a.App\\tApp\\tAn app\\t1\\tx86_64\\tstable\\tflathub\\n'";
        let (tx, rx) = mpsc::channel();
        let inventory =
            SandboxInventory::new(ToolCommand::with_args("sh", ["-c", script, "sh"]), limits(), tx);
        assert_eq!(inventory.refresh_blocking().unwrap(), 1);
        assert_eq!(inventory.apps()[0].id, "org.a.App");
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::SandboxPackagesChanged { count: 1 }
        );
    }

    #[test]
    fn test_background_refresh_failure_empties_list() {
        let (tx, rx) = mpsc::channel();
        let inventory = SandboxInventory::new(
            ToolCommand::with_args("sh", ["-c", "printf 'org.a.App\\tA\\tB\\t1\\tx\\ts\\tr\\n'", "sh"]),
            limits(),
            tx.clone(),
        );
        inventory.refresh_blocking().unwrap();
        assert_eq!(inventory.apps().len(), 1);

        let failing = SandboxInventory {
            tool: ToolCommand::new("/nonexistent/kydra-flatpak"),
            apps: Arc::clone(&inventory.apps),
            ..SandboxInventory::new(ToolCommand::new("unused"), limits(), tx)
        };
        failing.refresh();
        let events: Vec<CatalogEvent> = rx.iter().take(2).collect();
        assert_eq!(events[1], CatalogEvent::SandboxPackagesChanged { count: 0 });
        assert!(inventory.apps().is_empty());
    }
}
