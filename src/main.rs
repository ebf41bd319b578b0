// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use kydra_catalog::catalog::{CatalogEvent, LocalCatalog};
use kydra_catalog::config::Config;
use kydra_catalog::origin::{InstallOrigin, PolicyClassifier};
use kydra_catalog::packages::{ArchiveParser, LocalPackageRecord};
use kydra_catalog::sandbox::SandboxInventory;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "kydra-catalog")]
#[command(author, version, about = "Package catalog reconciliation for repository, local archive and Flatpak sources", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the control metadata of a package archive
    Inspect {
        /// Path to the archive
        archive: PathBuf,
    },
    /// Tell whether an installed package came from a repository or a local file
    Policy {
        /// Package name
        name: String,
    },
    /// Scan folders for package archives
    Scan {
        /// Folders to scan (defaults to the configured folders)
        folders: Vec<PathBuf>,
    },
    /// List installed packages that came from local files
    Detect,
    /// List installed Flatpak applications
    Sandbox,
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn print_record(record: &LocalPackageRecord) {
    println!("Package: {} version {}", record.name, record.version);
    println!(
        "  Architecture: {}",
        record.architecture.as_deref().unwrap_or("none")
    );
    if let Some(section) = &record.section {
        println!("  Section: {}", section);
    }
    if let Some(description) = &record.description {
        println!("  Description: {}", description.lines().next().unwrap_or_default());
    }
    println!("  Dependencies: {}", record.depends.len());
    println!("  Path: {}", record.path.display());
}

fn origin_label(origin: InstallOrigin) -> &'static str {
    match origin {
        InstallOrigin::NotInstalled => "not-installed",
        InstallOrigin::Repository => "repository",
        InstallOrigin::Local => "local",
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Inspect { archive } => {
            info!("Inspecting archive: {}", archive.display());
            let record = ArchiveParser::from_config(&config)
                .parse(&archive)
                .with_context(|| format!("Failed to read {}", archive.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
            Ok(())
        }
        Commands::Policy { name } => {
            let origin = PolicyClassifier::from_config(&config).origin_of(&name)?;
            if cli.json {
                let value = serde_json::json!({ "package": name, "origin": origin_label(origin) });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}: {}", name, origin_label(origin));
            }
            Ok(())
        }
        Commands::Scan { folders } => {
            let folders = if folders.is_empty() {
                config.folders.clone()
            } else {
                folders
            };
            if folders.is_empty() {
                anyhow::bail!("No folders to scan; pass folders or set them in the configuration");
            }
            config.watch_folders = false;

            let (tx, rx) = mpsc::channel();
            let catalog = LocalCatalog::new(&config, tx);
            catalog.set_folders(folders)?;
            for event in rx.iter() {
                match event {
                    CatalogEvent::ScanProgress { processed, total } => {
                        debug!("Parsed {}/{} archives", processed, total);
                    }
                    CatalogEvent::ScanFinished { found } => {
                        info!("Found {} local packages", found);
                        break;
                    }
                    _ => {}
                }
            }

            let records = catalog.records();
            if cli.json {
                let records: Vec<&LocalPackageRecord> = records.values().collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No package archives found.");
            } else {
                for record in records.values() {
                    println!(
                        "{} {} ({})",
                        record.name,
                        record.version,
                        record.path.display()
                    );
                }
                println!("\nTotal: {} package(s)", records.len());
            }
            Ok(())
        }
        Commands::Detect => {
            let (tx, _rx) = mpsc::channel();
            let catalog = LocalCatalog::new(&config, tx);
            catalog.detect_locally_installed_blocking();
            let names = catalog.locally_installed();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("No locally installed packages.");
            } else {
                for name in &names {
                    println!("{}", name);
                }
                println!("\nTotal: {} package(s)", names.len());
            }
            Ok(())
        }
        Commands::Sandbox => {
            let (tx, _rx) = mpsc::channel();
            let inventory = SandboxInventory::from_config(&config, tx);
            inventory.refresh_blocking()?;
            let apps = inventory.apps();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else if apps.is_empty() {
                println!("No sandboxed applications.");
            } else {
                for app in &apps {
                    println!("{} {} [{}] from {}", app.id, app.version, app.branch, app.remote);
                }
                println!("\nTotal: {} application(s)", apps.len());
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "kydra-catalog", &mut std::io::stdout());
            Ok(())
        }
    }
}
