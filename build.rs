// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("kydra-catalog")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Kydra Contributors")
        .about("Package catalog reconciliation for repository, local archive and Flatpak sources")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (JSON)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Print results as JSON"),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show the control metadata of a package archive")
                .arg(Arg::new("archive").required(true).help("Path to the archive")),
        )
        .subcommand(
            Command::new("policy")
                .about("Tell whether an installed package came from a repository or a local file")
                .arg(Arg::new("name").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("scan")
                .about("Scan folders for package archives")
                .arg(
                    Arg::new("folders")
                        .num_args(0..)
                        .help("Folders to scan (defaults to the configured folders)"),
                ),
        )
        .subcommand(Command::new("detect").about("List installed packages that came from local files"))
        .subcommand(Command::new("sandbox").about("List installed Flatpak applications"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("kydra-catalog.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
