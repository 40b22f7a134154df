// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "/var/lib/pkgsys/pkgsys.db";
const DEFAULT_LOCK_PATH: &str = "/var/run/pkgsys.lock";

fn packages_arg(help: &'static str) -> Arg {
    Arg::new("packages")
        .required(true)
        .num_args(1..)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("pkgsys")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pkgsys Contributors")
        .about("Install and remove packages as verified, all-or-nothing transactions")
        .subcommand_required(false)
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .default_value(DEFAULT_DB_PATH)
                .help("Database path"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .global(true)
                .default_value("/")
                .help("Root directory of the target system"),
        )
        .arg(
            Arg::new("lock_path")
                .long("lock-path")
                .value_name("PATH")
                .global(true)
                .default_value(DEFAULT_LOCK_PATH)
                .help("Path of the system-wide package lock"),
        )
        .arg(
            Arg::new("stage")
                .long("stage")
                .global(true)
                .value_parser(["initial", "continue", "normal"])
                .default_value("normal")
                .help("Lifecycle stage of the machine"),
        )
        .arg(
            Arg::new("target_unmounted")
                .long("target-unmounted")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("No live root filesystem is mounted at the target root"),
        )
        .arg(
            Arg::new("non_interactive")
                .long("non-interactive")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Never prompt, answer from the flags instead"),
        )
        .arg(
            Arg::new("accept_licenses")
                .long("accept-licenses")
                .global(true)
                .action(ArgAction::SetTrue)
                .requires("non_interactive")
                .help("Accept package licenses without prompting"),
        )
        .arg(
            Arg::new("accept_solver_proposal")
                .long("accept-solver-proposal")
                .global(true)
                .action(ArgAction::SetTrue)
                .requires("non_interactive")
                .help("Go on with the solver's proposal when dependencies cannot be resolved"),
        )
        .subcommand(Command::new("init").about("Initialize the pkgsys database"))
        .subcommand(
            Command::new("install")
                .about("Install packages, optionally removing others in the same transaction")
                .arg(packages_arg("Packages to install"))
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .num_args(1..)
                        .help("Packages to remove in the same transaction"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(packages_arg("Packages to remove")),
        )
        .subcommand(
            Command::new("check")
                .about("Install whichever of the given packages are missing")
                .arg(packages_arg("Packages that must be installed")),
        )
        .subcommand(
            Command::new("installed")
                .about("Check whether packages are installed")
                .arg(packages_arg("Package names")),
        )
        .subcommand(
            Command::new("available")
                .about("Check whether packages are available from enabled repositories")
                .arg(packages_arg("Package names")),
        )
        .subcommand(
            Command::new("repo-add")
                .about("Add a new repository")
                .arg(Arg::new("name").required(true).help("Repository name"))
                .arg(Arg::new("url").required(true).help("Repository URL or local directory"))
                .arg(
                    Arg::new("priority")
                        .short('p')
                        .long("priority")
                        .default_value("0")
                        .help("Priority (higher = preferred)"),
                )
                .arg(
                    Arg::new("disabled")
                        .long("disabled")
                        .action(ArgAction::SetTrue)
                        .help("Disable repository after adding"),
                ),
        )
        .subcommand(
            Command::new("repo-list")
                .about("List repositories")
                .arg(
                    Arg::new("all")
                        .short('a')
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Show all repositories (including disabled)"),
                ),
        )
        .subcommand(
            Command::new("repo-remove")
                .about("Remove a repository")
                .arg(Arg::new("name").required(true).help("Repository name")),
        )
        .subcommand(
            Command::new("repo-enable")
                .about("Enable a repository")
                .arg(Arg::new("name").required(true).help("Repository name")),
        )
        .subcommand(
            Command::new("repo-disable")
                .about("Disable a repository")
                .arg(Arg::new("name").required(true).help("Repository name")),
        )
        .subcommand(
            Command::new("query")
                .about("Query installed packages")
                .arg(Arg::new("pattern").help("Package name pattern (optional)")),
        )
        .subcommand(Command::new("history").about("Show changeset history"))
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

    let man_path = man_dir.join("pkgsys.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
