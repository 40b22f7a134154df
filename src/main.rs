// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pkgsys::config::{DEFAULT_DB_PATH, DEFAULT_LOCK_PATH, Presentation};
use pkgsys::confirm::confirmer_for;
use pkgsys::db::models::{Changeset, Repository, Trove};
use pkgsys::{
    Confirmer, FileLock, InstallStage, PackageSystem, SqliteBackend, SystemConfig, SystemRuntime,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Lifecycle stage selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Initial,
    Continue,
    Normal,
}

impl From<Stage> for InstallStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Initial => InstallStage::Initial,
            Stage::Continue => InstallStage::Continue,
            Stage::Normal => InstallStage::Normal,
        }
    }
}

#[derive(Parser)]
#[command(name = "pkgsys")]
#[command(
    author,
    version,
    about = "Install and remove packages as verified, all-or-nothing transactions",
    long_about = None
)]
struct Cli {
    /// Database path
    #[arg(short, long, global = true, default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Root directory of the target system
    #[arg(short, long, global = true, default_value = "/")]
    root: String,

    /// Path of the system-wide package lock
    #[arg(long, global = true, default_value = DEFAULT_LOCK_PATH)]
    lock_path: String,

    /// Lifecycle stage of the machine
    #[arg(long, global = true, value_enum, default_value_t = Stage::Normal)]
    stage: Stage,

    /// No live root filesystem is mounted at the target root
    #[arg(long, global = true)]
    target_unmounted: bool,

    /// Never prompt, answer from the flags below instead
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Accept package licenses without prompting
    #[arg(long, global = true, requires = "non_interactive")]
    accept_licenses: bool,

    /// Go on with the solver's proposal when dependencies cannot be resolved
    #[arg(long, global = true, requires = "non_interactive")]
    accept_solver_proposal: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the pkgsys database
    Init,
    /// Install packages, optionally removing others in the same transaction
    Install {
        /// Packages to install
        #[arg(required = true)]
        packages: Vec<String>,
        /// Packages to remove in the same transaction
        #[arg(long, num_args = 1..)]
        remove: Vec<String>,
    },
    /// Remove installed packages
    Remove {
        /// Packages to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Install whichever of the given packages are missing
    Check {
        /// Packages that must be installed
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Check whether packages are installed
    Installed {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Check whether packages are available from enabled repositories
    Available {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Add a new repository
    RepoAdd {
        /// Repository name
        name: String,
        /// Repository URL or local directory
        url: String,
        /// Priority (higher = preferred)
        #[arg(short, long, default_value = "0")]
        priority: i32,
        /// Disable repository after adding
        #[arg(long)]
        disabled: bool,
    },
    /// List repositories
    RepoList {
        /// Show all repositories (including disabled)
        #[arg(short, long)]
        all: bool,
    },
    /// Remove a repository
    RepoRemove {
        /// Repository name
        name: String,
    },
    /// Enable a repository
    RepoEnable {
        /// Repository name
        name: String,
    },
    /// Disable a repository
    RepoDisable {
        /// Repository name
        name: String,
    },
    /// Query installed packages
    Query {
        /// Package name pattern (optional, shows all if omitted)
        pattern: Option<String>,
    },
    /// Show changeset history
    History,
}

type CliSystem = PackageSystem<SqliteBackend, Box<dyn Confirmer>>;

fn presentation(cli: &Cli) -> Presentation {
    if cli.non_interactive {
        Presentation::Scripted {
            accept_licenses: cli.accept_licenses,
            accept_solver_proposal: cli.accept_solver_proposal,
        }
    } else {
        Presentation::Interactive
    }
}

fn open_system(cli: &Cli) -> Result<CliSystem> {
    let root = PathBuf::from(&cli.root);
    let config = SystemConfig::new(root.clone(), PathBuf::from(&cli.db_path))
        .with_lock_path(PathBuf::from(&cli.lock_path))
        .with_stage(cli.stage.into())
        .with_target_mounted(!cli.target_unmounted)
        .with_presentation(presentation(cli));

    let confirmer = confirmer_for(config.presentation);

    debug!("Opening package system with {:?}", config);
    let backend = SqliteBackend::open(&config.db_path)?;
    let lock = FileLock::new(config.lock_path.clone());
    let runtime = SystemRuntime::new(root);

    Ok(PackageSystem::new(config, backend, confirmer, lock, runtime))
}

fn finish(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} failed", what))
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Init) => {
            info!("Initializing pkgsys database at: {}", cli.db_path);
            pkgsys::db::init(&cli.db_path)?;
            println!("Database initialized successfully at: {}", cli.db_path);
            Ok(())
        }
        Some(Commands::Install { packages, remove }) => {
            let mut system = open_system(&cli)?;
            let ok = system.install_and_remove(packages, remove);
            if !ok && system.last_operation_canceled() {
                println!("Installation canceled.");
            } else if ok {
                println!("Installed: {}", packages.join(", "));
                if !remove.is_empty() {
                    println!("Removed: {}", remove.join(", "));
                }
            }
            finish(ok, "Installation")
        }
        Some(Commands::Remove { packages }) => {
            let mut system = open_system(&cli)?;
            let ok = system.remove_all(packages);
            if ok {
                println!("Removed: {}", packages.join(", "));
            }
            finish(ok, "Removal")
        }
        Some(Commands::Check { packages }) => {
            let mut system = open_system(&cli)?;
            let ok = if system.config().presentation.is_interactive() {
                system.check_and_install_packages_interactive(packages)
            } else {
                system.check_and_install_packages(packages)
            };
            finish(ok, "Package check")
        }
        Some(Commands::Installed { packages }) => {
            let mut system = open_system(&cli)?;
            let mut all = true;
            for package in packages {
                let installed = system.package_installed(package);
                println!("{}: {}", package, if installed { "installed" } else { "not installed" });
                all &= installed;
            }
            finish(all, "Installed check")
        }
        Some(Commands::Available { packages }) => {
            let mut system = open_system(&cli)?;
            let mut all = true;
            for package in packages {
                let available = system.package_available(package);
                println!("{}: {}", package, if available { "available" } else { "not available" });
                all &= available;
            }
            finish(all, "Availability check")
        }
        Some(Commands::RepoAdd {
            name,
            url,
            priority,
            disabled,
        }) => {
            let conn = pkgsys::db::open(&cli.db_path)?;
            let repo = pkgsys::repository::add_repository(
                &conn,
                name.clone(),
                url.clone(),
                !disabled,
                *priority,
            )?;
            println!("Added repository: {} ({})", repo.name, repo.url);
            if !repo.enabled {
                println!("  Repository is disabled");
            }
            Ok(())
        }
        Some(Commands::RepoList { all }) => {
            let conn = pkgsys::db::open(&cli.db_path)?;
            let repos = if *all {
                Repository::list_all(&conn)?
            } else {
                Repository::list_enabled(&conn)?
            };

            if repos.is_empty() {
                println!("No repositories configured.");
            } else {
                println!("Repositories:");
                for repo in &repos {
                    println!(
                        "  {} {} (priority {}){}",
                        repo.name,
                        repo.url,
                        repo.priority,
                        if repo.enabled { "" } else { " [disabled]" }
                    );
                    if let Some(last_sync) = &repo.last_sync {
                        println!("    Last loaded: {}", last_sync);
                    }
                }
            }
            Ok(())
        }
        Some(Commands::RepoRemove { name }) => {
            let conn = pkgsys::db::open(&cli.db_path)?;
            pkgsys::repository::remove_repository(&conn, name)?;
            println!("Removed repository: {}", name);
            Ok(())
        }
        Some(Commands::RepoEnable { name }) => {
            let conn = pkgsys::db::open(&cli.db_path)?;
            pkgsys::repository::set_repository_enabled(&conn, name, true)?;
            println!("Enabled repository: {}", name);
            Ok(())
        }
        Some(Commands::RepoDisable { name }) => {
            let conn = pkgsys::db::open(&cli.db_path)?;
            pkgsys::repository::set_repository_enabled(&conn, name, false)?;
            println!("Disabled repository: {}", name);
            Ok(())
        }
        Some(Commands::Query { pattern }) => {
            let conn = pkgsys::db::open(&cli.db_path)?;

            let troves = match pattern {
                Some(pattern) => Trove::search(&conn, pattern)?,
                None => Trove::list_all(&conn)?,
            };

            if troves.is_empty() {
                println!("No packages found.");
            } else {
                println!("Installed packages:");
                for trove in &troves {
                    print!("  {} {} ({})", trove.name, trove.version, trove.kind.as_str());
                    if let Some(arch) = &trove.architecture {
                        print!(" [{}]", arch);
                    }
                    println!();
                }
                println!("\nTotal: {} package(s)", troves.len());
            }

            Ok(())
        }
        Some(Commands::History) => {
            let conn = pkgsys::db::open(&cli.db_path)?;
            let changesets = Changeset::list_all(&conn)?;

            if changesets.is_empty() {
                println!("No changeset history.");
            } else {
                println!("Changeset history:");
                for changeset in &changesets {
                    let timestamp = changeset
                        .applied_at
                        .as_ref()
                        .or(changeset.created_at.as_ref())
                        .map(|s| s.as_str())
                        .unwrap_or("pending");

                    println!(
                        "  [{}] {} - {} ({})",
                        changeset.id.unwrap_or_default(),
                        timestamp,
                        changeset.description,
                        changeset.status.as_str()
                    );
                }
                println!("\nTotal: {} changeset(s)", changesets.len());
            }

            Ok(())
        }
        None => {
            println!("pkgsys Package System v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'pkgsys --help' for usage information");
            Ok(())
        }
    }
}
