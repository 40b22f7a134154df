// src/backend.rs

//! SQLite-backed repository and solver services
//!
//! Repositories, the available-package index, installed packages and the
//! changeset history all live in one database. The solver is deliberately
//! small: it resolves by package name, follows `requires` transitively,
//! pulls `recommends` according to the solver flags, and refuses removals
//! that would leave an installed package without a requirement.

use crate::db::models::{Changeset, ChangesetStatus, Repository, RepositoryPackage, Trove};
use crate::db::{self, schema};
use crate::error::Result;
use crate::flags::{IGNORE_ALREADY_RECOMMENDED, ONLY_REQUIRES, SolverFlags};
use crate::license::LicenseSet;
use crate::repository::{self, RepositoryClient};
use crate::services::{PackageId, RepoId, RepositoryService, SolverService};
use crate::verify::{CommitResult, UpdateMessage};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Outcome of the last solve
#[derive(Debug, Clone, Default)]
struct Plan {
    install: BTreeMap<PackageId, RepositoryPackage>,
    remove: BTreeSet<PackageId>,
}

/// Package backend on top of the pkgsys database
pub struct SqliteBackend {
    conn: Connection,
    client: Option<RepositoryClient>,
    flags: SolverFlags,
    install: BTreeSet<PackageId>,
    remove: BTreeSet<PackageId>,
    confirmed: BTreeSet<PackageId>,
    plan: Option<Plan>,
    last_error: String,
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `db_path`
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        db::init(&db_path)?;
        let conn = db::open(&db_path)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already migrated
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            client: None,
            flags: SolverFlags::new(),
            install: BTreeSet::new(),
            remove: BTreeSet::new(),
            confirmed: BTreeSet::new(),
            plan: None,
            last_error: String::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn client(&mut self) -> Option<&RepositoryClient> {
        if self.client.is_none() {
            match RepositoryClient::new() {
                Ok(client) => self.client = Some(client),
                Err(e) => {
                    warn!("Cannot load remote repositories: {}", e);
                    return None;
                }
            }
        }
        self.client.as_ref()
    }

    fn candidate(&self, name: &str) -> Option<RepositoryPackage> {
        match RepositoryPackage::find_best_enabled(&self.conn, name) {
            Ok(pkg) => pkg,
            Err(e) => {
                error!("Failed to look up {}: {}", name, e);
                None
            }
        }
    }

    fn installed_trove(&self, name: &str) -> Option<Trove> {
        match Trove::find_by_name(&self.conn, name) {
            Ok(trove) => trove,
            Err(e) => {
                error!("Failed to query installed package {}: {}", name, e);
                None
            }
        }
    }

    /// Compute the plan for the current selection, collecting problems
    fn resolve(&self) -> (Plan, Vec<String>) {
        let only_requires = self.flags.is_set(ONLY_REQUIRES);
        let ignore_already_recommended = self.flags.is_set(IGNORE_ALREADY_RECOMMENDED);

        let mut plan = Plan {
            install: BTreeMap::new(),
            remove: self.remove.clone(),
        };
        let mut problems = Vec::new();

        // (name, optional) where optional marks a recommendation
        let mut queue: VecDeque<(PackageId, bool)> =
            self.install.iter().map(|name| (name.clone(), false)).collect();

        while let Some((name, optional)) = queue.pop_front() {
            if plan.install.contains_key(&name) {
                continue;
            }

            let requested = self.install.contains(&name);
            let installed = self.installed_trove(&name).is_some();

            if self.remove.contains(&name) {
                if !optional {
                    problems.push(format!("{} is required but marked for removal", name));
                }
                continue;
            }
            if installed && !requested {
                continue;
            }

            let Some(pkg) = self.candidate(&name) else {
                if !optional {
                    problems.push(format!("nothing provides {}", name));
                }
                continue;
            };

            for req in pkg.requires_list() {
                queue.push_back((req, false));
            }
            if !only_requires && !(ignore_already_recommended && installed) {
                for rec in pkg.recommends_list() {
                    queue.push_back((rec, true));
                }
            }

            plan.install.insert(name, pkg);
        }

        if !plan.remove.is_empty() {
            match Trove::list_all(&self.conn) {
                Ok(troves) => {
                    for trove in troves.iter().filter(|t| !plan.remove.contains(&t.name)) {
                        for req in trove.requires_list() {
                            if plan.remove.contains(&req) && !plan.install.contains_key(&req) {
                                problems.push(format!(
                                    "{} requires {}, which is marked for removal",
                                    trove.name, req
                                ));
                            }
                        }
                    }
                }
                Err(e) => problems.push(format!("cannot read installed packages: {}", e)),
            }
        }

        (plan, problems)
    }

    fn clear_selection(&mut self) {
        self.install.clear();
        self.remove.clear();
        self.confirmed.clear();
        self.plan = None;
    }

    fn apply(&mut self, plan: &Plan) -> Result<CommitResult> {
        let requested = self.install.clone();
        let confirmed = self.confirmed.clone();

        let mut summary: Vec<String> = Vec::new();
        if !plan.install.is_empty() {
            let names: Vec<&str> = plan.install.keys().map(String::as_str).collect();
            summary.push(format!("Install {}", names.join(", ")));
        }
        if !plan.remove.is_empty() {
            let names: Vec<&str> = plan.remove.iter().map(String::as_str).collect();
            summary.push(format!("Remove {}", names.join(", ")));
        }

        db::transaction(&mut self.conn, |tx| {
            let mut changeset = Changeset::new(summary.join("; "));
            let changeset_id = changeset.insert(tx)?;
            let mut result = CommitResult::default();

            for (name, pkg) in &plan.install {
                if pkg.license.is_some() && requested.contains(name) && !confirmed.contains(name) {
                    warn!("License of {} was not confirmed, skipping", name);
                    result.failed.push(name.clone());
                    continue;
                }

                let mut trove = Trove::from_repository_package(pkg);
                trove.installed_by_changeset_id = Some(changeset_id);
                trove.insert(tx)?;
                result.successful += 1;

                if let Some(text) = &pkg.update_message {
                    result.update_messages.push(UpdateMessage {
                        package: name.clone(),
                        text: text.clone(),
                    });
                }
            }

            for name in &plan.remove {
                if Trove::delete_by_name(tx, name)? {
                    result.successful += 1;
                } else {
                    debug!("{} was not installed, nothing to remove", name);
                }
            }

            let status = if result.failed.is_empty() {
                ChangesetStatus::Applied
            } else {
                ChangesetStatus::Failed
            };
            changeset.update_status(tx, status)?;

            Ok(result)
        })
    }
}

impl RepositoryService for SqliteBackend {
    fn list_repositories(&mut self, enabled_only: bool) -> Vec<RepoId> {
        let repos = if enabled_only {
            Repository::list_enabled(&self.conn)
        } else {
            Repository::list_all(&self.conn)
        };

        match repos {
            Ok(repos) => repos.into_iter().map(|r| r.name).collect(),
            Err(e) => {
                error!("Failed to list repositories: {}", e);
                Vec::new()
            }
        }
    }

    fn start_cache(&mut self, load_sources: bool) {
        if !load_sources {
            debug!("Repository cache started without sources");
            return;
        }

        let repos = match Repository::list_enabled(&self.conn) {
            Ok(repos) => repos,
            Err(e) => {
                error!("Failed to list enabled repositories: {}", e);
                return;
            }
        };

        let stale: Vec<Repository> = repos.into_iter().filter(repository::needs_sync).collect();
        if stale.is_empty() || self.client().is_none() {
            return;
        }
        let Some(client) = self.client.as_ref() else {
            return;
        };

        for mut repo in stale {
            if let Err(e) = repository::sync_repository(&mut self.conn, client, &mut repo) {
                warn!("Failed to load repository {}, keeping its previous index: {}", repo.name, e);
            }
        }
    }

    fn target_init(&mut self, root: &Path, rebuild: bool) -> bool {
        if !root.is_dir() {
            warn!("Target root {} is not a directory", root.display());
            return false;
        }

        if let Err(e) = schema::migrate(&self.conn) {
            error!("Failed to prepare target database: {}", e);
            return false;
        }

        if rebuild
            && let Err(e) = self.conn.execute_batch("REINDEX;")
        {
            error!("Failed to rebuild target database: {}", e);
            return false;
        }

        info!("Target database ready for {}", root.display());
        true
    }

    fn is_installed(&mut self, name: &str) -> bool {
        self.installed_trove(name).is_some()
    }
}

impl SolverService for SqliteBackend {
    fn flags(&self) -> SolverFlags {
        self.flags.clone()
    }

    fn set_flags(&mut self, flags: SolverFlags) {
        self.flags = flags;
    }

    fn licenses_to_confirm(&mut self, packages: &[PackageId]) -> LicenseSet {
        packages
            .iter()
            .filter(|name| !self.confirmed.contains(*name))
            .filter_map(|name| {
                self.candidate(name)
                    .and_then(|pkg| pkg.license.map(|text| (name.clone(), text)))
            })
            .collect()
    }

    fn mark_license_confirmed(&mut self, package: &str) {
        self.confirmed.insert(package.to_string());
    }

    fn mark_install(&mut self, package: &str) -> bool {
        if self.candidate(package).is_none() {
            self.last_error =
                format!("Package {} is not available from any enabled repository", package);
            return false;
        }
        self.plan = None;
        self.install.insert(package.to_string());
        true
    }

    fn mark_remove(&mut self, package: &str) -> bool {
        if self.installed_trove(package).is_none() {
            self.last_error = format!("Package {} is not installed", package);
            return false;
        }
        self.plan = None;
        self.remove.insert(package.to_string());
        true
    }

    fn reset_selection(&mut self) {
        debug!("Resetting package selection");
        self.clear_selection();
    }

    fn solve(&mut self, filter_conflicts: bool) -> bool {
        let (plan, problems) = self.resolve();
        debug!(
            "Solved: install {:?}, remove {:?} (filter_conflicts = {})",
            plan.install.keys().collect::<Vec<_>>(),
            plan.remove,
            filter_conflicts
        );
        self.plan = Some(plan);

        if problems.is_empty() {
            self.last_error.clear();
            true
        } else {
            self.last_error = problems.join("\n");
            false
        }
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn selected_for_install(&self) -> Vec<PackageId> {
        match &self.plan {
            Some(plan) => plan.install.keys().cloned().collect(),
            None => self.install.iter().cloned().collect(),
        }
    }

    fn is_available(&mut self, name: &str) -> bool {
        self.candidate(name).is_some()
    }

    fn commit(&mut self, medium: u32) -> Option<CommitResult> {
        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => {
                self.solve(false);
                self.plan.take().unwrap_or_default()
            }
        };

        debug!("Committing from medium {}", medium);
        let result = self.apply(&plan);
        self.clear_selection();

        match result {
            Ok(result) => {
                info!(
                    "Committed {} change(s), {} failed",
                    result.successful,
                    result.failed.len()
                );
                Some(result)
            }
            Err(e) => {
                error!("Commit failed: {}", e);
                None
            }
        }
    }
}
