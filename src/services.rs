// src/services.rs

//! Contracts for the subsystems the package system drives
//!
//! The orchestrator only sequences calls to these collaborators. Each call
//! reports failure as a plain value (`bool` or `Option`); implementations
//! log their own diagnostics and expose the solver's last message through
//! [`SolverService::last_error`].

use crate::flags::SolverFlags;
use crate::license::LicenseSet;
use crate::verify::CommitResult;
use std::path::Path;

/// Package name as understood by the solver
pub type PackageId = String;

/// Repository identifier (alias or name)
pub type RepoId = String;

/// Advisory system-wide package lock
pub trait LockService {
    /// Acquire the lock, or confirm it is already held by this process
    ///
    /// Never blocks and never breaks a lock held by another process.
    fn acquire(&mut self) -> bool;
}

/// Repository cache and target database
pub trait RepositoryService {
    /// Configured repositories, optionally only the enabled ones
    fn list_repositories(&mut self, enabled_only: bool) -> Vec<RepoId>;

    /// Start the repository cache; `load_sources` also loads enabled repositories
    fn start_cache(&mut self, load_sources: bool);

    /// Initialize the target package database under `root`
    fn target_init(&mut self, root: &Path, rebuild: bool) -> bool;

    /// Direct query against the target database, no initialization required
    fn is_installed(&mut self, name: &str) -> bool;
}

/// Dependency solver and transactional commit
pub trait SolverService {
    fn flags(&self) -> SolverFlags;

    fn set_flags(&mut self, flags: SolverFlags);

    /// Licenses of `packages` that still need explicit confirmation
    fn licenses_to_confirm(&mut self, packages: &[PackageId]) -> LicenseSet;

    fn mark_license_confirmed(&mut self, package: &str);

    fn mark_install(&mut self, package: &str) -> bool;

    fn mark_remove(&mut self, package: &str) -> bool;

    /// Drop every pending install/remove mark
    fn reset_selection(&mut self);

    /// Resolve the current selection; `filter_conflicts` drops conflicting items
    fn solve(&mut self, filter_conflicts: bool) -> bool;

    /// Human readable description of the last solver problem
    fn last_error(&self) -> String;

    /// Packages and patches the last solve selected for installation
    fn selected_for_install(&self) -> Vec<PackageId>;

    /// Whether any enabled repository provides `name`
    fn is_available(&mut self, name: &str) -> bool;

    /// Apply the solved plan; `medium` 0 commits from every medium
    fn commit(&mut self, medium: u32) -> Option<CommitResult>;
}

/// The running system the packages land in
pub trait RuntimeEnvironment {
    /// Newly installed packages may ship agents that must be registered
    fn register_new_agents(&mut self);

    /// Let the system react when `installed` contains a new kernel
    fn inform_about_kernel_change(&mut self, installed: &[PackageId]);
}

/// Combined repository and solver backend
pub trait PackageBackend: RepositoryService + SolverService {}

impl<T: RepositoryService + SolverService> PackageBackend for T {}

impl<L: LockService + ?Sized> LockService for Box<L> {
    fn acquire(&mut self) -> bool {
        (**self).acquire()
    }
}

impl<R: RuntimeEnvironment + ?Sized> RuntimeEnvironment for Box<R> {
    fn register_new_agents(&mut self) {
        (**self).register_new_agents()
    }

    fn inform_about_kernel_change(&mut self, installed: &[PackageId]) {
        (**self).inform_about_kernel_change(installed)
    }
}
