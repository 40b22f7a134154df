// src/init.rs

//! Readiness of the target database and the repository cache
//!
//! Both states only move forward and re-running an initialization that
//! already happened is a no-op. The two policy exceptions (no target init
//! in an unmounted first stage, no target init when no repository is
//! configured at all) are expressed as guards on the transitions.

use crate::config::SystemConfig;
use crate::services::{LockService, RepositoryService};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Repository cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RepositoryState {
    Uninitialized,
    /// Cache started without any repository
    CacheStarted,
    SourcesInitialized,
}

/// Target database state, never torn down once initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Uninitialized,
    Initialized,
}

/// Guard for the target transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetGuard {
    AlreadyInitialized,
    /// First stage with no live root mounted
    SkippedEarlyStage,
    Proceed,
}

/// Guard for the repository transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceGuard {
    AlreadyInitialized,
    /// No repository configured, not even a disabled one
    NoRepositories,
    Load,
}

/// Drives the target and repository state machines
#[derive(Debug)]
pub struct Initializer {
    root: PathBuf,
    skip_target_init: bool,
    repository: RepositoryState,
    target: TargetState,
}

impl Initializer {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            root: config.root.clone(),
            skip_target_init: config.skip_target_init(),
            repository: RepositoryState::Uninitialized,
            target: TargetState::Uninitialized,
        }
    }

    pub fn repository_state(&self) -> RepositoryState {
        self.repository
    }

    pub fn target_state(&self) -> TargetState {
        self.target
    }

    fn target_guard(&self) -> TargetGuard {
        if self.target == TargetState::Initialized {
            TargetGuard::AlreadyInitialized
        } else if self.skip_target_init {
            TargetGuard::SkippedEarlyStage
        } else {
            TargetGuard::Proceed
        }
    }

    fn source_guard(&self, configured: &[String]) -> SourceGuard {
        if self.repository == RepositoryState::SourcesInitialized {
            SourceGuard::AlreadyInitialized
        } else if configured.is_empty() {
            SourceGuard::NoRepositories
        } else {
            SourceGuard::Load
        }
    }

    /// Make sure the target database can be queried
    ///
    /// Returns `false` when the lock is unavailable or the target failed to
    /// initialize; the state then stays `Uninitialized`.
    pub fn ensure_target_init<L, R>(&mut self, lock: &mut L, repos: &mut R) -> bool
    where
        L: LockService + ?Sized,
        R: RepositoryService + ?Sized,
    {
        match self.target_guard() {
            TargetGuard::AlreadyInitialized => return true,
            TargetGuard::SkippedEarlyStage => {
                debug!("Root filesystem not mounted yet, skipping target initialization");
                return true;
            }
            TargetGuard::Proceed => {}
        }

        if !lock.acquire() {
            warn!("Package system lock unavailable, cannot initialize target");
            return false;
        }

        if repos.target_init(&self.root, false) {
            info!("Target initialized at {}", self.root.display());
            self.target = TargetState::Initialized;
            true
        } else {
            warn!("Failed to initialize target at {}", self.root.display());
            false
        }
    }

    /// Make sure repositories can be queried
    ///
    /// Only a missing lock is reported as `false`. Lacking enabled
    /// repositories is logged and left for the solver to surface.
    pub fn ensure_source_init<L, R>(&mut self, lock: &mut L, repos: &mut R) -> bool
    where
        L: LockService + ?Sized,
        R: RepositoryService + ?Sized,
    {
        if !lock.acquire() {
            warn!("Package system lock unavailable, cannot initialize repositories");
            return false;
        }

        let configured = if self.repository == RepositoryState::SourcesInitialized {
            Vec::new()
        } else {
            repos.list_repositories(false)
        };

        match self.source_guard(&configured) {
            SourceGuard::AlreadyInitialized => return true,
            SourceGuard::NoRepositories => {
                if self.repository == RepositoryState::Uninitialized {
                    debug!("No repositories configured, starting empty cache");
                    repos.start_cache(false);
                    self.repository = RepositoryState::CacheStarted;
                }
                return true;
            }
            SourceGuard::Load => {}
        }

        // repository metadata needs the target's trusted keys
        if self.target == TargetState::Uninitialized && !self.ensure_target_init(lock, repos) {
            warn!("Target not initialized, repository keys may be missing");
        }

        repos.start_cache(true);
        self.repository = RepositoryState::SourcesInitialized;

        let enabled = repos.list_repositories(true);
        if enabled.is_empty() {
            warn!(
                "No enabled repository among {} configured: {:?}",
                configured.len(),
                configured
            );
        } else {
            info!("Repositories initialized: {:?}", enabled);
        }

        true
    }
}
