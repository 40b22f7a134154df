// src/system.rs

//! Package transaction orchestrator
//!
//! Sequences one install/remove request through the collaborators:
//!
//! ```text
//! Idle -> LockAcquired -> Initialized -> LicenseGated -> Solved -> Committed -> Verified
//! ```
//!
//! Any phase may end the transaction with an [`Error`]; there is no retry.
//! The solver flags are overridden for the whole sequence and restored on
//! every exit path. Callers only see a `bool`, plus
//! [`PackageSystem::last_operation_canceled`] to tell a declined license
//! apart from a real failure.

use crate::changeset::ChangeSet;
use crate::config::SystemConfig;
use crate::confirm::{Confirmer, SelectionOutcome};
use crate::error::{Error, Result};
use crate::flags::{transaction_overrides, with_overridden_flags};
use crate::init::Initializer;
use crate::license::{self, GateDecision};
use crate::services::{LockService, PackageBackend, RuntimeEnvironment};
use crate::verify::verify_commit;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Progress of a running transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Idle,
    LockAcquired,
    Initialized,
    LicenseGated,
    Solved,
    Committed,
    Verified,
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionPhase::Idle => "idle",
            TransactionPhase::LockAcquired => "lock acquired",
            TransactionPhase::Initialized => "initialized",
            TransactionPhase::LicenseGated => "licenses confirmed",
            TransactionPhase::Solved => "solved",
            TransactionPhase::Committed => "committed",
            TransactionPhase::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// Entry point for installing and removing packages
pub struct PackageSystem<B, C> {
    config: SystemConfig,
    backend: B,
    confirmer: C,
    lock: Box<dyn LockService>,
    runtime: Box<dyn RuntimeEnvironment>,
    initializer: Initializer,
    last_operation_canceled: bool,
}

/// Borrowed context of one transaction
struct Transaction<'a, C: ?Sized> {
    config: &'a SystemConfig,
    confirmer: &'a mut C,
    lock: &'a mut dyn LockService,
    runtime: &'a mut dyn RuntimeEnvironment,
    initializer: &'a mut Initializer,
    canceled: &'a mut bool,
    phase: TransactionPhase,
}

impl<C: Confirmer + ?Sized> Transaction<'_, C> {
    fn run<B>(&mut self, backend: &mut B, changes: &ChangeSet) -> Result<()>
    where
        B: PackageBackend + ?Sized,
    {
        if !self.lock.acquire() {
            return Err(Error::LockUnavailable);
        }
        self.phase = TransactionPhase::LockAcquired;

        // sources first: target init may need repository keys
        if !self.initializer.ensure_source_init(self.lock, backend) {
            return Err(Error::LockUnavailable);
        }
        if !self.initializer.ensure_target_init(self.lock, backend) {
            warn!("Target database not initialized, the solver may lack installed state");
        }
        self.phase = TransactionPhase::Initialized;

        let to_install = changes.install_list();
        let decision = license::check_licenses(backend, self.confirmer, &to_install);
        *self.canceled = matches!(decision, GateDecision::Declined(_));
        decision.into_result()?;
        self.phase = TransactionPhase::LicenseGated;

        // install and remove are one intent: a failed install mark skips removals
        for name in changes.to_install() {
            if !backend.mark_install(name) {
                error!(
                    "Package {} cannot be selected for installation: {}",
                    name,
                    backend.last_error()
                );
                return Err(Error::PackageNotFound(name.clone()));
            }
        }
        for name in changes.to_remove() {
            if !backend.mark_remove(name) {
                error!("Package {} cannot be selected for removal: {}", name, backend.last_error());
                return Err(Error::PackageNotFound(name.clone()));
            }
        }

        if !backend.solve(false) {
            let problem = backend.last_error();
            self.confirmer
                .report_error(&format!("Package dependencies cannot be resolved: {}", problem));

            match self.confirmer.resolve_dependencies(&problem) {
                SelectionOutcome::Continue => {
                    info!("Continuing with the adjusted package selection")
                }
                SelectionOutcome::Cancel | SelectionOutcome::Close => {
                    return Err(Error::UnresolvedDependencies(problem));
                }
            }
        }
        self.phase = TransactionPhase::Solved;

        let selected = backend.selected_for_install();
        let result = backend.commit(0);
        self.phase = TransactionPhase::Committed;

        if let Some(result) = &result
            && !result.update_messages.is_empty()
        {
            self.confirmer.show_update_messages(&result.update_messages);
        }

        verify_commit(result.as_ref(), changes.to_install()).into_result()?;
        self.phase = TransactionPhase::Verified;

        if !selected.is_empty() {
            self.runtime.register_new_agents();
        }
        if self.config.informs_kernel_change() {
            self.runtime.inform_about_kernel_change(&selected);
        }

        Ok(())
    }
}

impl<B: PackageBackend, C: Confirmer> PackageSystem<B, C> {
    pub fn new<L, E>(config: SystemConfig, backend: B, confirmer: C, lock: L, runtime: E) -> Self
    where
        L: LockService + 'static,
        E: RuntimeEnvironment + 'static,
    {
        let initializer = Initializer::new(&config);
        Self {
            config,
            backend,
            confirmer,
            lock: Box::new(lock),
            runtime: Box::new(runtime),
            initializer,
            last_operation_canceled: false,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn confirmer(&self) -> &C {
        &self.confirmer
    }

    pub fn initializer(&self) -> &Initializer {
        &self.initializer
    }

    /// Whether the last `false` result came from the user declining a license
    pub fn last_operation_canceled(&self) -> bool {
        self.last_operation_canceled
    }

    pub fn ensure_target_init(&mut self) -> bool {
        self.initializer
            .ensure_target_init(self.lock.as_mut(), &mut self.backend)
    }

    pub fn ensure_source_init(&mut self) -> bool {
        self.initializer
            .ensure_source_init(self.lock.as_mut(), &mut self.backend)
    }

    /// Install `to_install` and remove `to_remove` as one transaction
    pub fn install_and_remove<I, R, S, T>(&mut self, to_install: I, to_remove: R) -> bool
    where
        I: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        match ChangeSet::new(to_install, to_remove) {
            Ok(changes) => self.transact(&changes),
            Err(e) => {
                error!("Rejected package request: {}", e);
                false
            }
        }
    }

    /// Run one transaction for `changes`
    pub fn transact(&mut self, changes: &ChangeSet) -> bool {
        if changes.is_empty() {
            debug!("Nothing to install or remove");
            return true;
        }

        info!(
            "Package transaction: install {:?}, remove {:?}",
            changes.to_install(),
            changes.to_remove()
        );

        let Self {
            config,
            backend,
            confirmer,
            lock,
            runtime,
            initializer,
            last_operation_canceled,
        } = self;

        let mut txn = Transaction {
            config,
            confirmer,
            lock: lock.as_mut(),
            runtime: runtime.as_mut(),
            initializer,
            canceled: last_operation_canceled,
            phase: TransactionPhase::Idle,
        };

        let result = with_overridden_flags(backend, &transaction_overrides(), |backend| {
            let result = txn.run(backend, changes);
            if result.is_err() {
                backend.reset_selection();
            }
            result
        });

        match result {
            Ok(()) => {
                info!("Package transaction finished");
                true
            }
            Err(Error::LicenseDeclined(packages)) => {
                info!("Package transaction canceled, license of {:?} declined", packages);
                false
            }
            Err(e) => {
                error!("Package transaction failed after phase '{}': {}", txn.phase, e);
                if matches!(
                    e,
                    Error::PackageNotFound(_) | Error::CommitFailed(_) | Error::PackageRemained(_)
                ) {
                    txn.confirmer.report_error(&e.to_string());
                }
                false
            }
        }
    }

    pub fn install(&mut self, package: &str) -> bool {
        self.install_all([package])
    }

    pub fn install_all<I, S>(&mut self, packages: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transact(&ChangeSet::install_only(packages))
    }

    pub fn remove(&mut self, package: &str) -> bool {
        self.remove_all([package])
    }

    pub fn remove_all<I, S>(&mut self, packages: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transact(&ChangeSet::remove_only(packages))
    }

    /// Fast check against the target database, no initialization
    pub fn installed(&mut self, package: &str) -> bool {
        self.backend.is_installed(package)
    }

    /// Installed check after making sure the target is initialized
    pub fn package_installed(&mut self, package: &str) -> bool {
        if !self.ensure_target_init() {
            warn!("Target not initialized while checking {}", package);
        }
        self.backend.is_installed(package)
    }

    pub fn packages_installed(&mut self, packages: &[String]) -> bool {
        packages.iter().all(|p| self.package_installed(p))
    }

    /// Whether an enabled repository provides `package`
    pub fn package_available(&mut self, package: &str) -> bool {
        if !self.ensure_source_init() {
            return false;
        }
        self.backend.is_available(package)
    }

    pub fn packages_available(&mut self, packages: &[String]) -> bool {
        packages.iter().all(|p| self.package_available(p))
    }

    fn missing_packages(&mut self, packages: &[String]) -> Vec<String> {
        packages
            .iter()
            .filter(|p| !self.package_installed(p))
            .cloned()
            .collect()
    }

    /// Install those of `packages` that are not installed yet
    pub fn check_and_install_packages(&mut self, packages: &[String]) -> bool {
        let missing = self.missing_packages(packages);
        if missing.is_empty() {
            debug!("All of {:?} already installed", packages);
            return true;
        }
        self.install_all(missing)
    }

    /// Like [`check_and_install_packages`](Self::check_and_install_packages),
    /// but asks before installing anything
    pub fn check_and_install_packages_interactive(&mut self, packages: &[String]) -> bool {
        let missing = self.missing_packages(packages);
        if missing.is_empty() {
            return true;
        }

        if !self.confirmer.confirm_install(&missing) {
            self.confirmer.report_error(&format!(
                "Required packages were not installed: {}",
                missing.join(", ")
            ));
            return false;
        }

        self.install_all(missing)
    }
}
