// src/testing.rs

//! Recording collaborators for unit tests

use crate::confirm::{Confirmer, SelectionOutcome};
use crate::flags::SolverFlags;
use crate::license::LicenseSet;
use crate::services::{
    LockService, PackageId, RepoId, RepositoryService, RuntimeEnvironment, SolverService,
};
use crate::verify::{CommitResult, UpdateMessage};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// In-memory backend recording every call
#[derive(Debug)]
pub struct MockBackend {
    pub repositories: Vec<(RepoId, bool)>,
    pub installed: BTreeSet<PackageId>,
    pub available: BTreeSet<PackageId>,
    pub unknown: BTreeSet<PackageId>,
    pub licenses: LicenseSet,
    pub flags: SolverFlags,
    pub target_init_ok: bool,
    pub solve_ok: bool,
    pub commit_result: Option<CommitResult>,

    pub cache_starts: Vec<bool>,
    pub target_inits: Vec<PathBuf>,
    pub confirmed_licenses: Vec<PackageId>,
    pub marked_install: Vec<PackageId>,
    pub marked_remove: Vec<PackageId>,
    pub selection: Vec<PackageId>,
    pub selection_resets: usize,
    pub solves: usize,
    pub flags_at_solve: Option<SolverFlags>,
    pub commits: usize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            repositories: Vec::new(),
            installed: BTreeSet::new(),
            available: BTreeSet::new(),
            unknown: BTreeSet::new(),
            licenses: LicenseSet::new(),
            flags: SolverFlags::new(),
            target_init_ok: true,
            solve_ok: true,
            commit_result: Some(CommitResult::default()),
            cache_starts: Vec::new(),
            target_inits: Vec::new(),
            confirmed_licenses: Vec::new(),
            marked_install: Vec::new(),
            marked_remove: Vec::new(),
            selection: Vec::new(),
            selection_resets: 0,
            solves: 0,
            flags_at_solve: None,
            commits: 0,
        }
    }

    pub fn with_repository(mut self, name: &str, enabled: bool) -> Self {
        self.repositories.push((name.to_string(), enabled));
        self
    }

    pub fn with_license(mut self, package: &str, text: &str) -> Self {
        self.licenses.insert(package.to_string(), text.to_string());
        self
    }

    pub fn with_installed(mut self, package: &str) -> Self {
        self.installed.insert(package.to_string());
        self
    }

    pub fn with_available(mut self, package: &str) -> Self {
        self.available.insert(package.to_string());
        self
    }

    /// Marks of `package` fail
    pub fn with_unknown(mut self, package: &str) -> Self {
        self.unknown.insert(package.to_string());
        self
    }
}

impl RepositoryService for MockBackend {
    fn list_repositories(&mut self, enabled_only: bool) -> Vec<RepoId> {
        self.repositories
            .iter()
            .filter(|(_, enabled)| *enabled || !enabled_only)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn start_cache(&mut self, load_sources: bool) {
        self.cache_starts.push(load_sources);
    }

    fn target_init(&mut self, root: &Path, _rebuild: bool) -> bool {
        self.target_inits.push(root.to_path_buf());
        self.target_init_ok
    }

    fn is_installed(&mut self, name: &str) -> bool {
        self.installed.contains(name)
    }
}

impl SolverService for MockBackend {
    fn flags(&self) -> SolverFlags {
        self.flags.clone()
    }

    fn set_flags(&mut self, flags: SolverFlags) {
        self.flags = flags;
    }

    fn licenses_to_confirm(&mut self, packages: &[PackageId]) -> LicenseSet {
        self.licenses
            .iter()
            .filter(|(name, _)| packages.contains(name))
            .map(|(name, text)| (name.clone(), text.clone()))
            .collect()
    }

    fn mark_license_confirmed(&mut self, package: &str) {
        self.confirmed_licenses.push(package.to_string());
    }

    fn mark_install(&mut self, package: &str) -> bool {
        if self.unknown.contains(package) {
            return false;
        }
        self.marked_install.push(package.to_string());
        self.selection.push(package.to_string());
        true
    }

    fn mark_remove(&mut self, package: &str) -> bool {
        if self.unknown.contains(package) {
            return false;
        }
        self.marked_remove.push(package.to_string());
        true
    }

    fn reset_selection(&mut self) {
        self.selection.clear();
        self.selection_resets += 1;
    }

    fn solve(&mut self, _filter_conflicts: bool) -> bool {
        self.solves += 1;
        self.flags_at_solve = Some(self.flags.clone());
        self.solve_ok
    }

    fn last_error(&self) -> String {
        if self.solve_ok {
            String::new()
        } else {
            "nothing provides libfoo.so".to_string()
        }
    }

    fn selected_for_install(&self) -> Vec<PackageId> {
        self.selection.clone()
    }

    fn is_available(&mut self, name: &str) -> bool {
        self.available.contains(name)
    }

    fn commit(&mut self, _medium: u32) -> Option<CommitResult> {
        self.commits += 1;
        self.selection.clear();
        self.commit_result.clone()
    }
}

/// Lock that is either free or held by another process
#[derive(Debug)]
pub struct MockLock {
    pub available: bool,
    pub attempts: usize,
}

impl MockLock {
    pub fn free() -> Self {
        Self {
            available: true,
            attempts: 0,
        }
    }

    pub fn held_elsewhere() -> Self {
        Self {
            available: false,
            attempts: 0,
        }
    }
}

impl LockService for MockLock {
    fn acquire(&mut self) -> bool {
        self.attempts += 1;
        self.available
    }
}

/// Confirmer answering from fields and recording what it was shown
#[derive(Debug)]
pub struct RecordingConfirmer {
    pub accept_licenses: bool,
    pub install_missing: bool,
    pub resolution: SelectionOutcome,
    pub licenses_shown: Vec<PackageId>,
    pub errors: Vec<String>,
    pub messages: Vec<UpdateMessage>,
    pub resolutions: usize,
}

impl RecordingConfirmer {
    pub fn accepting() -> Self {
        Self {
            accept_licenses: true,
            install_missing: true,
            resolution: SelectionOutcome::Continue,
            licenses_shown: Vec::new(),
            errors: Vec::new(),
            messages: Vec::new(),
            resolutions: 0,
        }
    }

    pub fn declining() -> Self {
        Self {
            accept_licenses: false,
            resolution: SelectionOutcome::Cancel,
            ..Self::accepting()
        }
    }
}

impl Confirmer for RecordingConfirmer {
    fn confirm_license(&mut self, package: &str, _license: &str) -> bool {
        self.licenses_shown.push(package.to_string());
        self.accept_licenses
    }

    fn confirm_install(&mut self, _packages: &[String]) -> bool {
        self.install_missing
    }

    fn report_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn show_update_messages(&mut self, messages: &[UpdateMessage]) {
        self.messages.extend_from_slice(messages);
    }

    fn resolve_dependencies(&mut self, _problem: &str) -> SelectionOutcome {
        self.resolutions += 1;
        self.resolution
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    AgentsRegistered,
    KernelChange(Vec<PackageId>),
}

/// Runtime whose events stay observable after it was moved into a system
#[derive(Debug, Clone, Default)]
pub struct RecordingRuntime {
    events: Rc<RefCell<Vec<RuntimeEvent>>>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.events.borrow().clone()
    }
}

impl RuntimeEnvironment for RecordingRuntime {
    fn register_new_agents(&mut self) {
        self.events.borrow_mut().push(RuntimeEvent::AgentsRegistered);
    }

    fn inform_about_kernel_change(&mut self, installed: &[PackageId]) {
        self.events
            .borrow_mut()
            .push(RuntimeEvent::KernelChange(installed.to_vec()));
    }
}
