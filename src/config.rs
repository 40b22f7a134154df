// src/config.rs

//! Process-level settings for the package system
//!
//! There are no configuration files: repositories and installed packages
//! live in the database, and everything else comes from the command line.

use std::path::PathBuf;

/// Default database path
pub const DEFAULT_DB_PATH: &str = "/var/lib/pkgsys/pkgsys.db";

/// Default path of the system-wide package lock
pub const DEFAULT_LOCK_PATH: &str = "/var/run/pkgsys.lock";

/// Phase of the machine's lifecycle the process runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallStage {
    /// First installation stage, the target may not be mounted yet
    Initial,
    /// Continuation of the installation after the first reboot
    Continue,
    /// Installed, running system
    #[default]
    Normal,
}

/// How questions are put to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presentation {
    /// Prompt on the terminal
    #[default]
    Interactive,
    /// Never prompt, answer from fixed decisions
    Scripted {
        accept_licenses: bool,
        accept_solver_proposal: bool,
    },
}

impl Presentation {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Presentation::Interactive)
    }
}

/// Settings shared by the package system components
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Root of the target system
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
    pub stage: InstallStage,
    /// Whether a live root filesystem is mounted at `root`
    pub target_mounted: bool,
    pub presentation: Presentation,
}

impl SystemConfig {
    pub fn new(root: PathBuf, db_path: PathBuf) -> Self {
        Self {
            root,
            db_path,
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
            stage: InstallStage::Normal,
            target_mounted: true,
            presentation: Presentation::Interactive,
        }
    }

    pub fn with_stage(mut self, stage: InstallStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_lock_path(mut self, lock_path: PathBuf) -> Self {
        self.lock_path = lock_path;
        self
    }

    pub fn with_target_mounted(mut self, mounted: bool) -> Self {
        self.target_mounted = mounted;
        self
    }

    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    /// Target initialization is skipped in the first stage without a mounted root
    pub fn skip_target_init(&self) -> bool {
        self.stage == InstallStage::Initial && !self.target_mounted
    }

    /// Kernel changes are only announced on an installed system
    pub fn informs_kernel_change(&self) -> bool {
        self.stage == InstallStage::Normal
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("/"), PathBuf::from(DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_target_init_only_in_unmounted_initial_stage() {
        let config = SystemConfig::default();
        assert!(!config.skip_target_init());

        let config = config.with_stage(InstallStage::Initial);
        assert!(!config.skip_target_init());

        let config = config.with_target_mounted(false);
        assert!(config.skip_target_init());

        let config = config.with_stage(InstallStage::Continue);
        assert!(!config.skip_target_init());
    }

    #[test]
    fn test_kernel_change_outside_installation() {
        assert!(SystemConfig::default().informs_kernel_change());
        assert!(!SystemConfig::default()
            .with_stage(InstallStage::Initial)
            .informs_kernel_change());
        assert!(!SystemConfig::default()
            .with_stage(InstallStage::Continue)
            .informs_kernel_change());
    }

    #[test]
    fn test_presentation_defaults_to_interactive() {
        let config = SystemConfig::default();
        assert!(config.presentation.is_interactive());

        let config = config.with_presentation(Presentation::Scripted {
            accept_licenses: true,
            accept_solver_proposal: false,
        });
        assert!(!config.presentation.is_interactive());
    }
}
