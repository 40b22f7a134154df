// src/runtime.rs

//! Notifications to the running system after packages were installed

use crate::services::{PackageId, RuntimeEnvironment};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Marker file, relative to the root, requesting a reboot
pub const REBOOT_MARKER: &str = "run/reboot-needed";

/// Whether `package` ships a kernel
pub fn is_kernel_package(package: &str) -> bool {
    package == "kernel"
        || (package.starts_with("kernel-") && !package.starts_with("kernel-firmware"))
}

/// Runtime environment of the target root
#[derive(Debug, Clone)]
pub struct SystemRuntime {
    root: PathBuf,
    agent_refreshes: usize,
}

impl SystemRuntime {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            agent_refreshes: 0,
        }
    }

    pub fn reboot_marker(&self) -> PathBuf {
        self.root.join(REBOOT_MARKER)
    }

    pub fn agent_refreshes(&self) -> usize {
        self.agent_refreshes
    }

    fn write_marker(path: &Path, kernels: &[&PackageId]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let names: Vec<&str> = kernels.iter().map(|k| k.as_str()).collect();
        fs::write(path, format!("{}\n", names.join("\n")))
    }
}

impl RuntimeEnvironment for SystemRuntime {
    fn register_new_agents(&mut self) {
        self.agent_refreshes += 1;
        info!("Registering agents shipped by newly installed packages");
    }

    fn inform_about_kernel_change(&mut self, installed: &[PackageId]) {
        let kernels: Vec<&PackageId> = installed.iter().filter(|p| is_kernel_package(p)).collect();
        if kernels.is_empty() {
            return;
        }

        let marker = self.reboot_marker();
        match Self::write_marker(&marker, &kernels) {
            Ok(()) => info!("Kernel changed ({:?}), reboot required", kernels),
            Err(e) => warn!("Failed to write reboot marker {}: {}", marker.display(), e),
        }
    }
}
