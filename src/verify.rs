// src/verify.rs

//! Interpretation of commit results
//!
//! The package manager may report overall success while individually
//! requested packages silently stayed pending, so a commit is only trusted
//! when nothing failed and no requested package remains.

use crate::error::{Error, Result};
use crate::services::PackageId;
use std::collections::BTreeSet;
use tracing::{error, warn};

/// Message a package wants shown to the user after it was installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    pub package: PackageId,
    pub text: String,
}

/// Outcome of one commit call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// Number of packages successfully installed or removed
    pub successful: usize,
    /// Packages the commit failed on
    pub failed: Vec<PackageId>,
    /// Packages still pending after the commit
    pub remaining: Vec<PackageId>,
    /// Source packages still pending after the commit
    pub source_remaining: Vec<PackageId>,
    pub update_messages: Vec<UpdateMessage>,
}

impl CommitResult {
    /// Result for a commit where every step succeeded
    pub fn succeeded(successful: usize) -> Self {
        Self {
            successful,
            ..Self::default()
        }
    }
}

/// Verdict over a commit result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    /// No result at all, or some packages failed
    Failed { failed: Vec<PackageId> },
    /// The commit reported success but requested packages are still pending
    Remained { packages: Vec<PackageId> },
}

impl Verdict {
    pub fn into_result(self) -> Result<()> {
        match self {
            Verdict::Succeeded => Ok(()),
            Verdict::Failed { failed } => Err(Error::CommitFailed(failed)),
            Verdict::Remained { packages } => Err(Error::PackageRemained(packages)),
        }
    }
}

/// Judge a commit against the names that were requested for installation
pub fn verify_commit(result: Option<&CommitResult>, to_install: &BTreeSet<String>) -> Verdict {
    let Some(result) = result else {
        error!("Commit returned no result");
        return Verdict::Failed { failed: Vec::new() };
    };

    if !result.failed.is_empty() {
        error!("Commit failed for packages: {:?}", result.failed);
        return Verdict::Failed {
            failed: result.failed.clone(),
        };
    }

    let remained: Vec<PackageId> = result
        .remaining
        .iter()
        .filter(|name| to_install.contains(name.as_str()))
        .cloned()
        .collect();

    if !remained.is_empty() {
        warn!(
            "Packages requested for installation are still pending after commit: {:?}",
            remained
        );
        return Verdict::Remained { packages: remained };
    }

    Verdict::Succeeded
}
