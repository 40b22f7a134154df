// src/changeset.rs

//! The set of package names requested in one transaction

use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Package names requested for installation and removal
///
/// A name may not appear in both sets; construction rejects such a request
/// with [`Error::ConflictingChangeSet`] instead of picking a winner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    install: BTreeSet<String>,
    remove: BTreeSet<String>,
}

impl ChangeSet {
    /// Build a change-set, rejecting names requested for both sides
    pub fn new<I, R, S, T>(install: I, remove: R) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let install: BTreeSet<String> = install.into_iter().map(Into::into).collect();
        let remove: BTreeSet<String> = remove.into_iter().map(Into::into).collect();

        let overlap: Vec<String> = install.intersection(&remove).cloned().collect();
        if !overlap.is_empty() {
            return Err(Error::ConflictingChangeSet(overlap));
        }

        Ok(Self { install, remove })
    }

    /// Change-set that only installs
    pub fn install_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            install: names.into_iter().map(Into::into).collect(),
            remove: BTreeSet::new(),
        }
    }

    /// Change-set that only removes
    pub fn remove_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            install: BTreeSet::new(),
            remove: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_install(&self) -> &BTreeSet<String> {
        &self.install
    }

    pub fn to_remove(&self) -> &BTreeSet<String> {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty()
    }

    /// Names to install, in a stable order, for collaborator calls
    pub fn install_list(&self) -> Vec<String> {
        self.install.iter().cloned().collect()
    }
}
