// src/flags.rs

//! Solver configuration and the scope that overrides it for one transaction
//!
//! The solver owns its flags. A transaction borrows the solver through a
//! [`SolverFlagScope`], which applies overrides on entry and puts the exact
//! previous flags back when dropped, so every exit path (error, early
//! return, panic) restores the ambient configuration.

use crate::services::SolverService;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Do not pull recommended packages for items that are already installed
pub const IGNORE_ALREADY_RECOMMENDED: &str = "ignore_already_recommended";

/// Only follow hard requirements, never recommendations
pub const ONLY_REQUIRES: &str = "only_requires";

/// Key/value configuration biasing the solver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverFlags {
    values: BTreeMap<String, bool>,
}

impl SolverFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, key: &str, value: bool) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.values.get(key).copied()
    }

    /// Flag value, treating an unset flag as `false`
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).unwrap_or(false)
    }

    /// Overlay `overrides` on top of these flags
    pub fn merge(&mut self, overrides: &SolverFlags) {
        for (key, value) in &overrides.values {
            self.values.insert(key.clone(), *value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Overrides applied to every package transaction
pub fn transaction_overrides() -> SolverFlags {
    SolverFlags::new().with(IGNORE_ALREADY_RECOMMENDED, true)
}

/// Exclusive borrow of a solver with temporarily overridden flags
///
/// Dereferences to the solver. Nesting scopes on the same solver is not
/// supported.
pub struct SolverFlagScope<'a, S: SolverService + ?Sized> {
    solver: &'a mut S,
    saved: SolverFlags,
}

impl<'a, S: SolverService + ?Sized> SolverFlagScope<'a, S> {
    /// Save the current flags and apply `overrides`
    pub fn enter(solver: &'a mut S, overrides: &SolverFlags) -> Self {
        let saved = solver.flags();
        let mut applied = saved.clone();
        applied.merge(overrides);

        debug!("Overriding solver flags {:?} -> {:?}", saved, applied);
        solver.set_flags(applied);

        Self { solver, saved }
    }
}

impl<S: SolverService + ?Sized> Deref for SolverFlagScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.solver
    }
}

impl<S: SolverService + ?Sized> DerefMut for SolverFlagScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.solver
    }
}

impl<S: SolverService + ?Sized> Drop for SolverFlagScope<'_, S> {
    fn drop(&mut self) {
        debug!("Restoring solver flags {:?}", self.saved);
        self.solver.set_flags(std::mem::take(&mut self.saved));
    }
}

/// Run `body` with `overrides` applied, restoring the previous flags afterwards
pub fn with_overridden_flags<S, T, F>(solver: &mut S, overrides: &SolverFlags, body: F) -> T
where
    S: SolverService + ?Sized,
    F: FnOnce(&mut S) -> T,
{
    let mut scope = SolverFlagScope::enter(solver, overrides);
    body(&mut *scope)
}
