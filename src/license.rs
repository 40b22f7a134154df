// src/license.rs

//! License gate evaluated once per transaction before anything is committed

use crate::confirm::Confirmer;
use crate::error::{Error, Result};
use crate::services::{PackageId, SolverService};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// License texts requiring confirmation, keyed by package name
pub type LicenseSet = BTreeMap<PackageId, String>;

/// Result of running the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing needed confirmation
    NotRequired,
    /// Every license was accepted and marked confirmed with the solver
    Accepted(Vec<PackageId>),
    /// The user declined the license of this package
    Declined(PackageId),
}

/// Ask the user to confirm every license `to_install` requires
///
/// The gate keeps no memory between calls: the same package is asked again
/// in the next transaction because its license text may have changed.
pub fn check_licenses<S, C>(
    solver: &mut S,
    confirmer: &mut C,
    to_install: &[PackageId],
) -> GateDecision
where
    S: SolverService + ?Sized,
    C: Confirmer + ?Sized,
{
    let licenses = solver.licenses_to_confirm(to_install);
    if licenses.is_empty() {
        debug!("No licenses to confirm for {:?}", to_install);
        return GateDecision::NotRequired;
    }

    for (package, text) in &licenses {
        if !confirmer.confirm_license(package, text) {
            warn!(
                "License of {} declined, not installing {:?}",
                package, to_install
            );
            return GateDecision::Declined(package.clone());
        }
    }

    for package in licenses.keys() {
        solver.mark_license_confirmed(package);
    }

    info!("Accepted licenses of {:?}", licenses.keys().collect::<Vec<_>>());
    GateDecision::Accepted(licenses.into_keys().collect())
}

impl GateDecision {
    pub fn into_result(self) -> Result<()> {
        match self {
            GateDecision::Declined(package) => Err(Error::LicenseDeclined(vec![package])),
            GateDecision::NotRequired | GateDecision::Accepted(_) => Ok(()),
        }
    }
}
