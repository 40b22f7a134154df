// src/lib.rs

//! pkgsys Package System
//!
//! Installs and removes packages as one all-or-nothing request on behalf of
//! an installer or configuration tool.
//!
//! # Architecture
//!
//! - Collaborators behind traits: locking, repositories and target, solver,
//!   user confirmation and runtime notifications are all injected
//! - Lazy initialization: the target database and repository sources are
//!   set up once per process, on first need
//! - License gate: packages with a license are only installed after the
//!   user accepts it
//! - Verified commits: a commit only counts when every requested package
//!   is actually installed afterwards
//! - Database-first reference backend: repositories, the package index and
//!   installed packages all live in SQLite

pub mod backend;
pub mod changeset;
pub mod config;
pub mod confirm;
pub mod db;
mod error;
pub mod flags;
pub mod init;
pub mod license;
pub mod lock;
pub mod repository;
pub mod runtime;
pub mod services;
pub mod system;
pub mod verify;

#[cfg(test)]
mod testing;

pub use backend::SqliteBackend;
pub use changeset::ChangeSet;
pub use config::{InstallStage, Presentation, SystemConfig};
pub use confirm::{CommandLineConfirmer, Confirmer, ScriptedConfirmer, SelectionOutcome};
pub use error::{Error, Result};
pub use flags::SolverFlags;
pub use lock::FileLock;
pub use runtime::SystemRuntime;
pub use services::{
    LockService, PackageBackend, RepositoryService, RuntimeEnvironment, SolverService,
};
pub use system::PackageSystem;
pub use verify::CommitResult;
