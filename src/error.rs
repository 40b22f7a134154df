// src/error.rs

use thiserror::Error;

/// Core error types for pkgsys
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database or target initialization error
    #[error("Failed to initialize: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Repository metadata could not be fetched
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Malformed metadata or timestamps
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Named entity does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Named entity already exists
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// The package-system lock is held by someone else
    #[error("Package system lock is not available")]
    LockUnavailable,

    /// The user rejected a license
    #[error("License declined for: {}", .0.join(", "))]
    LicenseDeclined(Vec<String>),

    /// A requested package could not be selected for install/remove
    #[error("Package '{0}' could not be selected")]
    PackageNotFound(String),

    /// Solver failed and the user did not accept an assisted resolution
    #[error("Unresolved dependencies: {0}")]
    UnresolvedDependencies(String),

    /// Commit returned nothing, or some packages failed
    #[error("Commit failed for: {}", .0.join(", "))]
    CommitFailed(Vec<String>),

    /// Commit claimed success but requested packages are still pending
    #[error("Requested packages were not installed: {}", .0.join(", "))]
    PackageRemained(Vec<String>),

    /// The same name was requested for install and removal
    #[error("Packages requested for both install and removal: {}", .0.join(", "))]
    ConflictingChangeSet(Vec<String>),
}

/// Result type alias using pkgsys's Error type
pub type Result<T> = std::result::Result<T, Error>;
