//! Error types for scheduler operations.

use thiserror::Error;

/// Recoverable errors produced by the cook scheduler.
///
/// Invariant violations are not represented here; those are programmer errors
/// and panic at the point of detection.
#[derive(Debug, Error)]
pub enum CookError {
    /// Package name does not resolve to a mounted location.
    #[error("unresolved package name: {0}")]
    UnresolvedPackage(String),
    /// Neither the asset index nor the file system knows the package.
    #[error("package not found on disk: {0}")]
    MissingFile(String),
    /// A generated package would overwrite a file that already exists.
    #[error("generated package {package} collides with existing file {file}")]
    FileCollision {
        /// Synthesized package name.
        package: String,
        /// File already present at the mounted location.
        file: String,
    },
    /// A splitter returned an entry without a map/non-map decision.
    #[error("splitter {splitter} did not set CreateAsMap for {relative_path}")]
    MissingCreateAsMap {
        /// Splitter name.
        splitter: String,
        /// Relative path of the offending entry.
        relative_path: String,
    },
    /// A splitter returned two entries that resolve to the same package.
    #[error("splitter {splitter} generated {package} more than once")]
    DuplicateGeneratedPackage {
        /// Splitter name.
        splitter: String,
        /// Synthesized package name.
        package: String,
    },
    /// Name or file is already bound to a different record.
    #[error("identity conflict for {package} ({file}): {reason}")]
    IdentityConflict {
        /// Package name involved.
        package: String,
        /// File name involved.
        file: String,
        /// What is already bound.
        reason: String,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A required collaborator was not supplied to the builder.
    #[error("missing component: {0}")]
    MissingComponent(&'static str),
    /// The record arena cannot address more records.
    #[error("capacity exceeded")]
    CapacityExceeded,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
