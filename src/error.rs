//! Forge Error Taxonomy
//!
//! Hard failure classes for a repair attempt. Policy and gate rejections
//! are not errors -- they are terminal `RepairOutcome`s; these variants
//! cover the cases that abort an attempt without producing an outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    /// The requested strategy name is not registered.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Copying the workspace into the stage failed. Fatal to the attempt,
    /// never retried automatically.
    #[error("staging I/O failure: {0}")]
    StagingIo(String),

    /// Writing the snapshot archive or its index record failed. Fatal to
    /// the attempt; no commit happens without a rollback point.
    #[error("snapshot I/O failure: {0}")]
    SnapshotIo(String),

    /// The policy file exists but does not conform to the strict schema.
    #[error("invalid policy file: {0}")]
    PolicyConfig(String),

    /// The pipeline lock could not be acquired.
    #[error("could not acquire repair lock: {0}")]
    LockUnavailable(String),
}
