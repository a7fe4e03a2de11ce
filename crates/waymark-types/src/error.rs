use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors raised while decoding or encoding a manifest document.
///
/// These abort immediately: no manifest exists yet to collect violations on.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("format error: {0}")]
    Format(String),

    #[error("version error: {0}")]
    Version(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the wave planner, which requires a resolvable, acyclic graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    #[error("cycle detected: {0}")]
    CycleDetected(String),
}

/// Errors from loading a manifest that must also be valid.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}
