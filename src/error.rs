use std::{io, path::PathBuf};

use alloy_primitives::{B256, Bytes};

/// Joins aggregated problems into one message, one per line.
fn lines(problems: &[String]) -> String {
    problems.join("\n")
}

/// Settings that cannot be read or fail validation. Always fatal.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid settings:\n{}", lines(.0))]
    Invalid(Vec<String>),
}

/// Failures reported by a network capability handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum NetworkError {
    #[error("{0}")]
    Transport(String),

    /// The node refused a call or transaction before it was broadcast. `input` carries the
    /// encoded calldata of the rejected transaction when it is known.
    #[error("rejected before broadcast: {reason}")]
    Rejected {
        reason: String,
        input: Option<Bytes>,
    },

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("no signing identity configured")]
    NoSigner,
}

/// Startup checks against the configured networks failed.
#[derive(Debug, thiserror::Error)]
#[error("network preflight failed:\n{}", lines(.0))]
pub(crate) struct PreflightError(pub(crate) Vec<String>);

#[derive(Debug, thiserror::Error)]
pub(crate) enum CheckpointError {
    #[error("failed to write checkpoint {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum InitializerError {
    /// The simulated setup call failed in a way that does not expose its calldata.
    #[error("could not construct initializer: {0}")]
    Unrecoverable(NetworkError),

    #[error("could not construct initializer: simulated setup call unexpectedly succeeded")]
    UnexpectedSuccess,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SearchError {
    #[error("salt nonce space exhausted after {found} of {target} candidates")]
    Exhausted { found: usize, target: usize },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DeployError {
    #[error("all {0} attempted deployments failed")]
    AllFailed(usize),

    #[error("checkpoint holds candidates that do not match their derived address:\n{}", lines(.0))]
    Inconsistent(Vec<String>),
}
