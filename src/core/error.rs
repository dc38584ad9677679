//! Fatal error types.
//!
//! Only these terminate the job with a non-zero exit. Tier misses, cache
//! store failures, and stale-entry deletion failures are absorbed at their
//! call sites with a log line and never reach the caller.

use thiserror::Error;

/// Errors that abort the provisioning run.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("could not find a version that satisfies {range}")]
    NoSatisfyingVersion { range: String },

    #[error("ccache installation is not functional after source build")]
    InstallationNonFunctional,

    #[error("command failed: {cmd} (exit code: {code:?})")]
    CommandFailed { cmd: String, code: Option<i32> },

    #[error("teardown invoked without a completed setup phase (found: {found})")]
    PhaseMismatch { found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
