//! Provisions ccache inside a CI job.
//!
//! The tool runs in two phases, matching a GitHub Actions main/post step pair:
//!
//! 1. `setup` — resolve the requested version range against the upstream
//!    release tags, acquire a working binary (restored binary cache, then a
//!    prebuilt release download, then a source build), verify it runs,
//!    restore the compilation cache, and export the `CCACHE_*` environment
//!    for the build steps that follow.
//! 2. `teardown` — print ccache statistics, hash the compilation cache
//!    directory, and persist it remotely under a content-derived key,
//!    deleting the stale entry when the content changed.
//!
//! Acquisition tiers fall through on any failure; only an unsatisfiable
//! version range, invalid inputs, or a source build that never produces a
//! functional binary fail the job.

pub mod config;
pub mod core;
pub mod helpers;

pub use config::Inputs;
pub use core::error::ProvisionError;
pub use core::job::{run_pre_build, run_teardown};
pub use core::outcome::AcquisitionOutcome;
pub use core::state::JobState;
