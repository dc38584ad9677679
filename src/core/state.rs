//! Job state persisted between the setup and teardown phases.
//!
//! A CI job runs this tool twice in separate processes. Whatever teardown
//! needs is written as `name=value` pairs to the `$GITHUB_STATE` file at the
//! end of setup; the runner feeds the pairs back to the teardown process as
//! `STATE_<name>` environment variables. Round-tripping the string fields
//! is the whole contract.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use super::error::ProvisionError;

/// Lifecycle marker persisted alongside the state fields. Teardown refuses
/// to run unless setup completed and left `AwaitingTeardown` behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    PreBuildRunning,
    AwaitingTeardown,
    TeardownRunning,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::PreBuildRunning => "pre-build-running",
            Self::AwaitingTeardown => "awaiting-teardown",
            Self::TeardownRunning => "teardown-running",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not-started" => Some(Self::NotStarted),
            "pre-build-running" => Some(Self::PreBuildRunning),
            "awaiting-teardown" => Some(Self::AwaitingTeardown),
            "teardown-running" => Some(Self::TeardownRunning),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// State carried from setup to teardown. Written once at the end of setup,
/// read once at the start of teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    /// Key prefix for the compilation cache.
    pub cache_key_prefix: String,
    /// ccache's cache directory.
    pub cache_dir: PathBuf,
    /// Key the compilation cache was restored from at setup; empty when no
    /// prior cache existed.
    pub restore_key: String,
    /// Credential for deleting stale remote entries; empty when absent.
    pub deletion_token: String,
}

const FIELDS: [&str; 5] = [
    "cache_key_prefix",
    "cache_dir",
    "restore_key",
    "deletion_token",
    "phase",
];

impl JobState {
    /// Persist the state for the teardown process.
    ///
    /// Values land in the `$GITHUB_STATE` file and, for same-process reads
    /// (tests, local runs), in `STATE_*` variables.
    pub fn persist(&self, phase: Phase) -> Result<()> {
        let values = [
            self.cache_key_prefix.as_str(),
            &self.cache_dir.to_string_lossy(),
            self.restore_key.as_str(),
            self.deletion_token.as_str(),
            phase.as_str(),
        ];

        for (name, value) in FIELDS.iter().zip(values.iter()) {
            // SAFETY: state is persisted after all worker threads joined.
            unsafe { std::env::set_var(format!("STATE_{}", name), value) };
        }

        if let Ok(path) = std::env::var("GITHUB_STATE")
            && !path.is_empty()
        {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open state file {}", path))?;
            for (name, value) in FIELDS.iter().zip(values.iter()) {
                writeln!(file, "{}={}", name, value).context("cannot write state file")?;
            }
        }

        Ok(())
    }

    /// Load the state in the teardown process, enforcing phase sequencing.
    pub fn load() -> Result<Self, ProvisionError> {
        let get = |name: &str| std::env::var(format!("STATE_{}", name)).unwrap_or_default();

        let phase_raw = get("phase");
        match Phase::parse(&phase_raw) {
            Some(Phase::AwaitingTeardown) => {}
            _ => {
                return Err(ProvisionError::PhaseMismatch {
                    found: if phase_raw.is_empty() {
                        "no persisted state".to_string()
                    } else {
                        phase_raw
                    },
                });
            }
        }

        Ok(Self {
            cache_key_prefix: get("cache_key_prefix"),
            cache_dir: PathBuf::from(get("cache_dir")),
            restore_key: get("restore_key"),
            deletion_token: get("deletion_token"),
        })
    }
}
