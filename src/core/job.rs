//! The two job phases.
//!
//! `run_pre_build` is the setup step: resolve, acquire, restore the
//! compilation cache, export environment, persist state. `run_teardown` is
//! the post step: print statistics and reconcile the compilation cache.
//! Each stage runs inside a foldable log group.

use anyhow::{Context, Result};

use super::env;
use super::matrix::PlatformKey;
use super::output;
use super::pipeline::{
    AcquisitionPipeline, AcquisitionRequest, CmakeSourceBuilder, HttpReleaseFetcher,
};
use super::reconcile;
use super::state::{JobState, Phase};
use super::verify::{CcacheVerifier, Verifier};
use super::version;
use crate::config::Inputs;
use crate::helpers::cache::{ActionsCacheClient, CacheStore};
use crate::helpers::cmd::Cmd;
use crate::helpers::git;

/// Run the setup phase. Returns the state the teardown phase will read.
pub fn run_pre_build(inputs: &Inputs) -> Result<JobState> {
    let initial = JobState {
        cache_key_prefix: inputs.cache_key_prefix.clone(),
        cache_dir: inputs.cache_dir.clone(),
        restore_key: String::new(),
        deletion_token: inputs.github_token.clone().unwrap_or_default(),
    };
    initial.persist(Phase::PreBuildRunning)?;

    let resolved = output::grouped("Resolve ccache version", || -> Result<_> {
        git::clone(&inputs.repo_path)?;
        git::fetch_tags(&inputs.repo_path)?;
        let tags = git::tag_list(&inputs.repo_path)?;
        let resolved = version::resolve(&tags, &inputs.version_range)?;
        output::success(&format!(
            "resolved {} to {} (tag {})",
            inputs.version_range,
            resolved.version_string(),
            resolved.tag
        ));
        Ok(resolved)
    })?;

    let store = ActionsCacheClient::from_env(inputs.github_token.clone());

    if inputs.install {
        output::grouped("Install ccache", || -> Result<_> {
            let pipeline = AcquisitionPipeline {
                store: &store,
                fetcher: &HttpReleaseFetcher,
                builder: &CmakeSourceBuilder {
                    repo_path: inputs.repo_path.clone(),
                },
                verifier: &CcacheVerifier,
            };
            let request = AcquisitionRequest {
                resolved: resolved.clone(),
                platform: PlatformKey::current(),
                install_mode: inputs.install_mode,
                binary_key_prefix: inputs.binary_key_prefix.clone(),
                install_dir: inputs.install_dir(),
                bin_dir: inputs.bin_dir(),
            };
            let outcome = pipeline.acquire(&request)?;
            output::success(&format!(
                "ccache {} ready ({})",
                resolved.version_string(),
                outcome.name()
            ));
            Ok(())
        })?;
    } else {
        output::info("install disabled, resolved version only");
    }

    let restore_key = output::grouped("Restore compilation cache", || {
        restore_compilation_cache(inputs, &store)
    });

    output::grouped("Configure environment", || {
        env::apply(inputs);
        if inputs.install {
            env::add_path(&inputs.bin_dir());
            if !CcacheVerifier.verify_on_path() {
                output::warning("ccache not reachable through PATH after export");
            }
        }
    });

    // Start from clean statistics so teardown reports this job only.
    // A missing binary here just means install was disabled.
    let _ = Cmd::new("ccache", ["--zero-stats"]).status();

    let state = JobState {
        restore_key,
        ..initial
    };
    state.persist(Phase::AwaitingTeardown)?;
    Ok(state)
}

/// Restore the compilation cache from the newest entry under the key
/// prefix. A miss or failure leaves the directory empty; never fatal.
fn restore_compilation_cache(inputs: &Inputs, store: &dyn CacheStore) -> String {
    if !store.is_available() {
        output::info("cache service not available, starting with an empty cache");
        return String::new();
    }

    let prefix = inputs.cache_key_prefix.clone();
    match store.restore(
        &[inputs.cache_dir.clone()],
        &prefix,
        std::slice::from_ref(&prefix),
    ) {
        Ok(Some(key)) => {
            output::success(&format!("restored compilation cache from {}", key));
            key
        }
        Ok(None) => {
            output::info("no compilation cache entry yet, starting fresh");
            String::new()
        }
        Err(e) => {
            output::warning(&format!("compilation cache restore failed: {}", e));
            String::new()
        }
    }
}

/// Run the teardown phase using the state persisted at setup.
pub fn run_teardown() -> Result<()> {
    let state = JobState::load().context("teardown requires a completed setup phase")?;
    state.persist(Phase::TeardownRunning)?;

    output::grouped("ccache statistics", || {
        if Cmd::new("ccache", ["--show-stats"]).status() != 0 {
            output::info("ccache not on PATH, skipping statistics");
        }
    });

    output::grouped("Persist compilation cache", || {
        let store = ActionsCacheClient::from_env(if state.deletion_token.is_empty() {
            None
        } else {
            Some(state.deletion_token.clone())
        });
        reconcile::reconcile(&state, &store, is_pull_request());
    });

    state.persist(Phase::Done)?;
    Ok(())
}

/// Pull request runs (including `pull_request_target`) lack deletion rights
/// on the base repository's caches.
fn is_pull_request() -> bool {
    std::env::var("GITHUB_EVENT_NAME")
        .map(|name| name.starts_with("pull_request"))
        .unwrap_or(false)
}
