//! Compilation cache reconciliation at teardown.
//!
//! The cache directory is hashed after the build; the digest names the new
//! cache entry. Nothing is saved when the directory is empty or unchanged
//! since restore. When content did change, the stale entry restored at
//! setup is deleted first (if a credential exists and the run is not a
//! pull request), then the new entry is saved.
//!
//! Everything here degrades to a warning: a failed reconciliation never
//! fails the job.

use crate::core::output;
use crate::core::state::JobState;
use crate::helpers::cache::CacheStore;
use crate::helpers::hash::{self, EMPTY_TREE};

/// ccache bookkeeping files churn on every run without reflecting cached
/// object content; they stay out of the digest.
fn hash_patterns(state: &JobState) -> (Vec<String>, Vec<String>) {
    // The directory is a literal path, not a pattern; escape it so glob
    // metacharacters in a workspace name cannot empty the match set.
    let dir = glob::Pattern::escape(&state.cache_dir.to_string_lossy());
    let includes = vec![format!("{}/**/*", dir)];
    let excludes = vec![format!("{}/**/stats", dir), format!("{}/**/stats.lock", dir)];
    (includes, excludes)
}

/// Persist the compilation cache if it changed during the job.
pub fn reconcile(state: &JobState, store: &dyn CacheStore, is_pull_request: bool) {
    if !store.is_available() {
        output::info("cache service not available, leaving compilation cache as is");
        return;
    }

    let (includes, excludes) = hash_patterns(state);
    let digest = match hash::hash_tree(&includes, &excludes) {
        Ok(d) => d,
        Err(e) => {
            output::warning(&format!("cannot hash compilation cache: {}", e));
            return;
        }
    };

    if digest == EMPTY_TREE {
        output::info("compilation cache is empty, nothing to save");
        return;
    }

    let new_key = format!("{}_{}", state.cache_key_prefix, digest);
    if new_key == state.restore_key {
        output::info("compilation cache unchanged since restore");
        return;
    }

    // The old entry can only shadow the new one once it is stale; forks
    // running pull requests lack deletion rights, so they just accumulate.
    if !state.restore_key.is_empty() && !state.deletion_token.is_empty() && !is_pull_request {
        match store.delete(&state.restore_key) {
            Ok(()) => output::detail(&format!("deleted stale entry {}", state.restore_key)),
            Err(e) => output::warning(&format!("unable to delete stale entry: {}", e)),
        }
    }

    match store.save(&[state.cache_dir.clone()], &new_key) {
        Ok(_) => output::success(&format!("saved compilation cache as {}", new_key)),
        Err(e) => output::warning(&format!("unable to save compilation cache: {}", e)),
    }
}
