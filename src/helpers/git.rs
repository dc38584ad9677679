//! Git wrappers for the ccache source tree.
//!
//! The clone is shallow and checkout-free: only the tag list matters until
//! a specific release is selected, and only the source tier ever needs a
//! working tree.

use anyhow::Result;
use std::path::Path;

use super::cmd::Cmd;
use crate::core::output;

/// Upstream ccache repository.
pub const CCACHE_REPOSITORY: &str = "https://github.com/ccache/ccache";

/// Clone the ccache repository without checking out a working tree.
///
/// Skipped when a valid clone already exists at `dest` (re-run of the same
/// job step, or a repository path kept across attempts).
pub fn clone(dest: &Path) -> Result<()> {
    if dest.join(".git").exists() {
        let verify = Cmd::new("git", ["rev-parse", "--git-dir"]).dir(dest).status();
        if verify == 0 {
            output::detail("repository already cloned");
            return Ok(());
        }
        output::warning("existing clone is invalid, re-cloning");
        let _ = std::fs::remove_dir_all(dest);
    }

    let dest_str = dest.to_string_lossy();
    Cmd::new(
        "git",
        ["clone", "--no-checkout", "--depth=1", CCACHE_REPOSITORY, &dest_str],
    )
    .run()
}

/// Fetch release tags into the shallow clone.
pub fn fetch_tags(path: &Path) -> Result<()> {
    Cmd::new("git", ["fetch", "--depth=1", "--tags"]).dir(path).run()
}

/// Check out a tag as a detached head, discarding local changes.
pub fn checkout(path: &Path, tag: &str) -> Result<()> {
    Cmd::new("git", ["checkout", "-f", "--detach", tag])
        .dir(path)
        .run()
}

/// List all tags in the repository, one per line of `git tag --list`.
pub fn tag_list(path: &Path) -> Result<Vec<String>> {
    let stdout = Cmd::new("git", ["tag", "--list"]).dir(path).output()?;
    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}
