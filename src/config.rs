//! Job inputs.
//!
//! Inputs arrive as `INPUT_*` environment variables (the CI runner's input
//! convention) and are validated up front; every failure here aborts the
//! job before any acquisition work starts.

use anyhow::{Context, Result, bail};
use semver::VersionReq;
use std::path::{Component, Path, PathBuf};

/// How the binary should be obtained when no cached copy exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Prefer a prebuilt release archive, fall back to a source build.
    Binary,
    /// Build from source unconditionally.
    Source,
}

/// Validated job configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Job workspace root; all paths live under it.
    pub workspace: PathBuf,
    /// Where the ccache repository is cloned.
    pub repo_path: PathBuf,
    /// Requested version range, e.g. "^4.0.0" or "*".
    pub version_range: VersionReq,
    /// Whether to install the binary at all (tag resolution always runs).
    pub install: bool,
    pub install_mode: InstallMode,
    /// Key prefix for the binary cache.
    pub binary_key_prefix: String,
    /// Key prefix for the compilation cache.
    pub cache_key_prefix: String,

    /// ccache's own cache directory.
    pub cache_dir: PathBuf,
    pub compiler_check: String,
    pub compression: bool,
    pub compression_level: i64,
    pub max_files: u64,
    pub max_size: String,
    pub sloppiness: String,

    /// Credential for deleting stale remote cache entries, if provided.
    pub github_token: Option<String>,
}

impl Inputs {
    /// Read and validate all inputs from the environment.
    pub fn from_env() -> Result<Self> {
        let workspace = std::env::var("GITHUB_WORKSPACE")
            .ok()
            .filter(|s| !s.is_empty())
            .context("GITHUB_WORKSPACE not defined")?;
        let workspace = PathBuf::from(workspace);
        if !workspace.is_dir() {
            bail!("Directory '{}' does not exist", workspace.display());
        }

        let repo_path = resolve_under(&workspace, &input("path").unwrap_or_else(|| ".".into()))
            .with_context(|| "repository path escapes the workspace")?;

        let raw_range = input("version").unwrap_or_else(|| "*".into());
        let version_range = VersionReq::parse(&raw_range)
            .map_err(|_| anyhow::anyhow!("Version '{}' is not a valid range", raw_range))?;

        let install = bool_input("install").unwrap_or(true);

        let install_mode = match input("install-type")
            .unwrap_or_else(|| "binary".into())
            .to_lowercase()
            .as_str()
        {
            "binary" => InstallMode::Binary,
            "source" => InstallMode::Source,
            other => bail!("Install type must be either binary or source, got '{}'", other),
        };

        let cache_dir = resolve_under(
            &workspace,
            &input("cache-dir").unwrap_or_else(|| ".ccache".into()),
        )
        .with_context(|| "cache dir escapes the workspace")?;

        let max_files: u64 = input("max-files")
            .unwrap_or_else(|| "0".into())
            .parse()
            .map_err(|_| anyhow::anyhow!("Max files must be 0 or a positive number"))?;

        let max_size = input("max-size").unwrap_or_else(|| "500M".into());
        let max_size = max_size.trim().to_string();
        if !valid_max_size(&max_size) {
            bail!(
                "Max size must be 0 or a whole number with suffixes: \
                 k, M, G, T (decimal) and Ki, Mi, Gi, Ti (binary)"
            );
        }

        let compression_level: i64 = input("compression-level")
            .unwrap_or_else(|| "0".into())
            .parse()
            .map_err(|_| anyhow::anyhow!("Compression level must be a number"))?;

        Ok(Self {
            workspace,
            repo_path,
            version_range,
            install,
            install_mode,
            binary_key_prefix: input("binary-key-prefix").unwrap_or_else(|| "ccache_binary".into()),
            cache_key_prefix: input("cache-key-prefix").unwrap_or_else(|| "ccache_cache".into()),
            cache_dir,
            compiler_check: input("compiler-check").unwrap_or_else(|| "mtime".into()),
            compression: bool_input("compression").unwrap_or(true),
            compression_level,
            max_files,
            max_size,
            sloppiness: input("sloppiness").unwrap_or_else(|| "time_macros".into()),
            github_token: input("github-token").or_else(|| std::env::var("GITHUB_TOKEN").ok()),
        })
    }

    /// Directory the acquired binary is installed under.
    pub fn install_dir(&self) -> PathBuf {
        self.workspace.join(".ccache-install")
    }

    /// Directory holding the `ccache` binary itself.
    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir().join("bin")
    }
}

/// Read one named input from `INPUT_<NAME>` (dashes become underscores).
fn input(name: &str) -> Option<String> {
    let var = format!("INPUT_{}", name.to_uppercase().replace('-', "_"));
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

fn bool_input(name: &str) -> Option<bool> {
    input(name).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Resolve `rel` against `base` and require the result to stay under it.
fn resolve_under(base: &Path, rel: &str) -> Result<PathBuf> {
    let joined = base.join(rel);
    let normalized = normalize_lexical(&joined);
    if !normalized.starts_with(normalize_lexical(base)) {
        bail!("path '{}' is not under '{}'", normalized.display(), base.display());
    }
    Ok(normalized)
}

/// Lexically normalize a path (no filesystem access).
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
            }
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }
    out
}

/// Max cache size: "0" or digits plus a decimal/binary size suffix.
fn valid_max_size(s: &str) -> bool {
    if s == "0" {
        return true;
    }
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if digits_end == 0 {
        return false;
    }
    matches!(
        &s[digits_end..],
        "k" | "M" | "G" | "T" | "Ki" | "Mi" | "Gi" | "Ti"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_max_size_accepts_suffixes() {
        for s in ["0", "5G", "500M", "1k", "2T", "10Ki", "10Mi", "3Gi", "1Ti"] {
            assert!(valid_max_size(s), "{} should be valid", s);
        }
    }

    #[test]
    fn test_valid_max_size_rejects_bad_forms() {
        for s in ["", "10", "G", "5g", "5 G", "5MB", "-5G", "5.5G", "0k0"] {
            assert!(!valid_max_size(s), "{} should be invalid", s);
        }
    }

    #[test]
    fn test_resolve_under_plain() {
        let base = Path::new("/work");
        assert_eq!(resolve_under(base, ".").unwrap(), PathBuf::from("/work"));
        assert_eq!(
            resolve_under(base, "sub/dir").unwrap(),
            PathBuf::from("/work/sub/dir")
        );
    }

    #[test]
    fn test_resolve_under_rejects_escape() {
        let base = Path::new("/work");
        assert!(resolve_under(base, "../outside").is_err());
        assert!(resolve_under(base, "a/../../outside").is_err());
    }

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(
            normalize_lexical(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
