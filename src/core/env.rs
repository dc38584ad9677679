//! Runtime environment export.
//!
//! ccache is configured entirely through `CCACHE_*` environment variables.
//! They are applied to the current process and appended to the `$GITHUB_ENV`
//! file so every later build step inherits them; the install directory is
//! likewise published through `$GITHUB_PATH`. Inputs are validated before
//! this stage, so applying never fails.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::Inputs;
use crate::core::output;

/// Compute the variable set for a configuration. Pure, for testability.
pub fn render(inputs: &Inputs) -> Vec<(String, String)> {
    let mut vars = vec![
        (
            "CCACHE_DIR".to_string(),
            inputs.cache_dir.to_string_lossy().into_owned(),
        ),
        ("CCACHE_COMPILERCHECK".to_string(), inputs.compiler_check.clone()),
        ("CCACHE_MAXFILES".to_string(), inputs.max_files.to_string()),
        ("CCACHE_MAXSIZE".to_string(), inputs.max_size.clone()),
        ("CCACHE_SLOPPINESS".to_string(), inputs.sloppiness.clone()),
    ];

    if inputs.compression {
        vars.push(("CCACHE_COMPRESS".to_string(), "true".to_string()));
        vars.push((
            "CCACHE_COMPRESSLEVEL".to_string(),
            inputs.compression_level.to_string(),
        ));
    } else {
        vars.push(("CCACHE_NOCOMPRESS".to_string(), "true".to_string()));
    }

    vars
}

/// Export the ccache configuration. Idempotent: re-applying writes the same
/// values again.
pub fn apply(inputs: &Inputs) {
    for (name, value) in render(inputs) {
        output::detail(&format!("{}={}", name, value));
        set_process_env(&name, &value);
        append_runner_file("GITHUB_ENV", &format!("{}={}", name, value));
    }
}

/// Publish a directory to PATH for the current process and later steps.
pub fn add_path(dir: &Path) {
    let dir_str = dir.to_string_lossy();
    output::detail(&format!("adding {} to PATH", dir_str));

    let current = std::env::var_os("PATH").unwrap_or_default();
    match prepend_path(dir, &current) {
        Some(joined) => set_process_env("PATH", &joined),
        None => output::warning(&format!("cannot prepend {} to PATH", dir_str)),
    }
    append_runner_file("GITHUB_PATH", &dir_str);
}

/// Prepend `dir` to a PATH value with the platform's separator. `None` when
/// the directory itself contains the separator.
fn prepend_path(dir: &Path, current: &std::ffi::OsStr) -> Option<std::ffi::OsString> {
    let entries = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(current));
    std::env::join_paths(entries).ok()
}

fn set_process_env(name: &str, value: impl AsRef<std::ffi::OsStr>) {
    // SAFETY: the provisioning phases are single-threaded when environment
    // is configured; the hashing worker pool never reads env vars.
    unsafe { std::env::set_var(name, value) };
}

/// Append one line to a runner command file (`$GITHUB_ENV`, `$GITHUB_PATH`).
/// Missing file variable means a local run; the process env is enough then.
fn append_runner_file(file_var: &str, line: &str) {
    let Ok(path) = std::env::var(file_var) else {
        return;
    };
    if path.is_empty() {
        return;
    }
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut f| writeln!(f, "{}", line));
    if let Err(e) = result {
        output::warning(&format!("cannot write {}: {}", file_var, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallMode;
    use semver::VersionReq;
    use std::path::PathBuf;

    fn sample_inputs(compression: bool) -> Inputs {
        Inputs {
            workspace: PathBuf::from("/work"),
            repo_path: PathBuf::from("/work/ccache"),
            version_range: VersionReq::parse("*").unwrap(),
            install: true,
            install_mode: InstallMode::Binary,
            binary_key_prefix: "ccache_binary".into(),
            cache_key_prefix: "ccache_cache".into(),
            cache_dir: PathBuf::from("/work/.ccache"),
            compiler_check: "mtime".into(),
            compression,
            compression_level: 5,
            max_files: 0,
            max_size: "500M".into(),
            sloppiness: "time_macros".into(),
            github_token: None,
        }
    }

    fn lookup(vars: &[(String, String)], name: &str) -> Option<String> {
        vars.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_render_with_compression() {
        let vars = render(&sample_inputs(true));
        assert_eq!(lookup(&vars, "CCACHE_DIR").unwrap(), "/work/.ccache");
        assert_eq!(lookup(&vars, "CCACHE_COMPILERCHECK").unwrap(), "mtime");
        assert_eq!(lookup(&vars, "CCACHE_COMPRESS").unwrap(), "true");
        assert_eq!(lookup(&vars, "CCACHE_COMPRESSLEVEL").unwrap(), "5");
        assert_eq!(lookup(&vars, "CCACHE_MAXSIZE").unwrap(), "500M");
        assert_eq!(lookup(&vars, "CCACHE_SLOPPINESS").unwrap(), "time_macros");
        assert!(lookup(&vars, "CCACHE_NOCOMPRESS").is_none());
    }

    #[test]
    fn test_render_without_compression() {
        let vars = render(&sample_inputs(false));
        assert_eq!(lookup(&vars, "CCACHE_NOCOMPRESS").unwrap(), "true");
        assert!(lookup(&vars, "CCACHE_COMPRESS").is_none());
        assert!(lookup(&vars, "CCACHE_COMPRESSLEVEL").is_none());
    }

    #[test]
    fn test_render_is_idempotent() {
        let inputs = sample_inputs(true);
        assert_eq!(render(&inputs), render(&inputs));
    }

    #[test]
    fn test_prepend_path_puts_dir_first_and_keeps_the_rest() {
        let current = std::env::join_paths([
            PathBuf::from("/usr/bin"),
            PathBuf::from("/bin"),
        ])
        .unwrap();

        let joined = prepend_path(Path::new("/work/.ccache-install/bin"), &current).unwrap();
        let entries: Vec<PathBuf> = std::env::split_paths(&joined).collect();
        assert_eq!(entries[0], PathBuf::from("/work/.ccache-install/bin"));
        assert_eq!(entries[1], PathBuf::from("/usr/bin"));
        assert_eq!(entries[2], PathBuf::from("/bin"));
    }

    #[test]
    fn test_prepend_path_empty_current() {
        let joined = prepend_path(Path::new("/opt/bin"), std::ffi::OsStr::new("")).unwrap();
        let entries: Vec<PathBuf> = std::env::split_paths(&joined)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        assert_eq!(entries, vec![PathBuf::from("/opt/bin")]);
    }
}
