//! CMake wrappers for building ccache from source.
//!
//! Uses the Ninja generator when a `ninja` binary is on PATH, falling back
//! to Unix Makefiles. The configure options disable the test suite and
//! enable the Redis storage backend, matching the upstream release builds.

use anyhow::Result;
use std::path::Path;

use super::cmd::Cmd;
use crate::core::output;

/// Configure options applied to every source build.
pub const CONFIGURE_OPTIONS: [&str; 6] = [
    "-D",
    "CMAKE_BUILD_TYPE=Release",
    "-D",
    "ENABLE_TESTING=OFF",
    "-D",
    "REDIS_STORAGE_BACKEND=ON",
];

/// Probe PATH for a binary, `which(1)` style.
fn find_on_path(name: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(name).is_file())
}

/// Run the cmake configure step in `source_dir`, generating into `build/`.
pub fn configure(source_dir: &Path) -> Result<()> {
    let generator = if find_on_path("ninja") {
        "Ninja"
    } else {
        "Unix Makefiles"
    };
    output::detail(&format!("cmake configure ({} generator)", generator));

    let mut args: Vec<String> = CONFIGURE_OPTIONS.iter().map(|s| s.to_string()).collect();
    args.extend(["-G", generator, "-S", ".", "-B", "build"].map(String::from));

    Cmd::new("cmake", args).dir(source_dir).run()
}

/// Run the cmake build step with host parallelism.
pub fn build(source_dir: &Path) -> Result<()> {
    let jobs = num_cpus::get().to_string();
    output::detail(&format!("cmake build (-j {})", jobs));

    Cmd::new("cmake", ["--build", "build", "-j", &jobs])
        .dir(source_dir)
        .run()
}

/// Install the built tree under `prefix`.
pub fn install(source_dir: &Path, prefix: &Path) -> Result<()> {
    let prefix_str = prefix.to_string_lossy();
    output::detail(&format!("cmake install --prefix {}", prefix_str));

    Cmd::new("cmake", ["--install", "build", "--prefix", &prefix_str])
        .dir(source_dir)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_on_path_sh_exists() {
        assert!(find_on_path("sh"));
    }

    #[test]
    fn test_find_on_path_missing() {
        assert!(!find_on_path("definitely-not-a-real-binary-xyz"));
    }

    #[test]
    fn test_configure_options_shape() {
        // Options come in -D KEY=VALUE pairs.
        assert_eq!(CONFIGURE_OPTIONS.len() % 2, 0);
        for pair in CONFIGURE_OPTIONS.chunks(2) {
            assert_eq!(pair[0], "-D");
            assert!(pair[1].contains('='));
        }
    }
}
