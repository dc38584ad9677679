//! Installation verification.
//!
//! The single gate that accepts or rejects a tier's output: run the
//! binary's version query and report pass/fail by exit code. A non-zero
//! exit or a missing binary is `false`, never an error — callers decide
//! whether a failed verification is a tier miss or fatal.

use std::path::Path;

use crate::helpers::cmd::Cmd;

/// Seam for verification so pipeline tests can substitute outcomes.
pub trait Verifier {
    /// Check that the binary installed under `install_dir` runs and reports
    /// a version.
    fn verify(&self, install_dir: &Path) -> bool;

    /// Check that a `ccache` on PATH runs and reports a version.
    fn verify_on_path(&self) -> bool;
}

/// Live verifier invoking `ccache --version`.
pub struct CcacheVerifier;

impl Verifier for CcacheVerifier {
    fn verify(&self, install_dir: &Path) -> bool {
        let binary = install_dir.join("ccache");
        Cmd::new(binary.to_string_lossy(), ["--version"]).status() == 0
    }

    fn verify_on_path(&self) -> bool {
        Cmd::new("ccache", ["--version"]).status() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_binary_is_false_not_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!CcacheVerifier.verify(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_working_stub_passes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("ccache");
        let mut f = std::fs::File::create(&stub).unwrap();
        f.write_all(b"#!/bin/sh\necho 'ccache version 4.8.2'\nexit 0\n")
            .unwrap();
        drop(f);
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(CcacheVerifier.verify(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_stub_fails() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("ccache");
        std::fs::write(&stub, b"#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!CcacheVerifier.verify(dir.path()));
    }
}
