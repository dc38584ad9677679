//! Unified external process execution
//!
//! Provides a builder for running external tools with consistent error
//! handling. Arguments are passed argv-style, never through a shell, so
//! tag names and paths are not subject to shell interpolation.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::ProvisionError;

/// Builder for external tool invocation.
///
/// # Example
/// ```ignore
/// Cmd::new("git", ["fetch", "--depth=1", "--tags"])
///     .dir("/tmp/ccache")
///     .run()?;
/// ```
#[derive(Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl Cmd {
    /// Create a new command.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    /// Set the working directory for the command.
    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for the command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        cmd
    }

    /// Run the command and return success/failure.
    ///
    /// Returns `Ok(())` if exit code is 0, error otherwise.
    pub fn run(&self) -> Result<()> {
        let status = self
            .build_command()
            .status()
            .map_err(|e| anyhow!("{} failed to start: {}", self.program, e))?;

        if !status.success() {
            return Err(ProvisionError::CommandFailed {
                cmd: self.display_cmd(),
                code: status.code(),
            }
            .into());
        }

        Ok(())
    }

    /// Run the command and return the exit status code, ignoring failure.
    ///
    /// Returns -1 if the command couldn't be started.
    pub fn status(&self) -> i32 {
        self.build_command()
            .status()
            .map(|s| s.code().unwrap_or(-1))
            .unwrap_or(-1)
    }

    /// Run the command and capture stdout.
    ///
    /// Returns error if command fails (non-zero exit).
    pub fn output(&self) -> Result<String> {
        let output = self
            .build_command()
            .output()
            .map_err(|e| anyhow!("{} failed to start: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "command failed with exit code {:?}: {}\nstderr: {}",
                output.status.code(),
                self.display_cmd(),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Get the command line for display, truncated for long argument lists.
    pub fn display_cmd(&self) -> String {
        let full = if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        };
        if full.chars().count() > 80 {
            let head: String = full.chars().take(77).collect();
            format!("{}...", head)
        } else {
            full
        }
    }
}
