//! Tiered binary acquisition.
//!
//! Three tiers, attempted in order, each gated by the verifier:
//!
//! 1. restore the binary cache entry for this platform and version
//! 2. download a prebuilt release archive (binary install mode only)
//! 3. check out the tag and build from source
//!
//! A tier failing for any reason is a miss, logged and absorbed, and the
//! next tier runs. Only the source tier is terminal: if its output does not
//! verify, there is nothing left to try and the job fails. A verified
//! download or source build is saved back to the binary cache; a cache hit
//! is not re-saved.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::matrix::{self, BinaryRelease, PlatformKey};
use super::outcome::AcquisitionOutcome;
use super::output;
use super::verify::Verifier;
use super::version::ResolvedVersion;
use crate::config::InstallMode;
use crate::core::error::ProvisionError;
use crate::helpers::cache::CacheStore;
use crate::helpers::{cmake, download, extract, git};

/// Fetches a prebuilt release archive into the install tree.
pub trait ReleaseFetcher {
    fn fetch(&self, release: &BinaryRelease, version: &str, bin_dir: &Path) -> Result<()>;
}

/// Builds the checked-out source tag and installs it.
pub trait SourceBuilder {
    fn build_and_install(&self, tag: &str, install_dir: &Path) -> Result<()>;
}

/// One acquisition run's parameters.
pub struct AcquisitionRequest {
    pub resolved: ResolvedVersion,
    pub platform: PlatformKey,
    pub install_mode: InstallMode,
    pub binary_key_prefix: String,
    pub install_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl AcquisitionRequest {
    /// Binary cache key: `{prefix}_{os}_{arch}_{version}`.
    pub fn binary_cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.binary_key_prefix,
            self.platform.os,
            self.platform.arch,
            self.resolved.version_string()
        )
    }
}

/// Orchestrates the tiers over pluggable collaborators.
pub struct AcquisitionPipeline<'a> {
    pub store: &'a dyn CacheStore,
    pub fetcher: &'a dyn ReleaseFetcher,
    pub builder: &'a dyn SourceBuilder,
    pub verifier: &'a dyn Verifier,
}

impl AcquisitionPipeline<'_> {
    /// Acquire a verified working binary, or fail with
    /// [`ProvisionError::InstallationNonFunctional`].
    pub fn acquire(&self, request: &AcquisitionRequest) -> Result<AcquisitionOutcome> {
        let outcome = self.run_tiers(request)?;

        if outcome.wants_binary_cache_save() && self.store.is_available() {
            let key = request.binary_cache_key();
            match self.store.save(&[request.install_dir.clone()], &key) {
                Ok(_) => output::detail(&format!("saved binary cache entry {}", key)),
                Err(e) => output::warning(&format!("unable to save binary cache: {}", e)),
            }
        }

        Ok(outcome)
    }

    fn run_tiers(&self, request: &AcquisitionRequest) -> Result<AcquisitionOutcome> {
        if request.install_mode == InstallMode::Binary {
            if self.restored_from_cache(request) {
                output::skip(&format!(
                    "binary cache hit for {}",
                    request.resolved.version_string()
                ));
                return Ok(AcquisitionOutcome::CacheHit);
            }

            if self.downloaded_prebuilt(request) {
                return Ok(AcquisitionOutcome::DownloadHit);
            }
        }

        self.built_from_source(request)
    }

    /// Cache tier. A hit is strictly a restore confirmation matching the
    /// requested key, plus a binary that still verifies; everything else is
    /// a miss.
    fn restored_from_cache(&self, request: &AcquisitionRequest) -> bool {
        if !self.store.is_available() {
            return false;
        }

        let key = request.binary_cache_key();
        let restored = match self.store.restore(&[request.install_dir.clone()], &key, &[]) {
            Ok(Some(matched)) => matched == key,
            Ok(None) => false,
            Err(e) => {
                output::warning(&format!("binary cache restore failed: {}", e));
                false
            }
        };

        restored && self.verifier.verify(&request.bin_dir)
    }

    /// Download tier. No matrix entry for this platform/version is a quiet
    /// miss; a failed download or a non-verifying binary is a logged miss.
    fn downloaded_prebuilt(&self, request: &AcquisitionRequest) -> bool {
        let Some(release) = matrix::lookup(&request.platform, &request.resolved.version) else {
            output::detail(&format!(
                "no prebuilt archive for {} {} {}",
                request.platform.os,
                request.platform.arch,
                request.resolved.version_string()
            ));
            return false;
        };

        let version = request.resolved.version_string();
        match self.fetcher.fetch(release, &version, &request.bin_dir) {
            Ok(()) => {}
            Err(e) => {
                output::warning(&format!("prebuilt download failed: {}", e));
                return false;
            }
        }

        if self.verifier.verify(&request.bin_dir) {
            true
        } else {
            output::warning("downloaded binary is not functional");
            false
        }
    }

    /// Source tier. The last resort: a build error or failed verification
    /// here is fatal.
    fn built_from_source(&self, request: &AcquisitionRequest) -> Result<AcquisitionOutcome> {
        output::action(&format!(
            "building ccache {} from source",
            request.resolved.version_string()
        ));

        self.builder
            .build_and_install(&request.resolved.tag, &request.install_dir)?;

        if self.verifier.verify(&request.bin_dir) {
            Ok(AcquisitionOutcome::BuiltFromSource)
        } else {
            Err(ProvisionError::InstallationNonFunctional.into())
        }
    }
}

/// Live fetcher: download the archive, unpack it, move the binary into the
/// install tree.
pub struct HttpReleaseFetcher;

impl ReleaseFetcher for HttpReleaseFetcher {
    fn fetch(&self, release: &BinaryRelease, version: &str, bin_dir: &Path) -> Result<()> {
        let (url, dir) = release.render(version);

        let temp = tempfile::tempdir()?;
        let archive_name = url.rsplit('/').next().unwrap_or("ccache-archive");
        let archive_path = temp.path().join(archive_name);

        download::download(&url, &archive_path)?;
        extract::extract(&archive_path, temp.path(), release.kind)?;

        let binary_name = if cfg!(windows) { "ccache.exe" } else { "ccache" };
        let extracted = temp.path().join(dir).join(binary_name);

        std::fs::create_dir_all(bin_dir)?;
        move_file(&extracted, &bin_dir.join(binary_name))?;
        Ok(())
    }
}

/// Rename, falling back to copy for cross-device moves.
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    std::fs::copy(src, dest)?;
    std::fs::remove_file(src)?;
    Ok(())
}

/// Live builder: check out the tag in the cloned repository and run the
/// cmake configure/build/install sequence.
pub struct CmakeSourceBuilder {
    pub repo_path: PathBuf,
}

impl SourceBuilder for CmakeSourceBuilder {
    fn build_and_install(&self, tag: &str, install_dir: &Path) -> Result<()> {
        git::checkout(&self.repo_path, tag)?;
        cmake::configure(&self.repo_path)?;
        cmake::build(&self.repo_path)?;
        cmake::install(&self.repo_path, install_dir)?;
        Ok(())
    }
}
