//! Remote cache store.
//!
//! `CacheStore` is the seam the acquisition pipeline and the teardown
//! reconciler talk to; `ActionsCacheClient` is the live implementation
//! speaking the GitHub Actions cache HTTP API. Cache blobs are tar+zstd
//! archives of a single directory, unpacked next to where the directory
//! originally lived.
//!
//! Callers treat every failure here as non-fatal: a restore error is a
//! miss, a save error is a skipped save.

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::download;
use super::extract;
use crate::core::output;

/// Opaque key/value blob storage, keyed by string.
pub trait CacheStore {
    /// Whether the store can be reached at all in this environment.
    fn is_available(&self) -> bool;

    /// Restore `paths` from the entry matching `primary_key`, or any entry
    /// whose key starts with one of `restore_key_prefixes`. Returns the
    /// matched key, or `None` on miss.
    fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_key_prefixes: &[String],
    ) -> Result<Option<String>>;

    /// Save `paths` under `key`. Returns the stored blob size.
    fn save(&self, paths: &[PathBuf], key: &str) -> Result<Option<u64>>;

    /// Delete the entry stored under `key`. Requires a credential.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Live client for the GitHub Actions cache service.
///
/// Restore/save use the runner-scoped cache endpoint
/// (`ACTIONS_CACHE_URL` + `ACTIONS_RUNTIME_TOKEN`); deletion goes through
/// the repository REST API and needs a `GITHUB_TOKEN`.
pub struct ActionsCacheClient {
    cache_url: Option<String>,
    runtime_token: Option<String>,
    api_url: String,
    repository: Option<String>,
    token: Option<String>,
}

const API_ACCEPT: &str = "application/json;api-version=6.0-preview.1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

impl ActionsCacheClient {
    /// Build a client from the runner environment.
    ///
    /// `token` is the deletion credential; absent means stale entries are
    /// left in place.
    pub fn from_env(token: Option<String>) -> Self {
        Self {
            cache_url: std::env::var("ACTIONS_CACHE_URL").ok().filter(|s| !s.is_empty()),
            runtime_token: std::env::var("ACTIONS_RUNTIME_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            api_url: std::env::var("GITHUB_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            repository: std::env::var("GITHUB_REPOSITORY").ok().filter(|s| !s.is_empty()),
            token,
        }
    }

    fn endpoint(&self, resource: &str) -> Result<String> {
        let base = self
            .cache_url
            .as_deref()
            .ok_or_else(|| anyhow!("cache service not available"))?;
        let base = base.strip_suffix('/').unwrap_or(base);
        Ok(format!("{}/_apis/artifactcache/{}", base, resource))
    }

    fn runtime_token(&self) -> Result<&str> {
        self.runtime_token
            .as_deref()
            .ok_or_else(|| anyhow!("cache service not available"))
    }

    /// Cache entries are namespaced by a version digest of the stored paths
    /// and the blob format, so layout changes never collide.
    fn blob_version(paths: &[PathBuf]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for path in paths {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(b"tzst");
        hex::encode(hasher.finalize())
    }

    fn single_dir(paths: &[PathBuf]) -> Result<&PathBuf> {
        paths
            .first()
            .ok_or_else(|| anyhow!("no path given for cache operation"))
    }
}

impl CacheStore for ActionsCacheClient {
    fn is_available(&self) -> bool {
        self.cache_url.is_some() && self.runtime_token.is_some()
    }

    fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_key_prefixes: &[String],
    ) -> Result<Option<String>> {
        let dir = Self::single_dir(paths)?;

        let mut keys = vec![primary_key.to_string()];
        keys.extend(restore_key_prefixes.iter().cloned());
        let url = self.endpoint(&format!(
            "cache?keys={}&version={}",
            keys.join(","),
            Self::blob_version(paths)
        ))?;

        let response = ureq::get(&url)
            .timeout(HTTP_TIMEOUT)
            .set("Accept", API_ACCEPT)
            .set("Authorization", &format!("Bearer {}", self.runtime_token()?))
            .call()
            .map_err(|e| anyhow!("cache lookup failed: {}", e))?;

        // 204 means no entry for any of the keys.
        if response.status() == 204 {
            return Ok(None);
        }

        let body: serde_json::Value = response.into_json().context("cache lookup response")?;
        let matched_key = body
            .get("cacheKey")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("cache lookup response missing cacheKey"))?
            .to_string();
        let archive_url = body
            .get("archiveLocation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("cache lookup response missing archiveLocation"))?;

        let temp = tempfile::tempdir().context("cannot create temp dir")?;
        let blob = temp.path().join("cache.tzst");
        download::download(archive_url, &blob)?;

        let dest = dir.parent().unwrap_or(Path::new("/"));
        extract::unpack_tzst(&blob, dest)?;

        Ok(Some(matched_key))
    }

    fn save(&self, paths: &[PathBuf], key: &str) -> Result<Option<u64>> {
        let dir = Self::single_dir(paths)?;

        let temp = tempfile::tempdir().context("cannot create temp dir")?;
        let blob = temp.path().join("cache.tzst");
        let size = extract::pack_tzst(dir, &blob)?;

        // Reserve the entry.
        let reserve_url = self.endpoint("caches")?;
        let response = ureq::post(&reserve_url)
            .timeout(HTTP_TIMEOUT)
            .set("Accept", API_ACCEPT)
            .set("Authorization", &format!("Bearer {}", self.runtime_token()?))
            .send_json(serde_json::json!({
                "key": key,
                "version": Self::blob_version(paths),
                "cacheSize": size,
            }))
            .map_err(|e| anyhow!("cache reserve failed: {}", e))?;

        let body: serde_json::Value = response.into_json().context("cache reserve response")?;
        let cache_id = body
            .get("cacheId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| anyhow!("cache reserve response missing cacheId"))?;

        // Upload the blob in one chunk, then commit.
        let data = std::fs::read(&blob).context("cannot read cache blob")?;
        let upload_url = self.endpoint(&format!("caches/{}", cache_id))?;
        ureq::request("PATCH", &upload_url)
            .timeout(HTTP_TIMEOUT)
            .set("Accept", API_ACCEPT)
            .set("Authorization", &format!("Bearer {}", self.runtime_token()?))
            .set("Content-Type", "application/octet-stream")
            .set("Content-Range", &format!("bytes 0-{}/*", size.saturating_sub(1)))
            .send_bytes(&data)
            .map_err(|e| anyhow!("cache upload failed: {}", e))?;

        ureq::post(&upload_url)
            .timeout(HTTP_TIMEOUT)
            .set("Accept", API_ACCEPT)
            .set("Authorization", &format!("Bearer {}", self.runtime_token()?))
            .send_json(serde_json::json!({ "size": size }))
            .map_err(|e| anyhow!("cache commit failed: {}", e))?;

        output::detail(&format!("saved cache entry {} ({} bytes)", key, size));
        Ok(Some(size))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow!("no credential for cache deletion"))?;
        let repository = self
            .repository
            .as_deref()
            .ok_or_else(|| anyhow!("GITHUB_REPOSITORY not set"))?;

        let url = format!(
            "{}/repos/{}/actions/caches?key={}",
            self.api_url, repository, key
        );
        ureq::delete(&url)
            .timeout(HTTP_TIMEOUT)
            .set("Accept", "application/vnd.github+json")
            .set("Authorization", &format!("Bearer {}", token))
            .set("User-Agent", "ccache-provision")
            .call()
            .map_err(|e| anyhow!("cache deletion failed for {}: {}", key, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> ActionsCacheClient {
        ActionsCacheClient {
            cache_url: None,
            runtime_token: None,
            api_url: "https://api.github.com".to_string(),
            repository: None,
            token: None,
        }
    }

    #[test]
    fn test_unavailable_without_runner_env() {
        let client = offline_client();
        assert!(!client.is_available());
    }

    #[test]
    fn test_restore_without_service_errors() {
        let client = offline_client();
        let result = client.restore(&[PathBuf::from("/tmp/x")], "key", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_without_credential_errors() {
        let client = offline_client();
        assert!(client.delete("some_key").is_err());
    }

    #[test]
    fn test_blob_version_depends_on_paths() {
        let a = ActionsCacheClient::blob_version(&[PathBuf::from("/w/.ccache")]);
        let b = ActionsCacheClient::blob_version(&[PathBuf::from("/w/other")]);
        assert_ne!(a, b);
        assert_eq!(a, ActionsCacheClient::blob_version(&[PathBuf::from("/w/.ccache")]));
    }
}
