//! HTTP download helper.
//!
//! Streams a URL to a local file with a progress bar. The timeout applies
//! per request and can be raised through `CCACHE_PROVISION_HTTP_TIMEOUT`
//! for slow mirrors.

use anyhow::{Context, Result, anyhow};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::core::output;

/// Default HTTP timeout in seconds
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Get HTTP timeout from environment variable or use default.
/// Cached for performance (only reads env var once).
fn get_http_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let secs = std::env::var("CCACHE_PROVISION_HTTP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        Duration::from_secs(secs.clamp(5, 600))
    })
}

/// Download a file from a URL to a destination path.
///
/// Returns the number of bytes written.
pub fn download(url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }

    let filename = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());

    let pb = output::spinner(&format!("downloading {}", filename));

    let response = ureq::get(url)
        .timeout(get_http_timeout())
        .set("User-Agent", "ccache-provision")
        .call()
        .map_err(|e| anyhow!("download failed: {}: {}", url, e))?;

    if let Some(len) = response
        .header("content-length")
        .and_then(|s| s.parse().ok())
    {
        pb.set_length(len);
    }

    let mut file = std::fs::File::create(dest)
        .with_context(|| format!("cannot create file {}", dest.display()))?;

    let mut reader = response.into_reader();
    let mut buffer = [0u8; 8192];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer).context("read error")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read]).context("write error")?;
        total_bytes += bytes_read as u64;
        pb.set_position(total_bytes);
    }

    pb.finish_and_clear();
    output::detail(&format!("downloaded {} ({} bytes)", filename, total_bytes));
    Ok(total_bytes)
}
