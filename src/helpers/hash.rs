//! Content hashing over a directory tree.
//!
//! Produces a SHA-256 digest for the set of files matched by glob patterns.
//! Each file is hashed individually on a small worker pool, then the sorted
//! per-file digests are fed to a combining SHA-256, so the result does not
//! depend on enumeration or completion order. An empty match set yields the
//! empty-string sentinel.

use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Chunk size for reading files during hashing (1MB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Upper bound on hashing workers.
const MAX_WORKERS: usize = 8;

/// Sentinel returned when no files match.
pub const EMPTY_TREE: &str = "";

/// Hash the files matched by `includes`, minus those matched by `excludes`.
///
/// Directories are never hashed, only regular files. Returns [`EMPTY_TREE`]
/// when nothing matches.
pub fn hash_tree(includes: &[String], excludes: &[String]) -> Result<String> {
    let mut files = collect_files(includes, excludes)?;
    if files.is_empty() {
        return Ok(EMPTY_TREE.to_string());
    }
    files.sort();
    files.dedup();

    let mut digests = hash_files(&files)?;
    digests.sort();

    let mut combined = Sha256::new();
    for digest in &digests {
        combined.update(digest.as_bytes());
    }
    Ok(hex::encode(combined.finalize()))
}

/// Enumerate matching regular files.
fn collect_files(includes: &[String], excludes: &[String]) -> Result<Vec<PathBuf>> {
    let exclude_patterns: Vec<glob::Pattern> = excludes
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid exclude pattern: {}", p)))
        .collect::<Result<_>>()?;

    let mut files = Vec::new();
    for pattern in includes {
        let matches =
            glob::glob(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        for entry in matches {
            let path = entry.context("glob walk error")?;
            if !path.is_file() {
                continue;
            }
            if exclude_patterns.iter().any(|p| p.matches_path(&path)) {
                continue;
            }
            files.push(path);
        }
    }

    Ok(files)
}

/// Hash each file on a pool of up to `MAX_WORKERS` threads.
///
/// Results are written into per-index slots, keeping the output stable no
/// matter which worker finishes first.
fn hash_files(files: &[PathBuf]) -> Result<Vec<String>> {
    let workers = files.len().min(MAX_WORKERS).min(num_cpus::get()).max(1);
    let next = AtomicUsize::new(0);

    let mut slots: Vec<Option<Result<String>>> = Vec::new();
    slots.resize_with(files.len(), || None);
    let slots = std::sync::Mutex::new(slots);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    if i >= files.len() {
                        break;
                    }
                    let result = hash_file(&files[i]);
                    slots.lock().expect("hash slot lock poisoned")[i] = Some(result);
                }
            });
        }
    });

    slots
        .into_inner()
        .expect("hash slot lock poisoned")
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("file not hashed"))))
        .collect()
}

/// SHA-256 of one file, streamed in chunks.
fn hash_file(path: &PathBuf) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file
            .read(&mut buffer)
            .with_context(|| format!("read error: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn include_all(dir: &Path) -> Vec<String> {
        vec![format!("{}/**/*", dir.display())]
    }

    #[test]
    fn test_empty_tree_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let digest = hash_tree(&include_all(dir.path()), &[]).unwrap();
        assert_eq!(digest, EMPTY_TREE);
    }

    #[test]
    fn test_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"hello world").unwrap();

        // sha256("hello world"), then sha256 over that hex digest.
        let inner = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        let mut combined = Sha256::new();
        combined.update(inner.as_bytes());
        let expected = hex::encode(combined.finalize());

        let digest = hash_tree(&include_all(dir.path()), &[]).unwrap();
        assert_eq!(digest, expected);
    }

    #[test]
    fn test_order_independence() {
        let a = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("x"), b"one").unwrap();
        std::fs::write(a.path().join("y"), b"two").unwrap();
        std::fs::write(a.path().join("z"), b"three").unwrap();

        // Same contents under names that enumerate in a different order.
        let b = tempfile::tempdir().unwrap();
        std::fs::write(b.path().join("z"), b"three").unwrap();
        std::fs::write(b.path().join("y"), b"two").unwrap();
        std::fs::write(b.path().join("x"), b"one").unwrap();

        let da = hash_tree(&include_all(a.path()), &[]).unwrap();
        let db = hash_tree(&include_all(b.path()), &[]).unwrap();
        assert_eq!(da, db);
    }

    #[test]
    fn test_content_change_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"before").unwrap();
        let first = hash_tree(&include_all(dir.path()), &[]).unwrap();

        std::fs::write(dir.path().join("a"), b"after").unwrap();
        let second = hash_tree(&include_all(dir.path()), &[]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("object"), b"data").unwrap();
        std::fs::write(dir.path().join("stats"), b"counters").unwrap();

        let without_stats = hash_tree(
            &include_all(dir.path()),
            &[format!("{}/**/stats", dir.path().display())],
        )
        .unwrap();

        // Changing the excluded file must not affect the digest.
        std::fs::write(dir.path().join("stats"), b"different counters").unwrap();
        let again = hash_tree(
            &include_all(dir.path()),
            &[format!("{}/**/stats", dir.path().display())],
        )
        .unwrap();
        assert_eq!(without_stats, again);
    }

    #[test]
    fn test_many_files_pool() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..50 {
            std::fs::write(dir.path().join(format!("f{:02}", i)), format!("body {}", i)).unwrap();
        }
        let first = hash_tree(&include_all(dir.path()), &[]).unwrap();
        let second = hash_tree(&include_all(dir.path()), &[]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }
}
