//! Archive extraction and cache-blob packing.
//!
//! Release archives (tar.gz, tar.xz, zip) are unpacked with native crates,
//! no external tools. Cache blobs exchanged with the remote store are
//! tar+zstd archives holding workspace-relative paths.

use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Component, Path};

use crate::core::output;

/// Archive kind of a prebuilt release, as published upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
}

/// Extract a tar stream with path-traversal checks.
fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    for entry in archive.entries().context("tar read error")? {
        let mut entry = entry.context("tar entry error")?;
        let path = entry.path().context("tar path error")?.into_owned();

        // Reject paths that could escape the destination.
        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(anyhow!("tar contains unsafe path: {}", path.display()));
        }

        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        let full_path = dest.join(&path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }

        entry
            .unpack(&full_path)
            .with_context(|| format!("unpack error for {}", path.display()))?;
    }

    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("cannot open {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("zip read error")?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("zip entry error")?;

        // enclosed_name() is None for unsafe paths; skip those entries.
        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("cannot create directory {}", outpath.display()))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create directory {}", parent.display()))?;
            }
            let mut outfile = File::create(&outpath)
                .with_context(|| format!("cannot create {}", outpath.display()))?;
            std::io::copy(&mut file, &mut outfile)
                .with_context(|| format!("write error for {}", outpath.display()))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
                }
            }
        }
    }

    Ok(())
}

/// Extract a release archive to `dest`.
///
/// Tar archives are decompressed by filename suffix (.tar.gz/.tgz or
/// .tar.xz/.txz); zip archives by `ArchiveKind::Zip`.
pub fn extract(archive_path: &Path, dest: &Path, kind: ArchiveKind) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("cannot create destination {}", dest.display()))?;

    let name = archive_path
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let pb = output::spinner(&format!("extracting {}", name));
    let result = match kind {
        ArchiveKind::Zip => extract_zip(archive_path, dest),
        ArchiveKind::Tar => {
            let file = File::open(archive_path)
                .with_context(|| format!("cannot open {}", archive_path.display()))?;
            let reader = BufReader::new(file);
            if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
                extract_tar(flate2::read::GzDecoder::new(reader), dest)
            } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
                extract_tar(xz2::read::XzDecoder::new(reader), dest)
            } else {
                extract_tar(reader, dest)
            }
        }
    };
    pb.finish_and_clear();

    result?;
    output::detail(&format!("extracted {} to {}", name, dest.display()));
    Ok(())
}

/// Pack a directory into a tar+zstd blob for the remote cache store.
///
/// Entries are stored under the directory's own name so unpacking next to
/// the original location round-trips the tree.
pub fn pack_tzst(dir: &Path, archive_path: &Path) -> Result<u64> {
    let file = File::create(archive_path)
        .with_context(|| format!("cannot create {}", archive_path.display()))?;
    let encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), 3)
        .context("zstd init error")?
        .auto_finish();

    let mut builder = tar::Builder::new(encoder);
    let name = dir
        .file_name()
        .ok_or_else(|| anyhow!("cannot archive {}: no directory name", dir.display()))?;
    builder
        .append_dir_all(name, dir)
        .with_context(|| format!("cannot archive {}", dir.display()))?;
    builder.finish().context("tar finish error")?;
    drop(builder);

    let size = std::fs::metadata(archive_path)?.len();
    Ok(size)
}

/// Unpack a tar+zstd cache blob into the parent of its original directory.
pub fn unpack_tzst(archive_path: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("cannot create destination {}", dest.display()))?;
    let file = File::open(archive_path)
        .with_context(|| format!("cannot open {}", archive_path.display()))?;
    let decoder = zstd::stream::read::Decoder::new(BufReader::new(file)).context("zstd init error")?;
    extract_tar(decoder, dest)
}
