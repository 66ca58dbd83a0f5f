//! Archive extraction module
//!
//! Handles tar.gz, tar.zst, plain tar and zip source archives.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use kiln_schema::ArchiveFormat;
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

/// Failures while unpacking a source archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive is corrupt or contains an unsafe entry.
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Extract `archive_path` into `dest_dir` according to `format`, returning
/// the number of files written.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, is malformed, or contains
/// an entry (or link target) that would land outside `dest_dir`.
pub fn extract(
    archive_path: &Path,
    format: ArchiveFormat,
    dest_dir: &Path,
) -> Result<usize, ExtractError> {
    match format {
        ArchiveFormat::TarGz => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(flate2::read::GzDecoder::new(reader), dest_dir)
        }
        ArchiveFormat::TarZst => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(ZstdDecoder::new(reader)?, dest_dir)
        }
        ArchiveFormat::Tar => extract_tar(BufReader::new(File::open(archive_path)?), dest_dir),
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
    }
}

/// Normalise an archive entry path, rejecting anything that could escape
/// the destination (absolute paths, `..`).
fn safe_relative(path: &Path) -> Result<PathBuf, ExtractError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(ExtractError::Archive(format!(
                    "Invalid path in archive: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(out)
}

/// Whether `target`, read relative to `base`, stays under the extraction
/// root. `base` is itself relative to the root.
fn link_stays_inside(base: &Path, target: &Path) -> bool {
    let mut depth: usize = 0;
    for component in base.components().chain(target.components()) {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn escaping_link(path: &Path, target: &Path) -> ExtractError {
    ExtractError::Archive(format!(
        "Link escapes archive root: {} -> {}",
        path.display(),
        target.display()
    ))
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut extracted = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = safe_relative(&entry.path()?)?;
        if relative_path.as_os_str().is_empty() {
            continue;
        }
        let absolute_path = dest_dir.join(&relative_path);

        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        // pax global headers and the like carry no file
        if entry.header().entry_type().is_pax_global_extensions() {
            continue;
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()?
                .ok_or_else(|| {
                    ExtractError::Archive(format!(
                        "Link without target: {}",
                        relative_path.display()
                    ))
                })?
                .into_owned();

            if entry_type.is_hard_link() {
                // Hard link targets name another entry from the archive root.
                let inside = safe_relative(&target)
                    .map_err(|_| escaping_link(&relative_path, &target))?;
                fs::hard_link(dest_dir.join(inside), &absolute_path)?;
                extracted += 1;
                continue;
            }

            let base = relative_path.parent().unwrap_or_else(|| Path::new(""));
            if !link_stays_inside(base, &target) {
                return Err(escaping_link(&relative_path, &target));
            }
        }

        entry.unpack(&absolute_path)?;
        extracted += 1;
    }

    Ok(extracted)
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                file.name()
            )));
        };

        let absolute_path = dest_dir.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        extracted += 1;
    }

    Ok(extracted)
}

/// The directory builds should run from after extraction.
///
/// Release tarballs usually wrap everything in one `name-version/` directory;
/// when that is the only entry, it becomes the source root.
///
/// # Errors
///
/// Returns an error if `dest_dir` cannot be listed.
pub fn source_root(dest_dir: &Path) -> io::Result<PathBuf> {
    let mut entries = fs::read_dir(dest_dir)?;
    let first = entries.next().transpose()?;
    let second = entries.next().transpose()?;

    match (first, second) {
        (Some(only), None) if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Ok(dest_dir.to_path_buf()),
    }
}
