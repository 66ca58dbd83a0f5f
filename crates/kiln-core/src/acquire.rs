//! Source acquisition: fetch, verify, extract.
//!
//! The acquirer is all-or-nothing. Every byte lands in a private staging
//! directory under the work directory, and that directory is removed on any
//! failure. Only an archive whose SHA256 matches the recipe is extracted, so
//! a mismatched download never produces a source tree a build could run in.

use std::path::{Path, PathBuf};

use kiln_schema::{ArchiveFormat, SourceSpec};
use reqwest::Client;
use tempfile::TempDir;
use thiserror::Error;

use crate::io::download::{self, DownloadError, SourceLocation};
use crate::io::extract::{self, ExtractError};

/// Acquisition failures.
#[derive(Error, Debug)]
pub enum AcquireError {
    /// The source could not be retrieved (network, HTTP status, missing file).
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        /// Recipe source URL.
        url: String,
        /// Underlying retrieval error.
        source: DownloadError,
    },

    /// The retrieved bytes do not hash to the pinned value.
    #[error("integrity check failed for {url}: expected sha256 {expected}, got {actual}")]
    Integrity {
        /// Recipe source URL.
        url: String,
        /// Hash pinned in the recipe.
        expected: String,
        /// Hash of the bytes actually retrieved.
        actual: String,
    },

    /// The URL does not name an archive format the harness can unpack.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// The verified archive could not be unpacked.
    #[error("failed to extract {url}: {source}")]
    Extract {
        /// Recipe source URL.
        url: String,
        /// Underlying extraction error.
        source: ExtractError,
    },

    /// The staging directory could not be created or cleaned up.
    #[error("failed to prepare staging directory: {0}")]
    Staging(#[from] std::io::Error),
}

impl AcquireError {
    /// Whether this is a hash mismatch rather than a retrieval problem.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

/// An extracted, verified source tree.
///
/// The tree lives in a staging directory that is deleted when this value is
/// dropped, unless [`SourceTree::keep`] is called.
#[derive(Debug)]
pub struct SourceTree {
    staging: TempDir,
    root: PathBuf,
    sha256: String,
}

impl SourceTree {
    /// Directory builds run relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Verified SHA256 of the archive.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Persist the tree past this value's lifetime and return its root.
    pub fn keep(self) -> PathBuf {
        let _ = self.staging.keep();
        self.root
    }
}

/// Fetches and verifies pinned source archives.
#[derive(Debug, Clone)]
pub struct SourceAcquirer {
    client: Client,
    work_dir: PathBuf,
}

impl SourceAcquirer {
    /// Create an acquirer staging under `work_dir`.
    pub fn new(client: Client, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            work_dir: work_dir.into(),
        }
    }

    /// Retrieve `spec.url`, verify it against `spec.sha256`, and extract it.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::UnsupportedFormat`] before any retrieval if the URL
    ///   is not a known archive type.
    /// - [`AcquireError::Fetch`] on any retrieval failure.
    /// - [`AcquireError::Integrity`] on hash mismatch; nothing is extracted.
    /// - [`AcquireError::Extract`] if the verified archive is malformed.
    ///
    /// No staging state survives an error.
    pub async fn acquire(&self, spec: &SourceSpec) -> Result<SourceTree, AcquireError> {
        let url = spec.url.as_str();
        let format = ArchiveFormat::from_filename(url)
            .ok_or_else(|| AcquireError::UnsupportedFormat(url.to_string()))?;
        let location = SourceLocation::parse(url).map_err(|source| AcquireError::Fetch {
            url: url.to_string(),
            source,
        })?;

        std::fs::create_dir_all(&self.work_dir)?;
        let staging = tempfile::Builder::new()
            .prefix("kiln-src-")
            .tempdir_in(&self.work_dir)?;

        let file_name = match crate::paths::filename_from_url(url) {
            "" => "source.archive",
            name => name,
        };
        let archive_path = staging.path().join(file_name);

        tracing::info!(url, "fetching source");
        let actual = download::fetch_to_file(&self.client, &location, &archive_path)
            .await
            .map_err(|source| AcquireError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if !spec.sha256.matches(&actual) {
            tracing::warn!(url, expected = %spec.sha256, %actual, "source hash mismatch");
            return Err(AcquireError::Integrity {
                url: url.to_string(),
                expected: spec.sha256.to_string(),
                actual,
            });
        }
        tracing::debug!(url, sha256 = %actual, "source verified");

        let extract_dir = staging.path().join("src");
        let unpack_from = archive_path.clone();
        let unpack_to = extract_dir.clone();
        let extract_failed = |source: ExtractError| AcquireError::Extract {
            url: url.to_string(),
            source,
        };
        let files = tokio::task::spawn_blocking(move || {
            extract::extract(&unpack_from, format, &unpack_to)
        })
        .await
        .map_err(|e| ExtractError::Archive(format!("extraction task failed: {e}")))
        .and_then(|result| result)
        .map_err(extract_failed)?;

        // The archive is no longer needed once unpacked.
        std::fs::remove_file(&archive_path)?;

        let root = extract::source_root(&extract_dir)
            .map_err(|e| extract_failed(ExtractError::Io(e)))?;
        tracing::info!(url, files, root = %root.display(), "source extracted");

        Ok(SourceTree {
            staging,
            root,
            sha256: actual,
        })
    }
}
