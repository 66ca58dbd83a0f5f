//! Source download with streaming SHA256 computation.
//!
//! Remote (`http(s)://`) sources are streamed to disk with `reqwest`; local
//! sources (`file://` or a plain path) are copied. Either way the digest is
//! computed over the bytes as they are written, so the archive is read once.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Failures while retrieving source bytes.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport or HTTP status failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A local source path does not exist.
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The URL scheme is neither http(s) nor file.
    #[error("unsupported source scheme: {0}")]
    UnsupportedScheme(String),
}

/// Where a source lives, as parsed from a recipe URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// `http://` or `https://`
    Remote(String),
    /// `file://` URL or a plain filesystem path.
    Local(PathBuf),
}

impl SourceLocation {
    /// Classify a recipe URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnsupportedScheme`] for any other `scheme://`.
    pub fn parse(url: &str) -> Result<Self, DownloadError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Self::Remote(url.to_string()));
        }
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(Self::Local(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(DownloadError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(Self::Local(PathBuf::from(url)))
    }
}

/// Fetch `location` into `dest`, returning the hex SHA256 of the bytes written.
///
/// # Errors
///
/// Returns an error on any transport, status, or filesystem failure. A
/// partially written `dest` is left for the caller to discard.
pub async fn fetch_to_file(
    client: &Client,
    location: &SourceLocation,
    dest: &Path,
) -> Result<String, DownloadError> {
    match location {
        SourceLocation::Remote(url) => download(client, url, dest).await,
        SourceLocation::Local(path) => copy_local(path, dest).await,
    }
}

async fn download(client: &Client, url: &str, dest: &Path) -> Result<String, DownloadError> {
    tracing::debug!(url, "downloading source");

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await?;
    tracing::debug!(url, bytes = downloaded, "download complete");
    Ok(hex::encode(hasher.finalize()))
}

async fn copy_local(src: &Path, dest: &Path) -> Result<String, DownloadError> {
    let mut input = match File::open(src).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DownloadError::NotFound(src.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let mut output = File::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = input.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buffer[..n]).await?;
        hasher.update(&buffer[..n]);
    }

    output.flush().await?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compute SHA256 of a file (streaming, synchronous).
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
