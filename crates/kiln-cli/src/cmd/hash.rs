//! Hash command

use anyhow::{Context, Result};
use kiln_core::io::download::hash_file;
use std::path::PathBuf;

/// Print the SHA-256 of each file, for pinning recipe sources.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let hash =
            hash_file(file).with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("{hash}  {}", file.display());
    }
    Ok(())
}
