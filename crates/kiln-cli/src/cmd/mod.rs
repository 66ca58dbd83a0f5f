//! Command modules - one file per CLI command

pub mod build;
pub mod check;
pub mod fetch;
pub mod hash;
pub mod run;
pub mod smoke;

use anyhow::{Context, Result};
use kiln_schema::Recipe;
use std::path::Path;

/// Load and validate a recipe file.
pub(crate) fn load_recipe(path: &Path) -> Result<Recipe> {
    let recipe = Recipe::load(path)
        .with_context(|| format!("Failed to load recipe {}", path.display()))?;
    tracing::debug!(
        recipe = %path.display(),
        artifacts = recipe.artifacts.len(),
        "loaded recipe"
    );
    Ok(recipe)
}

/// HTTP client for source downloads.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(kiln_core::USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Turn a harness failure into a CLI error naming the stage.
pub(crate) fn stage_failure(err: kiln_core::HarnessError) -> anyhow::Error {
    if let kiln_core::HarnessError::Build(build) = &err {
        if !build.log_tail.is_empty() {
            eprintln!("{}", build.log_tail);
        }
        if let Some(log) = &build.log_path {
            eprintln!("full log: {}", log.display());
        }
    }
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("{stage} stage failed"))
}
