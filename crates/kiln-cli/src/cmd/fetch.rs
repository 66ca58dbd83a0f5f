//! Fetch command

use anyhow::Result;
use kiln_core::acquire::SourceAcquirer;
use kiln_core::{Reporter, Stage};
use std::path::Path;

use crate::GlobalOptions;
use crate::ui::ConsoleReporter;

/// Acquire a recipe's source under `dest` and keep it.
pub async fn fetch(recipe_path: &Path, dest: &Path, global: &GlobalOptions) -> Result<()> {
    let recipe = super::load_recipe(recipe_path)?;
    let reporter = ConsoleReporter::new(global.quiet);

    reporter.stage(Stage::Fetch);
    let acquirer = SourceAcquirer::new(super::http_client()?, dest);
    let tree = acquirer
        .acquire(&recipe.source)
        .await
        .map_err(|e| super::stage_failure(e.into()))?;
    reporter.stage_done(Stage::Fetch, tree.sha256());

    let root = tree.keep();
    println!("{}", root.display());
    Ok(())
}
