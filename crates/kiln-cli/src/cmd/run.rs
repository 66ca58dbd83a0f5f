//! Run command: the full pipeline

use anyhow::{Context, Result};
use kiln_core::{Harness, HarnessOptions, Reporter};
use std::path::Path;

use crate::GlobalOptions;
use crate::ui::ConsoleReporter;

/// Fetch, build, install and smoke-test `recipe_path` into `options.prefix`.
pub async fn run(
    recipe_path: &Path,
    options: &HarnessOptions,
    global: &GlobalOptions,
    json: bool,
) -> Result<()> {
    let recipe = super::load_recipe(recipe_path)?;
    let reporter = ConsoleReporter::new(global.quiet);
    reporter.info(&format!(
        "{} {} -> {}",
        recipe.package.name,
        recipe.package.version,
        options.prefix.display()
    ));

    let harness = Harness::new(super::http_client()?, options, &reporter);
    let report = harness
        .run(&recipe)
        .await
        .map_err(super::stage_failure)?;

    reporter.summary(report.installed.len(), "installed", report.elapsed_secs);

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{out}");
    }
    Ok(())
}
