//! Smoke command: verify an installed prefix

use anyhow::Result;
use kiln_core::Harness;
use std::path::{Path, PathBuf};

use crate::GlobalOptions;
use crate::ui::ConsoleReporter;

/// Smoke-test the recipe's executable under `prefix`.
pub fn smoke(recipe_path: &Path, prefix: PathBuf, global: &GlobalOptions) -> Result<()> {
    let recipe = super::load_recipe(recipe_path)?;
    let reporter = ConsoleReporter::new(global.quiet);
    let options = global.harness(prefix);
    let harness = Harness::new(super::http_client()?, &options, &reporter);

    match harness.smoke(&recipe).map_err(super::stage_failure)? {
        Some(report) => {
            reporter.success(&format!(
                "{} passed (port {}, {})",
                recipe.package.name,
                report.port,
                report.termination.status()
            ));
        }
        None => reporter.success(&format!(
            "{} declares no smoke test",
            recipe.package.name
        )),
    }
    Ok(())
}
