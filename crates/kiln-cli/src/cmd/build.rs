//! Build command: build (and optionally install) an extracted tree

use anyhow::{Result, bail};
use kiln_core::{Harness, Reporter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::GlobalOptions;
use crate::ui::ConsoleReporter;

/// Build every artifact of `recipe_path` in `source`, installing into
/// `prefix` when one is given.
pub fn build(
    recipe_path: &Path,
    source: &Path,
    prefix: Option<PathBuf>,
    global: &GlobalOptions,
) -> Result<()> {
    let recipe = super::load_recipe(recipe_path)?;
    if !source.is_dir() {
        bail!("Source directory not found: {}", source.display());
    }

    let started = Instant::now();
    let reporter = ConsoleReporter::new(global.quiet);
    let options = global.harness(prefix.clone().unwrap_or_default());
    let harness = Harness::new(super::http_client()?, &options, &reporter);

    let report = harness
        .build(&recipe, source)
        .map_err(super::stage_failure)?;

    if prefix.is_some() {
        let installed = harness
            .install(&report, source)
            .map_err(super::stage_failure)?;
        reporter.summary(installed.len(), "installed", started.elapsed().as_secs_f64());
    } else {
        reporter.summary(report.results.len(), "built", started.elapsed().as_secs_f64());
    }
    Ok(())
}
