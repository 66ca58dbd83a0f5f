//! Check command: validate a recipe

use anyhow::Result;
use std::path::Path;

/// Parse and validate a recipe, then print what it declares.
pub fn check(recipe_path: &Path) -> Result<()> {
    let recipe = super::load_recipe(recipe_path)?;

    println!("Recipe is valid");
    println!("  Name: {}", recipe.package.name);
    println!("  Version: {}", recipe.package.version);
    println!("  Source: {}", recipe.source.url);
    println!("  Artifacts: {}", recipe.artifacts.len());
    for artifact in &recipe.artifacts {
        println!(
            "    {:<16} {:<15} {}",
            artifact.name,
            artifact.kind.as_str(),
            artifact.install_as
        );
    }
    match &recipe.smoke {
        Some(smoke) => println!(
            "  Smoke: {} (expects '{}')",
            smoke.binary,
            smoke.expected_marker(&recipe.package.version)
        ),
        None => println!("  Smoke: none"),
    }
    Ok(())
}
