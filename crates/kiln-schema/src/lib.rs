//! Shared types for kiln: recipes, artifact kinds and integrity digests.

pub mod hash;
pub mod recipe;
pub mod types;

// Re-exports
pub use hash::*;
pub use recipe::{ArtifactSpec, PackageInfo, Recipe, RecipeError, SmokeSpec, SourceSpec};
pub use types::*;
