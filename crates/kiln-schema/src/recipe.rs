//! Recipe files: the declarative description of one package.
//!
//! A recipe pins a source archive by hash, lists the artifacts to build in
//! order, and optionally describes a smoke test for one installed
//! executable. Recipes are TOML:
//!
//! ```toml
//! [package]
//! name = "tracy"
//! version = "0.10"
//!
//! [source]
//! url = "https://example.org/tracy-0.10.tar.gz"
//! sha256 = "574ae7bef1863d31ae0e39dba4a968dcd18fd731bbd7fa5e7916eb8df427746a"
//!
//! [[artifact]]
//! name = "profiler"
//! kind = "executable"
//! build_dir = "profiler/build/unix"
//! command = "make release LEGACY=1"
//! output = "Tracy-release"
//! install_as = "tracy"
//!
//! [smoke]
//! binary = "tracy"
//! expect = "Tracy Profiler {version}"
//! ```

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::Sha256Digest;
use crate::types::ArtifactKind;

/// Header extensions copied for a header set when the recipe names none.
pub const DEFAULT_HEADER_EXTENSIONS: &[&str] = &["h", "hpp"];

/// Placeholder replaced with the allocated port in smoke launch arguments.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Placeholder replaced with the package version in the smoke marker.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Errors raised while loading or validating a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// The recipe file could not be read.
    #[error("failed to read recipe {path}: {source}")]
    Io {
        /// Recipe path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The recipe is not valid TOML for this schema.
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] toml::de::Error),

    /// The recipe parsed but breaks a structural rule.
    #[error("invalid recipe: {0}")]
    Invalid(String),
}

/// A complete recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package identity.
    pub package: PackageInfo,

    /// Pinned upstream source.
    pub source: SourceSpec,

    /// Artifacts, in build order.
    #[serde(rename = "artifact", default)]
    pub artifacts: Vec<ArtifactSpec>,

    /// Optional smoke test for one installed executable.
    #[serde(default)]
    pub smoke: Option<SmokeSpec>,
}

/// Package identity. Only `name` and `version` carry meaning for the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name (e.g. "tracy").
    pub name: String,
    /// Release version (e.g. "0.10").
    pub version: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Upstream homepage.
    #[serde(default)]
    pub homepage: String,
}

/// Where the source archive lives and what it must hash to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// `http(s)://` or `file://` URL, or a local path.
    pub url: String,
    /// Expected SHA-256 of the archive bytes.
    pub sha256: Sha256Digest,
}

/// One buildable, installable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Unique name within the recipe.
    pub name: String,

    /// Where the artifact lands in the install layout.
    pub kind: ArtifactKind,

    /// Directory the build command runs in, relative to the source root.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Shell command that produces the artifact. Empty means nothing to build.
    #[serde(default)]
    pub command: String,

    /// Produced file (or header directory), relative to `build_dir`.
    pub output: PathBuf,

    /// Installed file name, or include subdirectory for header sets.
    pub install_as: String,

    /// Header-set filter; defaults to [`DEFAULT_HEADER_EXTENSIONS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from(".")
}

impl ArtifactSpec {
    /// Whether this artifact has a build step at all.
    pub fn has_command(&self) -> bool {
        !self.command.trim().is_empty()
    }

    /// Whether `path` carries one of this artifact's header extensions.
    ///
    /// Matching is case-insensitive, so `Foo.H` counts as a header.
    pub fn is_header(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        match &self.extensions {
            Some(exts) => exts.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => DEFAULT_HEADER_EXTENSIONS
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext)),
        }
    }
}

/// How to smoke-test an installed executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeSpec {
    /// `install_as` of the executable artifact under test.
    pub binary: String,

    /// Arguments for the version check.
    #[serde(default = "default_help_args")]
    pub help_args: Vec<String>,

    /// Marker that must appear in the version check output. `{version}` is
    /// replaced with the package version.
    pub expect: String,

    /// Arguments for the launch step. `{port}` is replaced with the allocated port.
    #[serde(default = "default_launch_args")]
    pub launch_args: Vec<String>,

    /// Fixed wait after launch, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Grace period after SIGTERM before escalating to SIGKILL, in milliseconds.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,

    /// Connect to the allocated port after settling and fail if nothing listens.
    #[serde(default)]
    pub probe_port: bool,
}

fn default_help_args() -> Vec<String> {
    vec!["--help".to_string()]
}

fn default_launch_args() -> Vec<String> {
    vec!["-p".to_string(), PORT_PLACEHOLDER.to_string()]
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_terminate_timeout_ms() -> u64 {
    5000
}

impl SmokeSpec {
    /// Fixed settle interval.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Bounded wait for a terminated child (and for the version check).
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    /// The marker with `{version}` expanded.
    pub fn expected_marker(&self, version: &str) -> String {
        self.expect.replace(VERSION_PLACEHOLDER, version)
    }

    /// Launch arguments with `{port}` expanded.
    pub fn launch_args_for(&self, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.launch_args
            .iter()
            .map(|a| a.replace(PORT_PLACEHOLDER, &port))
            .collect()
    }
}

impl Recipe {
    /// Parse a recipe from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::Parse`] on malformed TOML (including a bad
    /// digest) and [`RecipeError::Invalid`] if validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, RecipeError> {
        let recipe: Self = toml::from_str(content)?;
        recipe.validate()?;
        Ok(recipe)
    }

    /// Read, parse and validate a recipe file.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::Io`] if the file cannot be read, otherwise as
    /// [`Recipe::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, RecipeError> {
        let content = std::fs::read_to_string(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Look up an artifact by name.
    pub fn artifact(&self, name: &str) -> Option<&ArtifactSpec> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Check structural rules that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::Invalid`] describing the first broken rule.
    pub fn validate(&self) -> Result<(), RecipeError> {
        if self.package.name.trim().is_empty() {
            return invalid("package.name is empty");
        }
        if self.package.version.trim().is_empty() {
            return invalid("package.version is empty");
        }
        if self.source.url.trim().is_empty() {
            return invalid("source.url is empty");
        }
        if self.artifacts.is_empty() {
            return invalid("no [[artifact]] entries");
        }

        let mut seen = HashSet::new();
        for art in &self.artifacts {
            if art.name.trim().is_empty() {
                return invalid("artifact with empty name");
            }
            if !seen.insert(art.name.as_str()) {
                return invalid(format!("duplicate artifact '{}'", art.name));
            }
            if art.install_as.trim().is_empty() {
                return invalid(format!("artifact '{}': install_as is empty", art.name));
            }
            for (field, path) in [
                ("build_dir", art.build_dir.as_path()),
                ("output", art.output.as_path()),
                ("install_as", Path::new(&art.install_as)),
            ] {
                if !is_contained(path) {
                    return invalid(format!(
                        "artifact '{}': {field} must be a relative path without '..' ({})",
                        art.name,
                        path.display()
                    ));
                }
            }
            if art.kind.is_single_file() {
                if !art.has_command() {
                    return invalid(format!(
                        "artifact '{}': {} needs a build command",
                        art.name, art.kind
                    ));
                }
                if Path::new(&art.install_as).components().count() != 1 {
                    return invalid(format!(
                        "artifact '{}': install_as must be a plain file name",
                        art.name
                    ));
                }
            }
        }

        if let Some(smoke) = &self.smoke {
            let mut targets = self
                .artifacts
                .iter()
                .filter(|a| a.install_as == smoke.binary);
            let target = targets
                .clone()
                .find(|a| a.kind == ArtifactKind::Executable)
                .or_else(|| targets.next());
            match target {
                Some(a) if a.kind == ArtifactKind::Executable => {}
                Some(a) => {
                    return invalid(format!(
                        "smoke.binary '{}' is a {}, not an executable",
                        smoke.binary, a.kind
                    ));
                }
                None => {
                    return invalid(format!(
                        "smoke.binary '{}' is not installed by any artifact",
                        smoke.binary
                    ));
                }
            }
            if smoke.expect.trim().is_empty() {
                return invalid("smoke.expect is empty");
            }
            if !smoke.launch_args.iter().any(|a| a.contains(PORT_PLACEHOLDER)) {
                return invalid("smoke.launch_args must pass {port}");
            }
            if smoke.terminate_timeout_ms == 0 {
                return invalid("smoke.terminate_timeout_ms must be positive");
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Result<(), RecipeError> {
    Err(RecipeError::Invalid(msg.into()))
}

/// Relative, and never climbs out of its base directory.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
