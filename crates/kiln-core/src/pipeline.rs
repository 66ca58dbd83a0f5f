//! The full harness run: fetch, build, install, smoke.
//!
//! Stages run strictly in order and the first failure ends the run. Only
//! acquisition is async; the later stages block the calling task.

use std::path::{Path, PathBuf};
use std::time::Instant;

use kiln_schema::{ArtifactKind, Recipe};
use reqwest::Client;
use serde::Serialize;

use crate::Reporter;
use crate::acquire::{SourceAcquirer, SourceTree};
use crate::build::{BuildOptions, BuildOrchestrator, BuildReport};
use crate::error::{HarnessError, Stage};
use crate::install::{InstallLayout, InstallLayoutManager, InstalledArtifact};
use crate::smoke::{SmokeOptions, SmokeReport, SmokeTestRunner, Termination};

/// Per-run harness settings.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Install prefix.
    pub prefix: PathBuf,
    /// Parent of staging directories.
    pub work_dir: PathBuf,
    /// Where build and smoke logs go.
    pub log_dir: PathBuf,
    /// Stream build output instead of logging it.
    pub verbose: bool,
    /// Keep the extracted source tree after the run.
    pub keep_source: bool,
    /// Skip the smoke stage even when the recipe has one.
    pub skip_smoke: bool,
}

impl HarnessOptions {
    /// Options installing into `prefix`, with work and log directories under
    /// the kiln home.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            work_dir: crate::paths::work_dir(),
            log_dir: crate::paths::log_dir(),
            verbose: false,
            keep_source: false,
            skip_smoke: false,
        }
    }
}

/// One installed artifact, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledSummary {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Installed file or include directory.
    pub destination: PathBuf,
    /// Number of files written.
    pub files: usize,
}

impl From<&InstalledArtifact> for InstalledSummary {
    fn from(a: &InstalledArtifact) -> Self {
        Self {
            name: a.name.clone(),
            kind: a.kind,
            destination: a.destination.clone(),
            files: a.files.len(),
        }
    }
}

/// Outcome of a passing smoke test, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeSummary {
    /// Port handed to the child.
    pub port: u16,
    /// Child process id.
    pub pid: u32,
    /// `already-exited`, `graceful` or `forced`.
    pub termination: &'static str,
    /// Exit status as printed by the OS.
    pub exit: String,
}

impl From<&SmokeReport> for SmokeSummary {
    fn from(r: &SmokeReport) -> Self {
        let termination = match r.termination {
            Termination::AlreadyExited(_) => "already-exited",
            Termination::Graceful(_) => "graceful",
            Termination::Forced(_) => "forced",
        };
        Self {
            port: r.port,
            pid: r.pid,
            termination,
            exit: r.termination.status().to_string(),
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    /// Package name.
    pub package: String,
    /// Package version.
    pub version: String,
    /// Verified SHA-256 of the source archive.
    pub source_sha256: String,
    /// Source tree root, when kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,
    /// Artifacts built, in order.
    pub built: Vec<String>,
    /// Artifacts installed, in order.
    pub installed: Vec<InstalledSummary>,
    /// Smoke test outcome, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoke: Option<SmokeSummary>,
    /// Wall-clock time of the run.
    pub elapsed_secs: f64,
}

/// Drives a recipe through every stage.
pub struct Harness<'r> {
    acquirer: SourceAcquirer,
    options: &'r HarnessOptions,
    reporter: &'r dyn Reporter,
}

impl std::fmt::Debug for Harness<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'r> Harness<'r> {
    /// Create a harness fetching with `client`.
    pub fn new(client: Client, options: &'r HarnessOptions, reporter: &'r dyn Reporter) -> Self {
        Self {
            acquirer: SourceAcquirer::new(client, &options.work_dir),
            options,
            reporter,
        }
    }

    /// Run every stage for `recipe`.
    ///
    /// # Errors
    ///
    /// Returns the first failure; [`HarnessError::stage`] names where it
    /// happened. A fetch or integrity failure means no build command ran.
    pub async fn run(&self, recipe: &Recipe) -> Result<HarnessReport, HarnessError> {
        let started = Instant::now();
        let tree = self.acquire(recipe).await?;

        let report = self.build(recipe, tree.root())?;
        let installed = self.install(&report, tree.root())?;
        let built: Vec<String> = report
            .results
            .iter()
            .map(|r| r.artifact.name.clone())
            .collect();

        let smoke = if self.options.skip_smoke {
            if recipe.smoke.is_some() {
                self.reporter.info("smoke test skipped");
            }
            None
        } else {
            self.smoke(recipe)?
        };

        let source_sha256 = tree.sha256().to_string();
        let source_dir = if self.options.keep_source {
            let root = tree.keep();
            self.reporter
                .info(&format!("source kept at {}", root.display()));
            Some(root)
        } else {
            None
        };

        Ok(HarnessReport {
            package: recipe.package.name.clone(),
            version: recipe.package.version.clone(),
            source_sha256,
            source_dir,
            built,
            installed: installed.iter().map(InstalledSummary::from).collect(),
            smoke: smoke.as_ref().map(SmokeSummary::from),
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Fetch, verify and extract the recipe's source.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Acquire`] on any acquisition failure.
    pub async fn acquire(&self, recipe: &Recipe) -> Result<SourceTree, HarnessError> {
        self.reporter.stage(Stage::Fetch);
        match self.acquirer.acquire(&recipe.source).await {
            Ok(tree) => {
                self.reporter.stage_done(Stage::Fetch, tree.sha256());
                Ok(tree)
            }
            Err(e) => {
                self.reporter.failed(&recipe.source.url, &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Build every artifact of `recipe` against `source_root`, stopping at
    /// the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Build`] for the failed artifact.
    pub fn build<'a>(
        &self,
        recipe: &'a Recipe,
        source_root: &Path,
    ) -> Result<BuildReport<'a>, HarnessError> {
        self.reporter.stage(Stage::Build);
        let options = BuildOptions {
            package: recipe.package.name.clone(),
            log_dir: self.options.log_dir.clone(),
            verbose: self.options.verbose,
        };
        let report = BuildOrchestrator::new(source_root, &options, self.reporter)
            .run(&recipe.artifacts);
        report.check()?;
        self.reporter
            .stage_done(Stage::Build, &format!("{} artifacts", report.results.len()));
        Ok(report)
    }

    /// Install a complete build into the prefix.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Install`] at the first artifact that cannot be
    /// installed. Artifacts installed before it are left in place.
    pub fn install(
        &self,
        report: &BuildReport<'_>,
        source_root: &Path,
    ) -> Result<Vec<InstalledArtifact>, HarnessError> {
        self.reporter.stage(Stage::Install);
        let layout = InstallLayout::new(&self.options.prefix);
        let installed =
            InstallLayoutManager::new(&layout, source_root, self.reporter).install(&report.results)?;
        self.reporter
            .stage_done(Stage::Install, &self.options.prefix.display().to_string());
        Ok(installed)
    }

    /// Smoke-test the recipe's executable in the prefix. Returns `None` when
    /// the recipe declares no smoke test.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SmokeBinary`] if the smoke binary is not one
    /// of the recipe's executables, or [`HarnessError::Smoke`] if the test
    /// fails.
    pub fn smoke(&self, recipe: &Recipe) -> Result<Option<SmokeReport>, HarnessError> {
        let Some(spec) = &recipe.smoke else {
            return Ok(None);
        };
        let is_executable = recipe
            .artifacts
            .iter()
            .any(|a| a.kind == ArtifactKind::Executable && a.install_as == spec.binary);
        if !is_executable {
            return Err(HarnessError::SmokeBinary(spec.binary.clone()));
        }

        self.reporter.stage(Stage::Smoke);
        let layout = InstallLayout::new(&self.options.prefix);
        let binary = layout.executable(&spec.binary);
        let options = SmokeOptions {
            package: recipe.package.name.clone(),
            version: recipe.package.version.clone(),
            log_dir: self.options.log_dir.clone(),
        };

        match SmokeTestRunner::new(&options, self.reporter).run(&binary, spec) {
            Ok(report) => {
                self.reporter.stage_done(
                    Stage::Smoke,
                    &format!("{} answered on port {}", spec.binary, report.port),
                );
                Ok(Some(report))
            }
            Err(e) => {
                self.reporter.failed(&spec.binary, &e.to_string());
                Err(e.into())
            }
        }
    }
}
