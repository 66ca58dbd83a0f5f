//! Install layout management.
//!
//! Artifacts land under a prefix according to their kind:
//!
//! ```text
//! <prefix>/
//! ├── bin/                 # executables (mode 0755)
//! ├── lib/                 # shared libraries
//! └── include/<subdir>/    # header sets, relative paths preserved
//! ```
//!
//! Installation is not transactional. A failure partway through leaves the
//! artifacts installed before it in place.

use std::path::{Path, PathBuf};

use kiln_schema::{ArtifactKind, ArtifactSpec};
use thiserror::Error;
use walkdir::WalkDir;

use crate::Reporter;
use crate::build::BuildResult;

/// Install failures.
#[derive(Error, Debug)]
pub enum InstallError {
    /// Install was asked to copy an artifact whose build did not succeed.
    #[error("artifact '{artifact}' was not built successfully")]
    NotBuilt {
        /// Artifact name.
        artifact: String,
    },

    /// The build reported success but its output is not there.
    #[error("artifact '{artifact}' reported success but produced no output at {}", .path.display())]
    MissingOutput {
        /// Artifact name.
        artifact: String,
        /// Expected output path.
        path: PathBuf,
    },

    /// A destination could not be created or written.
    #[error("failed to install {}: {source}", .path.display())]
    Io {
        /// Path being written (or walked).
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// The directory structure under an install prefix.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    prefix: PathBuf,
}

impl InstallLayout {
    /// Layout rooted at `prefix`.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The install prefix.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Executables: `<prefix>/bin`
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Shared libraries: `<prefix>/lib`
    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    /// Headers: `<prefix>/include`
    pub fn include_dir(&self) -> PathBuf {
        self.prefix.join("include")
    }

    /// Where `artifact` is installed: a file for single-file kinds, a
    /// directory for header sets.
    pub fn destination(&self, artifact: &ArtifactSpec) -> PathBuf {
        match artifact.kind {
            ArtifactKind::Executable => self.bin_dir().join(&artifact.install_as),
            ArtifactKind::SharedLibrary => self.lib_dir().join(&artifact.install_as),
            ArtifactKind::HeaderSet => self.include_dir().join(&artifact.install_as),
        }
    }

    /// Installed path of an executable named `name`.
    pub fn executable(&self, name: &str) -> PathBuf {
        self.bin_dir().join(name)
    }
}

/// What one artifact put on disk.
#[derive(Debug, Clone)]
pub struct InstalledArtifact {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Installed file, or include directory for header sets.
    pub destination: PathBuf,
    /// Every file written, in walk order.
    pub files: Vec<PathBuf>,
}

/// Copies built artifacts into an [`InstallLayout`].
pub struct InstallLayoutManager<'r> {
    layout: &'r InstallLayout,
    source_root: &'r Path,
    reporter: &'r dyn Reporter,
}

impl std::fmt::Debug for InstallLayoutManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallLayoutManager")
            .field("layout", &self.layout)
            .field("source_root", &self.source_root)
            .finish_non_exhaustive()
    }
}

impl<'r> InstallLayoutManager<'r> {
    /// Install outputs found under `source_root` into `layout`.
    pub fn new(
        layout: &'r InstallLayout,
        source_root: &'r Path,
        reporter: &'r dyn Reporter,
    ) -> Self {
        Self {
            layout,
            source_root,
            reporter,
        }
    }

    /// Install every result, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failure: [`InstallError::NotBuilt`] for a result
    /// that is not a success, [`InstallError::MissingOutput`] when a build
    /// claimed success without producing its output, [`InstallError::Io`]
    /// when a destination cannot be written. Earlier artifacts stay installed.
    pub fn install(
        &self,
        results: &[BuildResult<'_>],
    ) -> Result<Vec<InstalledArtifact>, InstallError> {
        let mut installed = Vec::with_capacity(results.len());
        for result in results {
            if !result.is_success() {
                return Err(InstallError::NotBuilt {
                    artifact: result.artifact.name.clone(),
                });
            }
            let record = self.install_one(result.artifact)?;
            self.reporter.installed(&record.name, record.files.len());
            installed.push(record);
        }
        Ok(installed)
    }

    fn install_one(&self, artifact: &ArtifactSpec) -> Result<InstalledArtifact, InstallError> {
        let source = self
            .source_root
            .join(&artifact.build_dir)
            .join(&artifact.output);
        let destination = self.layout.destination(artifact);

        let files = match artifact.kind {
            ArtifactKind::Executable | ArtifactKind::SharedLibrary => {
                if !source.is_file() {
                    return Err(InstallError::MissingOutput {
                        artifact: artifact.name.clone(),
                        path: source,
                    });
                }
                copy_file(&source, &destination, artifact.kind == ArtifactKind::Executable)?;
                vec![destination.clone()]
            }
            ArtifactKind::HeaderSet => {
                if !source.is_dir() {
                    return Err(InstallError::MissingOutput {
                        artifact: artifact.name.clone(),
                        path: source,
                    });
                }
                let files = copy_headers(artifact, &source, &destination)?;
                if files.is_empty() {
                    self.reporter.warning(&format!(
                        "header set '{}' matched no headers in {}",
                        artifact.name,
                        source.display()
                    ));
                }
                files
            }
        };

        tracing::info!(
            artifact = %artifact.name,
            kind = %artifact.kind,
            dest = %destination.display(),
            files = files.len(),
            "installed"
        );

        Ok(InstalledArtifact {
            name: artifact.name.clone(),
            kind: artifact.kind,
            destination,
            files,
        })
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> InstallError + '_ {
    move |source| InstallError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn copy_file(src: &Path, dst: &Path, executable: bool) -> Result<(), InstallError> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::copy(src, dst).map_err(io_err(dst))?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dst, std::fs::Permissions::from_mode(0o755))
            .map_err(io_err(dst))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(())
}

/// Copy every header under `src` into `dst`, preserving relative paths.
fn copy_headers(
    artifact: &ArtifactSpec,
    src: &Path,
    dst: &Path,
) -> Result<Vec<PathBuf>, InstallError> {
    std::fs::create_dir_all(dst).map_err(io_err(dst))?;
    let mut files = Vec::new();

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| InstallError::Io {
            path: e.path().unwrap_or(src).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() || !artifact.is_header(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        copy_file(entry.path(), &target, false)?;
        files.push(target);
    }

    Ok(files)
}
