//! Harness-level error type and pipeline stages.

use serde::Serialize;
use thiserror::Error;

use crate::acquire::AcquireError;
use crate::build::BuildError;
use crate::install::InstallError;
use crate::smoke::SmokeError;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fetch, verify and extract the source archive.
    Fetch,
    /// Run artifact build commands.
    Build,
    /// Copy artifacts into the install prefix.
    Install,
    /// Launch and stop the installed executable.
    Smoke,
}

impl Stage {
    /// Lowercase stage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Build => "build",
            Self::Install => "install",
            Self::Smoke => "smoke",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first failure of a harness run.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Source acquisition failed; nothing was built.
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// An artifact build failed; later artifacts were not attempted.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Installation failed; earlier artifacts may remain installed.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// The smoke test failed.
    #[error(transparent)]
    Smoke(#[from] SmokeError),

    /// The recipe has a smoke test whose binary was not installed.
    #[error("smoke binary '{0}' is not an installed executable")]
    SmokeBinary(String),
}

impl HarnessError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Acquire(_) => Stage::Fetch,
            Self::Build(_) => Stage::Build,
            Self::Install(_) => Stage::Install,
            Self::Smoke(_) | Self::SmokeBinary(_) => Stage::Smoke,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_of_each_error() {
        let err: HarnessError = AcquireError::UnsupportedFormat("x.dmg".into()).into();
        assert_eq!(err.stage(), Stage::Fetch);

        let err: HarnessError = InstallError::NotBuilt {
            artifact: "capture".into(),
        }
        .into();
        assert_eq!(err.stage(), Stage::Install);

        let err: HarnessError = SmokeError::Termination {
            pid: 1,
            reason: "gone".into(),
        }
        .into();
        assert_eq!(err.stage(), Stage::Smoke);
        assert_eq!(err.to_string(), "failed to terminate pid 1: gone");
    }

    #[test]
    fn test_stage_order_and_names() {
        assert!(Stage::Fetch < Stage::Build);
        assert!(Stage::Install < Stage::Smoke);
        assert_eq!(Stage::Install.to_string(), "install");
    }
}
