//! kiln core: fetch a pinned source archive, build its artifacts in order,
//! install them into a prefix and smoke-test the result.
//!
//! [`pipeline::Harness`] runs the whole sequence; each stage is also usable
//! on its own ([`acquire::SourceAcquirer`], [`build::BuildOrchestrator`],
//! [`install::InstallLayoutManager`], [`smoke::SmokeTestRunner`]).

pub mod acquire;
pub mod build;
pub mod error;
pub mod install;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod reporter;
pub mod smoke;

pub use error::{HarnessError, Stage};
pub use paths::*;
pub use pipeline::{Harness, HarnessOptions, HarnessReport};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for source downloads
pub const USER_AGENT: &str = concat!("kiln/", env!("CARGO_PKG_VERSION"));
