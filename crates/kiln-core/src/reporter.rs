//! Progress reporting for harness runs.
//!
//! Stages and components call into a [`Reporter`] instead of printing, so
//! the CLI decides presentation and tests pass [`NullReporter`].

use crate::error::Stage;

/// Progress sink for a harness run.
pub trait Reporter: Send + Sync {
    /// A pipeline stage has started.
    fn stage(&self, stage: Stage);

    /// A pipeline stage finished successfully.
    fn stage_done(&self, stage: Stage, detail: &str);

    /// An artifact build is starting (`index` is zero-based).
    fn building(&self, artifact: &str, index: usize, total: usize);

    /// An artifact built successfully.
    fn built(&self, artifact: &str, elapsed_secs: f64);

    /// An artifact was installed.
    fn installed(&self, artifact: &str, files: usize);

    /// A subject (artifact, source, smoke test) failed with a reason.
    fn failed(&self, subject: &str, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display a final summary.
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64);
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn stage(&self, _: Stage) {}
    fn stage_done(&self, _: Stage, _: &str) {}
    fn building(&self, _: &str, _: usize, _: usize) {}
    fn built(&self, _: &str, _: f64) {}
    fn installed(&self, _: &str, _: usize) {}
    fn failed(&self, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}
