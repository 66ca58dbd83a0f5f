//! Terminal output for harness progress.
//!
//! Progress goes to stderr so stdout stays clean for `--json` and `hash`.

use crossterm::style::Stylize;
use kiln_core::{Reporter, Stage};

/// Prints progress lines to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Prints a success message.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{} {msg}", "✓".green());
        }
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, stage: Stage) {
        if !self.quiet {
            eprintln!("{} {}", "==>".cyan().bold(), stage.as_str().bold());
        }
    }

    fn stage_done(&self, stage: Stage, detail: &str) {
        if !self.quiet {
            eprintln!("    {} {stage} {}", "✓".green(), detail.dark_grey());
        }
    }

    fn building(&self, artifact: &str, index: usize, total: usize) {
        if !self.quiet {
            eprintln!(
                "    {} {}",
                format!("[{}/{total}]", index + 1).dark_grey(),
                artifact.cyan()
            );
        }
    }

    fn built(&self, artifact: &str, elapsed_secs: f64) {
        if !self.quiet {
            eprintln!(
                "    {} {artifact} {}",
                "✓".green(),
                format!("({elapsed_secs:.1}s)").dark_grey()
            );
        }
    }

    fn installed(&self, artifact: &str, files: usize) {
        if !self.quiet {
            let noun = if files == 1 { "file" } else { "files" };
            eprintln!(
                "    {} {artifact} {}",
                "✓".green(),
                format!("({files} {noun})").dark_grey()
            );
        }
    }

    fn failed(&self, subject: &str, reason: &str) {
        // Failures are shown even when quiet.
        eprintln!("    {} {subject}: {reason}", "✗".red());
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("    {msg}");
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow().bold());
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        if !self.quiet {
            let noun = if count == 1 { "artifact" } else { "artifacts" };
            eprintln!(
                "{} {count} {noun} {action} {}",
                "✓".green().bold(),
                format!("in {elapsed_secs:.1}s").dark_grey()
            );
        }
    }
}
