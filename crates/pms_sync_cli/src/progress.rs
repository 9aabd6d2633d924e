//! Progress reporting for sync runs.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): one spinner per entity using indicatif
//! - Logging mode (non-TTY, and always under `serve`): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use pms_sync::sync::{ProgressCallback, SyncProgress};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Spinners for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (cron, pipes, the trigger server).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Create a logging reporter regardless of the terminal.
    pub fn logging() -> Self {
        Self::Logging(LoggingReporter::new())
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| {
            reporter.handle(event);
        })
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
