//! Step lifecycle reporting.
//!
//! The orchestrator does not print through an ambient sink; it reports step
//! starts and outcomes through a [`TaskReporter`] injected at construction.
//! The default implementation forwards to the `log` facade.

use std::time::Duration;

use super::error::Error;

/// Receives pipeline step lifecycle events.
pub trait TaskReporter: Send + Sync {
    /// A named step is about to run.
    fn task_started(&self, name: &str);

    /// A named step finished successfully.
    fn task_succeeded(&self, name: &str, elapsed: Duration);

    /// A named step failed.
    fn task_failed(&self, name: &str, elapsed: Duration, error: &Error);

    /// Free-form diagnostic output (environment probes, fingerprints).
    fn note(&self, message: &str);
}

/// Default reporter writing through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl TaskReporter for LogReporter {
    fn task_started(&self, name: &str) {
        log::info!("--- {name}");
    }

    fn task_succeeded(&self, name: &str, elapsed: Duration) {
        log::info!("{name} finished in {elapsed:.2?}");
    }

    fn task_failed(&self, name: &str, elapsed: Duration, error: &Error) {
        log::error!("{name} failed after {elapsed:.2?}: {error}");
    }

    fn note(&self, message: &str) {
        log::info!("{message}");
    }
}
