//! Uniform execution of named pipeline steps.
//!
//! Every pipeline step runs through [`run_task`]: cancellation is checked
//! before the step starts, duration is measured, and the outcome is
//! reported. A failing step is wrapped as [`Error::Task`] carrying the step
//! name and elapsed time; this is the sole error-propagation mechanism of
//! the pipeline.

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::error::{Error, Result};
use super::reporter::TaskReporter;

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Escalate the failure and abort the remaining pipeline.
    Abort,
    /// Log the failure and continue; the documented best-effort steps only.
    Continue,
}

/// Runs a named step, aborting the pipeline on failure.
pub async fn run_task<T, Fut>(
    reporter: &dyn TaskReporter,
    cancel: &CancellationToken,
    name: &str,
    fut: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match run_task_with(reporter, cancel, name, FailurePolicy::Abort, fut).await? {
        Some(value) => Ok(value),
        // Abort policy never swallows a failure.
        None => unreachable!("aborting task returned without a value"),
    }
}

/// Runs a named step under an explicit failure policy.
///
/// Under [`FailurePolicy::Continue`] a failure is reported and `Ok(None)` is
/// returned; cancellation still aborts regardless of policy.
pub async fn run_task_with<T, Fut>(
    reporter: &dyn TaskReporter,
    cancel: &CancellationToken,
    name: &str,
    policy: FailurePolicy,
    fut: Fut,
) -> Result<Option<T>>
where
    Fut: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    reporter.task_started(name);
    let start = Instant::now();
    let outcome = fut.await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(value) => {
            reporter.task_succeeded(name, elapsed);
            Ok(Some(value))
        }
        Err(error) => {
            reporter.task_failed(name, elapsed, &error);
            if policy == FailurePolicy::Continue && !error.is_cancelled() {
                return Ok(None);
            }
            Err(Error::Task {
                name: name.to_string(),
                elapsed,
                source: Box::new(error),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repack::reporter::LogReporter;

    #[tokio::test]
    async fn failure_is_wrapped_with_task_name() {
        let cancel = CancellationToken::new();
        let err = run_task(&LogReporter, &cancel, "doomed", async {
            Err::<(), _>(Error::Generic("broken".into()))
        })
        .await
        .unwrap_err();

        match err {
            Error::Task { name, source, .. } => {
                assert_eq!(name, "doomed");
                assert!(source.to_string().contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn continue_policy_swallows_failure() {
        let cancel = CancellationToken::new();
        let outcome = run_task_with(&LogReporter, &cancel, "best effort", FailurePolicy::Continue, async {
            Err::<(), _>(Error::Generic("ignored".into()))
        })
        .await
        .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn continue_policy_still_propagates_cancellation() {
        let cancel = CancellationToken::new();
        let err = run_task_with(
            &LogReporter,
            &cancel,
            "cancelled mid-step",
            FailurePolicy::Continue,
            async { Err::<(), _>(Error::Cancelled) },
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_prevents_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_task(&LogReporter, &cancel, "never runs", async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn success_returns_value() {
        let cancel = CancellationToken::new();
        let value = run_task(&LogReporter, &cancel, "adds", async { Ok(40 + 2) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
}
