//! Scoped container lifetimes for tests.
//!
//! [`run_scoped`] runs a body against a launched container and always stops
//! the container afterwards, whether the body returned, failed, or panicked.

use std::panic::{self, AssertUnwindSafe};

use covrig_common::error::CovrigError;
use covrig_common::types::StopOutcome;

use crate::handle::ContainerHandle;

/// Value returned by a successful scope.
#[derive(Debug)]
pub struct Scoped<T> {
    /// What the body returned.
    pub value: T,
    /// How the container exited.
    pub outcome: StopOutcome,
}

/// Failure of a scope.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError<E> {
    /// The body failed. The container was still stopped.
    #[error("test body failed: {error}")]
    Body {
        /// Error returned by the body.
        error: E,
        /// Outcome of the stop that followed, if it succeeded.
        outcome: Option<StopOutcome>,
        /// Stop failure that followed, if any.
        stop_error: Option<CovrigError>,
    },
    /// The body succeeded but stopping the container failed.
    #[error("failed to stop container: {0}")]
    Stop(#[source] CovrigError),
}

/// Runs `body` with the container, then stops it exactly once.
///
/// A panic inside `body` is re-raised after the stop completes.
///
/// # Errors
///
/// Returns [`ScopeError::Body`] if the body fails and [`ScopeError::Stop`]
/// if the body succeeds but the stop does not.
pub fn run_scoped<T, E, F>(mut handle: ContainerHandle, body: F) -> Result<Scoped<T>, ScopeError<E>>
where
    F: FnOnce(&ContainerHandle) -> Result<T, E>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| body(&handle)));
    let stopped = handle.stop();

    match result {
        Err(payload) => {
            if let Err(e) = &stopped {
                tracing::error!(id = %handle.id().short(), error = %e, "stop after panic failed");
            }
            drop(handle);
            panic::resume_unwind(payload)
        }
        Ok(Ok(value)) => match stopped {
            Ok(outcome) => Ok(Scoped { value, outcome }),
            Err(e) => Err(ScopeError::Stop(e)),
        },
        Ok(Err(error)) => {
            let (outcome, stop_error) = match stopped {
                Ok(outcome) => (Some(outcome), None),
                Err(e) => (None, Some(e)),
            };
            Err(ScopeError::Body {
                error,
                outcome,
                stop_error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::ContainerRuntime;
    use crate::backend::fake::{FakeRuntime, TermBehavior};
    use crate::engine::Harness;
    use crate::launcher::LaunchSpec;
    use covrig_common::config::HarnessConfig;
    use covrig_common::types::StopSignal;

    fn launch(rt: &Arc<FakeRuntime>) -> ContainerHandle {
        let config = HarnessConfig {
            grace_period_secs: 1,
            poll_interval_ms: 5,
            ..HarnessConfig::default()
        };
        Harness::with_runtime(Arc::clone(rt) as Arc<dyn ContainerRuntime>, config)
            .launch(LaunchSpec::new("pingsvc").expose(8080))
            .expect("launch")
    }

    #[test]
    fn successful_body_stops_once() {
        let rt = Arc::new(FakeRuntime::new());
        let scoped = run_scoped(launch(&rt), |h| Ok::<_, String>(h.host_port(8080).is_ok()))
            .expect("scope");
        assert!(scoped.value);
        assert!(scoped.outcome.is_graceful());
        assert_eq!(rt.signals(), vec![StopSignal::Term]);
    }

    #[test]
    fn failing_body_still_stops() {
        let rt = Arc::new(FakeRuntime::new());
        let err = run_scoped(launch(&rt), |_| Err::<(), _>("assertion failed"))
            .expect_err("body fails");
        match err {
            ScopeError::Body {
                error,
                outcome,
                stop_error,
            } => {
                assert_eq!(error, "assertion failed");
                assert!(outcome.is_some_and(|o| o.is_graceful()));
                assert!(stop_error.is_none());
            }
            ScopeError::Stop(e) => panic!("unexpected stop failure: {e}"),
        }
        assert_eq!(rt.signals(), vec![StopSignal::Term]);
    }

    #[test]
    fn panicking_body_still_stops_and_repanics() {
        let rt = Arc::new(FakeRuntime::new());
        let handle = launch(&rt);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = run_scoped(handle, |_| -> Result<(), String> { panic!("boom") });
        }));
        assert!(result.is_err());
        assert_eq!(rt.signals(), vec![StopSignal::Term]);
    }

    #[test]
    fn stop_failure_after_success_is_reported() {
        let rt = Arc::new(FakeRuntime::new().with_term(TermBehavior::Ignore).failing_signal());
        let err = run_scoped(launch(&rt), |_| Ok::<_, String>(()))
            .expect_err("stop fails");
        assert!(matches!(err, ScopeError::Stop(CovrigError::Runtime { .. })));
        assert_eq!(rt.signals(), vec![StopSignal::Term]);
    }
}
