//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Bounded exponential-backoff readiness polling."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::time::Duration;

use airlift_common::config::ReadinessConfig;
use tracing::debug;

use crate::error::StepError;

/// Abstraction over blocking sleeps so polling can be driven in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Total time budget spent sleeping between probes.
    pub max_wait: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReadinessPolicy {
    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self {
            max_wait: config.max_wait,
            base_delay: config.base_delay,
            max_delay: config.max_delay.max(config.base_delay),
        }
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = (attempt.saturating_sub(1) as u32).min(8);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::from_config(&ReadinessConfig::default())
    }
}

/// How long it took for the probe to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub attempts: usize,
    pub waited: Duration,
}

/// Probe until `probe` reports ready or the wait budget is spent.
///
/// A probe that returns `Ok(false)` is retried; an `Err` aborts immediately.
/// The last probe runs once the full budget has elapsed.
pub fn wait_until<S, F>(
    policy: &ReadinessPolicy,
    sleeper: &S,
    service: &str,
    mut probe: F,
) -> Result<Readiness, StepError>
where
    S: Sleeper + ?Sized,
    F: FnMut() -> Result<bool, StepError>,
{
    let mut attempts = 0usize;
    let mut waited = Duration::ZERO;
    loop {
        attempts += 1;
        if probe()? {
            debug!(service, attempts, waited_ms = waited.as_millis() as u64, "service ready");
            return Ok(Readiness { attempts, waited });
        }
        if waited >= policy.max_wait {
            return Err(StepError::ReadinessTimeout {
                service: service.to_owned(),
                attempts,
                waited,
            });
        }
        let delay = policy
            .backoff_delay(attempts)
            .min(policy.max_wait - waited);
        debug!(service, attempts, delay_ms = delay.as_millis() as u64, "service not ready yet");
        sleeper.sleep(delay);
        waited += delay;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorded(RefCell<Vec<Duration>>);

    impl Sleeper for Recorded {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn policy(max_wait_ms: u64) -> ReadinessPolicy {
        ReadinessPolicy {
            max_wait: Duration::from_millis(max_wait_ms),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = policy(10_000);
        let delays: Vec<u64> = (1..=5)
            .map(|attempt| policy.backoff_delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 400, 400]);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let sleeper = Recorded::default();
        let mut remaining = 2;
        let readiness = wait_until(&policy(10_000), &sleeper, "postgres", || {
            if remaining == 0 {
                Ok(true)
            } else {
                remaining -= 1;
                Ok(false)
            }
        })
        .expect("ready");
        assert_eq!(readiness.attempts, 3);
        assert_eq!(readiness.waited, Duration::from_millis(300));
        assert_eq!(sleeper.0.borrow().len(), 2);
    }

    #[test]
    fn gives_up_once_budget_is_spent() {
        let sleeper = Recorded::default();
        let err = wait_until(&policy(650), &sleeper, "postgres", || Ok(false))
            .expect_err("never ready");
        match err {
            StepError::ReadinessTimeout {
                service,
                attempts,
                waited,
            } => {
                assert_eq!(service, "postgres");
                assert_eq!(waited, Duration::from_millis(650));
                // 100 + 200 + 350 (clamped) then a final probe at the cap.
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let total: Duration = sleeper.0.borrow().iter().sum();
        assert_eq!(total, Duration::from_millis(650));
    }

    #[test]
    fn zero_budget_probes_once() {
        let sleeper = Recorded::default();
        let err = wait_until(&policy(0), &sleeper, "postgres", || Ok(false))
            .expect_err("never ready");
        assert!(matches!(err, StepError::ReadinessTimeout { attempts: 1, .. }));
        assert!(sleeper.0.borrow().is_empty());
    }

    #[test]
    fn probe_errors_abort_immediately() {
        let sleeper = Recorded::default();
        let mut calls = 0;
        let err = wait_until(&policy(10_000), &sleeper, "postgres", || {
            calls += 1;
            Err(StepError::SchemaNotFound("x".into()))
        })
        .expect_err("probe error");
        assert!(matches!(err, StepError::SchemaNotFound(_)));
        assert_eq!(calls, 1);
    }
}
