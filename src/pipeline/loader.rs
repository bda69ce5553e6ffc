//! Bounded-retry batch loader.
//!
//! The whole batch is written in one attempt. A failed attempt is retried
//! after a fixed delay until the attempt ceiling is reached. Waiting goes
//! through [`Sleeper`] so tests can run without wall-clock delays.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
use crate::observability::metrics;
use crate::pipeline::storage::EmployeeSink;
use crate::types::OutputRecord;

/// Blocking wait between attempts
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one; values below 1 act as 1
    pub max_attempts: u32,
    pub delay: Duration,
    /// Whether permanent store errors also consume retries
    pub retry_permanent_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            retry_permanent_errors: false,
        }
    }
}

/// Terminal result of a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The batch was committed
    Success { attempts: u32, rows: usize },
    /// Every allowed attempt failed; nothing was committed
    Exhausted { attempts: u32, last_error: String },
    /// A permanent error stopped the load before the ceiling
    Aborted { attempts: u32, error: String },
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoadOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            LoadOutcome::Success { attempts, .. }
            | LoadOutcome::Exhausted { attempts, .. }
            | LoadOutcome::Aborted { attempts, .. } => *attempts,
        }
    }
}

enum LoadState {
    Attempting { attempt: u32 },
    Finished(LoadOutcome),
}

pub struct BoundedRetryLoader<S, Z> {
    sink: S,
    sleeper: Z,
    policy: RetryPolicy,
}

impl<S: EmployeeSink, Z: Sleeper> BoundedRetryLoader<S, Z> {
    pub fn new(sink: S, sleeper: Z, policy: RetryPolicy) -> Self {
        Self {
            sink,
            sleeper,
            policy,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Persist `records` as one batch. The records are only borrowed and are
    /// never modified between attempts.
    #[instrument(skip(self, records), fields(rows = records.len(), max_attempts = self.policy.max_attempts))]
    pub fn load(&self, records: &[OutputRecord]) -> LoadOutcome {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut state = LoadState::Attempting { attempt: 1 };
        let outcome = loop {
            state = match state {
                LoadState::Attempting { attempt } => self.attempt(attempt, max_attempts, records),
                LoadState::Finished(outcome) => break outcome,
            };
        };

        metrics::loader::duration(started.elapsed().as_secs_f64());
        outcome
    }

    fn attempt(&self, attempt: u32, max_attempts: u32, records: &[OutputRecord]) -> LoadState {
        metrics::loader::attempt();

        let err = match self.sink.write_batch(records) {
            Ok(rows) => {
                info!(attempt, rows, "Data successfully loaded");
                metrics::loader::rows_loaded(rows as u64);
                return LoadState::Finished(LoadOutcome::Success {
                    attempts: attempt,
                    rows,
                });
            }
            Err(err) => err,
        };

        metrics::loader::failure(err.kind());
        warn!(attempt, max_attempts, kind = err.kind(), error = %err, "load attempt failed");

        if !err.is_transient() && !self.policy.retry_permanent_errors {
            error!(attempt, "permanent store error; not retrying: {}", err);
            return LoadState::Finished(LoadOutcome::Aborted {
                attempts: attempt,
                error: err.to_string(),
            });
        }

        if attempt >= max_attempts {
            error!("Max retries reached ({}/{}); batch not persisted", attempt, max_attempts);
            return LoadState::Finished(LoadOutcome::Exhausted {
                attempts: attempt,
                last_error: err.to_string(),
            });
        }

        info!(
            "Retrying in {:?}... ({}/{})",
            self.policy.delay, attempt, max_attempts
        );
        self.sleeper.sleep(self.policy.delay);
        LoadState::Attempting {
            attempt: attempt + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::storage::StoreError;
    use crate::types::SalaryBucket;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Fails with the scripted errors in order, then succeeds
    #[derive(Default)]
    struct ScriptedSink {
        failures: RefCell<VecDeque<StoreError>>,
        always_fail: Option<StoreError>,
        attempts: Cell<u32>,
        committed: RefCell<Vec<OutputRecord>>,
    }

    impl ScriptedSink {
        fn failing_first(k: u32) -> Self {
            Self {
                failures: RefCell::new(
                    (0..k)
                        .map(|i| StoreError::Transient(format!("connection dropped #{i}")))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn always(err: StoreError) -> Self {
            Self {
                always_fail: Some(err),
                ..Default::default()
            }
        }
    }

    impl EmployeeSink for ScriptedSink {
        fn write_batch(&self, records: &[OutputRecord]) -> Result<usize, StoreError> {
            self.attempts.set(self.attempts.get() + 1);
            if let Some(err) = &self.always_fail {
                return Err(err.clone());
            }
            if let Some(err) = self.failures.borrow_mut().pop_front() {
                return Err(err);
            }
            self.committed.borrow_mut().extend_from_slice(records);
            Ok(records.len())
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn batch() -> Vec<OutputRecord> {
        vec![OutputRecord {
            employee_id: "E001".into(),
            department: "Unknown".into(),
            salary: 55_000,
            full_name: "John OBrien".into(),
            age: 33,
            salary_bucket: SalaryBucket::B,
        }]
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(10),
            retry_permanent_errors: false,
        }
    }

    #[test]
    fn test_success_after_k_transient_failures() {
        for k in 0..5 {
            let sink = ScriptedSink::failing_first(k);
            let sleeper = RecordingSleeper::default();
            let loader = BoundedRetryLoader::new(&sink, &sleeper, policy(5));

            let outcome = loader.load(&batch());

            assert_eq!(outcome, LoadOutcome::Success { attempts: k + 1, rows: 1 });
            assert_eq!(sink.attempts.get(), k + 1);
            let slept: Duration = sleeper.sleeps.borrow().iter().sum();
            assert_eq!(slept, Duration::from_secs(10) * k);
            assert_eq!(sink.committed.borrow().len(), 1);
        }
    }

    #[test]
    fn test_always_failing_store_exhausts_attempts() {
        let sink = ScriptedSink::always(StoreError::Transient("connection refused".into()));
        let sleeper = RecordingSleeper::default();
        let loader = BoundedRetryLoader::new(&sink, &sleeper, policy(5));

        let outcome = loader.load(&batch());

        match &outcome {
            LoadOutcome::Exhausted { attempts, last_error } => {
                assert_eq!(*attempts, 5);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sink.attempts.get(), 5);
        assert_eq!(sleeper.sleeps.borrow().len(), 4);
        assert!(sink.committed.borrow().is_empty());
    }

    #[test]
    fn test_permanent_error_short_circuits() {
        let sink = ScriptedSink::always(StoreError::Permanent("no such column".into()));
        let sleeper = RecordingSleeper::default();
        let loader = BoundedRetryLoader::new(&sink, &sleeper, policy(5));

        let outcome = loader.load(&batch());

        assert_eq!(outcome.attempts(), 1);
        assert!(matches!(outcome, LoadOutcome::Aborted { .. }));
        assert!(sleeper.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_permanent_errors_can_consume_retries() {
        let sink = ScriptedSink::always(StoreError::Permanent("no such column".into()));
        let sleeper = RecordingSleeper::default();
        let loader = BoundedRetryLoader::new(
            &sink,
            &sleeper,
            RetryPolicy {
                retry_permanent_errors: true,
                ..policy(3)
            },
        );

        let outcome = loader.load(&batch());

        assert!(matches!(outcome, LoadOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(sleeper.sleeps.borrow().len(), 2);
    }

    #[test]
    fn test_zero_attempt_ceiling_still_tries_once() {
        let sink = ScriptedSink::always(StoreError::Transient("down".into()));
        let sleeper = RecordingSleeper::default();
        let loader = BoundedRetryLoader::new(&sink, &sleeper, policy(0));

        assert_eq!(loader.load(&batch()).attempts(), 1);
        assert!(sleeper.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(LoadOutcome::Success { attempts: 2, rows: 7 }).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["attempts"], 2);
    }
}
