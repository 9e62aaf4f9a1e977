use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{ConditionCancelled, ConditionTimeout, PollError};

/// Delay between two attempts when nothing else is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Overall budget of a poll when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options of a single poll.
///
/// # Fields
///
/// * `interval` - Delay between two consecutive attempts.
/// * `timeout` - Wall clock budget measured from the first attempt. The poll fails once an
///   attempt finishes at or after this point without the predicate holding.
/// * `condition` - Human readable name of the awaited condition, used in errors and logs.
/// * `cancellation` - Optional token. Cancelling it stops the poll at the next delay boundary.
///
#[derive(Clone, Debug)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
    pub condition: String,
    pub cancellation: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            condition: "condition".to_owned(),
            cancellation: None,
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Lifecycle of a poll. Every state but `Pending` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Succeeded,
    TimedOut,
    Cancelled,
    Errored,
}

/// Bookkeeping owned by one in-flight poll.
struct PollState {
    started: Instant,
    attempts: usize,
    status: PollStatus,
}

impl PollState {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            attempts: 0,
            status: PollStatus::Pending,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn settle(&mut self, status: PollStatus, condition: &str) {
        debug_assert_eq!(self.status, PollStatus::Pending, "poll settled twice");
        self.status = status;
        let attempts = self.attempts;
        let elapsed = self.elapsed();
        match status {
            PollStatus::Succeeded => debug!(condition, attempts, ?elapsed, "condition met"),
            PollStatus::Errored => debug!(condition, attempts, ?elapsed, "poll aborted by error"),
            PollStatus::TimedOut | PollStatus::Cancelled => {
                warn!(condition, attempts, ?elapsed, ?status, "condition not met")
            }
            PollStatus::Pending => {}
        }
    }
}

/// Repeatedly fetches a snapshot and evaluates a predicate against it until the predicate holds,
/// the timeout elapses or the poll is cancelled.
///
/// The poller never blocks a thread: between attempts it suspends the calling task. Timing is
/// based on the monotonic tokio clock, so a slow scheduler can delay attempts but never causes a
/// premature timeout. The last delay is clamped to the remaining budget, which keeps a failing
/// poll within `[timeout, timeout + interval]`.
///
/// Errors returned by the fetch or the predicate end the poll immediately and are handed back
/// untouched as [`PollError::Source`].
#[derive(Clone, Debug, Default)]
pub struct ConditionPoller {
    options: PollOptions,
}

impl ConditionPoller {
    pub fn new(options: PollOptions) -> Self {
        Self { options }
    }

    /// Polls with an infallible predicate.
    pub async fn wait<S, E, F, Fut, P>(
        &self,
        fetch: F,
        mut predicate: P,
    ) -> Result<S, PollError<S, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        P: FnMut(&S) -> bool,
    {
        self.try_wait(fetch, |snapshot| Ok(predicate(snapshot)))
            .await
    }

    /// Polls with a predicate that may fail. A predicate error is fatal and not retried.
    pub async fn try_wait<S, E, F, Fut, P>(
        &self,
        mut fetch: F,
        mut predicate: P,
    ) -> Result<S, PollError<S, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        P: FnMut(&S) -> Result<bool, E>,
    {
        let condition = self.options.condition.as_str();
        let mut state = PollState::start();

        loop {
            state.attempts += 1;
            trace!(condition, attempt = state.attempts, "fetching snapshot");

            let snapshot = match fetch().await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    state.settle(PollStatus::Errored, condition);
                    return Err(PollError::Source(error));
                }
            };

            match predicate(&snapshot) {
                Ok(true) => {
                    state.settle(PollStatus::Succeeded, condition);
                    return Ok(snapshot);
                }
                Ok(false) => (),
                Err(error) => {
                    state.settle(PollStatus::Errored, condition);
                    return Err(PollError::Source(error));
                }
            }

            let elapsed = state.elapsed();
            if elapsed >= self.options.timeout {
                state.settle(PollStatus::TimedOut, condition);
                return Err(PollError::Timeout(ConditionTimeout {
                    condition: condition.to_owned(),
                    elapsed,
                    attempts: state.attempts,
                    last: snapshot,
                }));
            }

            let delay = self.options.interval.min(self.options.timeout - elapsed);
            if !self.pause(delay).await {
                state.settle(PollStatus::Cancelled, condition);
                return Err(PollError::Cancelled(ConditionCancelled {
                    condition: condition.to_owned(),
                    attempts: state.attempts,
                    last: snapshot,
                }));
            }
        }
    }

    /// Sleeps for `delay`. Returns `false` when the poll got cancelled before or during the sleep.
    async fn pause(&self, delay: Duration) -> bool {
        match &self.options.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}

/// One-shot form of [`ConditionPoller::wait`].
pub async fn wait_for_condition<S, E, F, Fut, P>(
    fetch: F,
    predicate: P,
    options: PollOptions,
) -> Result<S, PollError<S, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
    P: FnMut(&S) -> bool,
{
    ConditionPoller::new(options).wait(fetch, predicate).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error, PartialEq)]
    enum TestError {
        #[error("fetch failed on attempt {0}")]
        Fetch(usize),
        #[error("predicate failed")]
        Predicate,
    }

    fn options(interval_ms: u64, timeout_ms: u64) -> PollOptions {
        PollOptions::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
        .with_condition("counter reached")
    }

    /// Fetch that yields 1, 2, 3, ... and counts its invocations.
    fn counting_fetch(
        counter: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Result<usize, TestError>> {
        move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_true_on_first_snapshot() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let value = wait_for_condition(counting_fetch(fetches.clone()), |_| true, options(50, 1000))
            .await
            .expect("condition holds immediately");

        assert_eq!(1, value);
        assert_eq!(1, fetches.load(Ordering::SeqCst));
        assert_eq!(Duration::ZERO, started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_true_on_nth_snapshot() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let value = wait_for_condition(
            counting_fetch(fetches.clone()),
            |value| *value == 3,
            options(50, 1000),
        )
        .await
        .expect("condition holds on third snapshot");

        let elapsed = started.elapsed();
        assert_eq!(3, value);
        assert_eq!(3, fetches.load(Ordering::SeqCst));
        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(150), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_window() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let result =
            wait_for_condition(counting_fetch(fetches.clone()), |_| false, options(50, 1000)).await;

        let elapsed = started.elapsed();
        let PollError::Timeout(timeout) = result.expect_err("never true") else {
            panic!("expected timeout");
        };
        assert!(elapsed >= Duration::from_millis(1000), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(1050), "elapsed {elapsed:?}");
        assert_eq!(fetches.load(Ordering::SeqCst), timeout.attempts);
        assert_eq!(timeout.attempts, timeout.last);
        assert_eq!("counter reached", timeout.condition);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_not_multiple_of_interval() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let result = wait_for_condition(
            counting_fetch(fetches.clone()),
            |_| false,
            options(300, 1000),
        )
        .await;

        assert!(result.expect_err("never true").is_timeout());
        assert_eq!(Duration::from_millis(1000), started.elapsed());
        // Attempts at 0, 300, 600, 900 and a final clamped one at 1000.
        assert_eq!(5, fetches.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_still_evaluates_once() {
        let fetches = Arc::new(AtomicUsize::new(0));

        let result =
            wait_for_condition(counting_fetch(fetches.clone()), |_| false, options(50, 0)).await;

        assert!(result.expect_err("never true").is_timeout());
        assert_eq!(1, fetches.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_not_retried() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();

        let result = wait_for_condition(
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                std::future::ready(if attempt == 4 {
                    Err(TestError::Fetch(attempt))
                } else {
                    Ok(attempt)
                })
            },
            |_| false,
            options(50, 1000),
        )
        .await;

        match result {
            Err(PollError::Source(error)) => assert_eq!(TestError::Fetch(4), error),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(4, fetches.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_error_is_not_retried() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let poller = ConditionPoller::new(options(50, 1000));

        let result = poller
            .try_wait(counting_fetch(fetches.clone()), |value| {
                if *value == 2 {
                    Err(TestError::Predicate)
                } else {
                    Ok(false)
                }
            })
            .await;

        assert_eq!(
            Some(TestError::Predicate),
            result.expect_err("predicate fails").into_source()
        );
        assert_eq!(2, fetches.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_wait() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            canceller.cancel();
        });
        let started = Instant::now();

        let result = wait_for_condition(
            counting_fetch(fetches.clone()),
            |_| false,
            options(50, 1000).with_cancellation(token),
        )
        .await;

        let elapsed = started.elapsed();
        let PollError::Cancelled(cancelled) = result.expect_err("cancelled") else {
            panic!("expected cancellation");
        };
        assert!(elapsed >= Duration::from_millis(120), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(170), "elapsed {elapsed:?}");
        // Attempts at 0, 50 and 100 ran before the token fired.
        assert_eq!(3, cancelled.attempts);
        assert_eq!(3, cancelled.last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_still_evaluates_once() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();

        let value = wait_for_condition(
            counting_fetch(fetches.clone()),
            |_| true,
            options(50, 1000).with_cancellation(token.clone()),
        )
        .await
        .expect("first attempt succeeds");
        assert_eq!(1, value);

        let result = wait_for_condition(
            counting_fetch(fetches.clone()),
            |_| false,
            options(50, 1000).with_cancellation(token),
        )
        .await;
        assert!(result.expect_err("cancelled").is_cancelled());
        assert_eq!(2, fetches.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_fetch_suspends() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let started = Instant::now();

        let value = wait_for_condition(
            move || {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<_, TestError>(counter.fetch_add(1, Ordering::SeqCst) + 1)
                }
            },
            |value| *value == 2,
            options(50, 1000),
        )
        .await
        .expect("second snapshot matches");

        assert_eq!(2, value);
        assert_eq!(Duration::from_millis(70), started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_polls_are_independent() {
        let fast = Arc::new(AtomicUsize::new(0));
        let slow = Arc::new(AtomicUsize::new(0));

        let (fast_result, slow_result) = tokio::join!(
            wait_for_condition(counting_fetch(fast.clone()), |v| *v == 2, options(10, 1000)),
            wait_for_condition(counting_fetch(slow.clone()), |v| *v == 5, options(40, 1000)),
        );

        assert_eq!(2, fast_result.expect("fast poll"));
        assert_eq!(5, slow_result.expect("slow poll"));
        assert_eq!(2, fast.load(Ordering::SeqCst));
        assert_eq!(5, slow.load(Ordering::SeqCst));
    }
}
