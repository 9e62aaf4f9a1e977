use std::fmt::Debug;
use std::time::Duration;

use thiserror::Error;

/// The predicate did not hold within the poll budget.
///
/// `last` is the snapshot of the final attempt, kept for diagnostics.
#[derive(Debug, Error)]
#[error("timed out after {elapsed:?} waiting for {condition} ({attempts} attempts)")]
pub struct ConditionTimeout<S> {
    pub condition: String,
    pub elapsed: Duration,
    pub attempts: usize,
    pub last: S,
}

/// The poll was cancelled from outside before the predicate held.
#[derive(Debug, Error)]
#[error("cancelled while waiting for {condition} ({attempts} attempts)")]
pub struct ConditionCancelled<S> {
    pub condition: String,
    pub attempts: usize,
    pub last: S,
}

/// Failure of a poll.
///
/// Only timeout and cancellation are produced by the poller itself. Anything the fetch or the
/// predicate returns as an error ends up in `Source` as-is, so callers can match on their own
/// error type again with [`PollError::into_source`].
#[derive(Debug, Error)]
pub enum PollError<S, E> {
    #[error(transparent)]
    Timeout(ConditionTimeout<S>),

    #[error(transparent)]
    Cancelled(ConditionCancelled<S>),

    #[error(transparent)]
    Source(E),
}

impl<S, E> PollError<S, E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled(_))
    }

    /// Snapshot of the last attempt, if the poll got that far.
    pub fn last_snapshot(&self) -> Option<&S> {
        match self {
            PollError::Timeout(timeout) => Some(&timeout.last),
            PollError::Cancelled(cancelled) => Some(&cancelled.last),
            PollError::Source(_) => None,
        }
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            PollError::Source(error) => Some(error),
            _ => None,
        }
    }
}

impl<S> PollError<S, anyhow::Error>
where
    S: Debug + Send + Sync + 'static,
{
    /// Converts into an `anyhow::Error`.
    ///
    /// A source error is returned unchanged. Timeout and cancellation stay downcastable to
    /// [`ConditionTimeout`] and [`ConditionCancelled`].
    pub fn into_anyhow(self) -> anyhow::Error {
        match self {
            PollError::Timeout(timeout) => anyhow::Error::new(timeout),
            PollError::Cancelled(cancelled) => anyhow::Error::new(cancelled),
            PollError::Source(error) => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    fn timeout() -> PollError<u32, anyhow::Error> {
        PollError::Timeout(ConditionTimeout {
            condition: "dynamic scalars".to_owned(),
            elapsed: Duration::from_millis(5000),
            attempts: 51,
            last: 7,
        })
    }

    #[test]
    fn test_timeout_names_condition() {
        let message = timeout().to_string();
        assert!(message.contains("dynamic scalars"), "{message}");
        assert!(message.contains("51 attempts"), "{message}");
    }

    #[test]
    fn test_source_passes_through_unchanged() {
        let error: PollError<u32, anyhow::Error> = PollError::Source(anyhow!("telemetry offline"));
        assert_eq!("telemetry offline", error.to_string());
        assert!(error.last_snapshot().is_none());
        assert_eq!("telemetry offline", error.into_anyhow().to_string());
    }

    #[test]
    fn test_into_anyhow_is_downcastable() {
        let error = timeout();
        assert_eq!(Some(&7), error.last_snapshot());

        let error = error.into_anyhow();
        let timeout = error
            .downcast_ref::<ConditionTimeout<u32>>()
            .expect("timeout stays typed");
        assert_eq!(51, timeout.attempts);
    }
}
