mod addon;
mod error;
mod poll;
mod snapshot;

pub use addon::SignedState;
pub use error::{ConditionCancelled, ConditionTimeout, PollError};
pub use poll::{
    wait_for_condition, ConditionPoller, PollOptions, PollStatus, DEFAULT_INTERVAL, DEFAULT_TIMEOUT,
};
pub use snapshot::{ProcessScalars, ScalarValue, Snapshot, SnapshotKind};
