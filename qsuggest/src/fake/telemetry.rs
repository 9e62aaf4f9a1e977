use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qsuggest_core::{Snapshot, SnapshotKind};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::fake::urlbar::EngagementEnd;
use crate::telemetry::{
    DYNAMIC_PROCESS, IMPRESSIONS_AT_END_SCALAR, IMPRESSIONS_SCALAR, PARENT_PROCESS,
    URLBAR_NAVIGATION_SCALAR,
};

/// Scalar store fed by address bar engagements.
///
/// Writes land after `latency`, the way content process telemetry only shows up in the parent
/// some time after the fact. [`FakeTelemetry::clear`] drops writes that are still in flight.
#[derive(Clone)]
pub struct FakeTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    store: RwLock<Snapshot>,
    epoch: AtomicU64,
    latency: Duration,
}

impl FakeTelemetry {
    pub fn new(latency: Duration) -> Self {
        FakeTelemetry {
            inner: Arc::new(TelemetryInner {
                store: RwLock::new(Snapshot::new()),
                epoch: AtomicU64::new(0),
                latency,
            }),
        }
    }

    pub fn record_engagement(&self, end: EngagementEnd) {
        if end.is_empty() {
            return;
        }
        let inner = self.inner.clone();
        let epoch = inner.epoch.load(Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(inner.latency).await;
            let mut store = inner.store.write().await;
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                trace!("dropping engagement recorded before the last clear");
                return;
            }
            for provider in &end.shown {
                store.add_keyed(DYNAMIC_PROCESS, IMPRESSIONS_SCALAR, provider, 1);
            }
            for provider in &end.at_end {
                store.add_keyed(DYNAMIC_PROCESS, IMPRESSIONS_AT_END_SCALAR, provider, 1);
            }
            if end.picked.is_some() {
                store.add_count(PARENT_PROCESS, URLBAR_NAVIGATION_SCALAR, 1);
            }
            debug!(shown = ?end.shown, at_end = ?end.at_end, "engagement recorded");
        });
    }

    pub async fn snapshot(&self, kind: SnapshotKind, clear: bool) -> Snapshot {
        if clear {
            self.inner.store.write().await.take_kind(kind)
        } else {
            self.inner.store.read().await.of_kind(kind)
        }
    }

    pub async fn clear(&self) {
        let mut store = self.inner.store.write().await;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        *store = Snapshot::new();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    const PROVIDER: &str = "ProviderDynamicQuickSuggest";

    fn shown_and_kept() -> EngagementEnd {
        let providers = BTreeSet::from([PROVIDER.to_owned()]);
        EngagementEnd {
            shown: providers.clone(),
            at_end: providers,
            picked: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_after_latency() {
        let telemetry = FakeTelemetry::new(Duration::from_millis(100));
        telemetry.record_engagement(shown_and_kept());

        assert!(telemetry.snapshot(SnapshotKind::KeyedScalars, false).await.is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let snapshot = telemetry.snapshot(SnapshotKind::KeyedScalars, true).await;
        assert_eq!(
            Some(1),
            snapshot.keyed_value(DYNAMIC_PROCESS, IMPRESSIONS_SCALAR, PROVIDER)
        );
        assert_eq!(
            Some(1),
            snapshot.keyed_value(DYNAMIC_PROCESS, IMPRESSIONS_AT_END_SCALAR, PROVIDER)
        );
        assert!(telemetry.snapshot(SnapshotKind::KeyedScalars, false).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_in_flight_writes() {
        let telemetry = FakeTelemetry::new(Duration::from_millis(100));
        telemetry.record_engagement(shown_and_kept());
        telemetry.clear().await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(telemetry.snapshot(SnapshotKind::KeyedScalars, false).await.is_empty());
    }
}
