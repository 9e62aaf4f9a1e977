use anyhow::{ensure, Result};
use qsuggest_core::{PollError, ProcessScalars, ScalarValue, Snapshot, SnapshotKind};

use crate::browser::{ResultRow, WindowId};
use crate::context::ScenarioContext;

pub const PARENT_PROCESS: &str = "parent";
pub const DYNAMIC_PROCESS: &str = "dynamic";

pub const IMPRESSIONS_SCALAR: &str = "browser.search.experiments.impressions";
pub const IMPRESSIONS_AT_END_SCALAR: &str = "browser.search.experiments.impressions_at_end";
pub const URLBAR_NAVIGATION_SCALAR: &str = "browser.engagement.navigation.urlbar";

fn kind(keyed: bool) -> SnapshotKind {
    if keyed {
        SnapshotKind::KeyedScalars
    } else {
        SnapshotKind::Scalars
    }
}

/// Waits until every process in `processes` recorded scalars of the requested kind and `extra`
/// holds for the snapshot. Returns the snapshot that satisfied both.
pub async fn wait_for_processes_scalars<P>(
    ctx: &ScenarioContext,
    processes: &[&str],
    keyed: bool,
    mut extra: P,
) -> Result<Snapshot>
where
    P: FnMut(&Snapshot) -> bool,
{
    let kind = kind(keyed);
    let condition = format!("{kind:?} recorded by {}", processes.join(", "));
    ctx.poller(condition)
        .wait(
            || ctx.telemetry.snapshot(kind, false),
            |snapshot| snapshot.has_processes(processes.iter().copied()) && extra(snapshot),
        )
        .await
        .map_err(PollError::into_anyhow)
}

/// Scalars of one process, empty when it recorded nothing.
pub async fn process_scalars(
    ctx: &ScenarioContext,
    process: &str,
    keyed: bool,
    clear: bool,
) -> Result<ProcessScalars> {
    let snapshot = ctx.telemetry.snapshot(kind(keyed), clear).await?;
    Ok(snapshot.process(process).cloned().unwrap_or_default())
}

pub fn assert_keyed_scalar(
    scalars: &ProcessScalars,
    name: &str,
    key: &str,
    expected: u64,
) -> Result<()> {
    let actual = scalars.get(name).and_then(|value| value.keyed(key));
    ensure!(
        actual == Some(expected),
        "keyed scalar {name}[{key}] is {actual:?}, expected {expected}"
    );
    Ok(())
}

pub fn assert_scalar_absent(scalars: &ProcessScalars, name: &str) -> Result<()> {
    let value: Option<&ScalarValue> = scalars.get(name);
    ensure!(value.is_none(), "scalar {name} should not be recorded, found {value:?}");
    Ok(())
}

/// Waits until the address bar popup of `window` shows a row at `index` and returns it.
pub async fn wait_for_result_at(
    ctx: &ScenarioContext,
    window: WindowId,
    index: usize,
) -> Result<ResultRow> {
    let rows = ctx
        .poller(format!("result row {index} in {window}"))
        .wait(|| ctx.ui.result_rows(window), |rows| rows.len() > index)
        .await
        .map_err(PollError::into_anyhow)?;
    Ok(rows[index].clone())
}
