use anyhow::{ensure, Context, Result};
use qsuggest_core::{Snapshot, SnapshotKind};

use super::{assert_searched_for, pick_suggestion};
use crate::browser::NamedKey;
use crate::context::ScenarioContext;
use crate::scope::{with_addon, with_blank_tab};
use crate::telemetry::{
    assert_keyed_scalar, assert_scalar_absent, process_scalars, wait_for_processes_scalars,
    wait_for_result_at, DYNAMIC_PROCESS, IMPRESSIONS_AT_END_SCALAR, IMPRESSIONS_SCALAR,
};

fn has_scalar(snapshot: &Snapshot, name: &str) -> bool {
    snapshot.scalar(DYNAMIC_PROCESS, name).is_some()
}

/// Typing text without a suggestion records nothing.
pub async fn no_impressions(ctx: &ScenarioContext) -> Result<()> {
    ctx.telemetry.clear_scalars().await?;
    with_addon(ctx, |_| async move {
        with_blank_tab(ctx, |window| async move {
            ctx.ui.focus_urlbar(window).await?;
            ctx.ui.send_keys(window, "frab123").await?;
            wait_for_result_at(ctx, window, 0).await?;
            ctx.ui.blur_urlbar(window).await?;
            ctx.settle().await;

            let snapshot = ctx
                .telemetry
                .snapshot(SnapshotKind::KeyedScalars, true)
                .await?;
            ensure!(
                !snapshot.has_process(DYNAMIC_PROCESS),
                "no {DYNAMIC_PROCESS} scalars expected, got {snapshot:?}"
            );
            Ok(())
        })
        .await
    })
    .await
}

/// Picking the suggestion counts one impression, visible at the end.
pub async fn impressions(ctx: &ScenarioContext) -> Result<()> {
    ctx.telemetry.clear_scalars().await?;
    with_addon(ctx, |_| async move {
        with_blank_tab(ctx, |window| async move {
            let (row, _) = pick_suggestion(ctx, window, "frabbits").await?;
            let provider = row.provider().context("picked row is not a quick suggestion")?;

            assert_impressions(ctx, provider, true).await
        })
        .await
    })
    .await
}

/// Refining the text while the suggestion stays visible is still one impression.
pub async fn multiple_impressions(ctx: &ScenarioContext) -> Result<()> {
    ctx.telemetry.clear_scalars().await?;
    with_addon(ctx, |_| async move {
        with_blank_tab(ctx, |window| async move {
            ctx.ui.focus_urlbar(window).await?;
            ctx.ui.send_keys(window, "fra").await?;
            wait_for_result_at(ctx, window, 1).await?;

            let (row, _) = pick_suggestion(ctx, window, "b").await?;
            let provider = row.provider().context("picked row is not a quick suggestion")?;

            assert_impressions(ctx, provider, true).await
        })
        .await
    })
    .await
}

/// A suggestion that disappeared before the pick is an impression but not one at the end.
pub async fn impressions_not_showing_at_end(ctx: &ScenarioContext) -> Result<()> {
    ctx.telemetry.clear_scalars().await?;
    with_addon(ctx, |_| async move {
        with_blank_tab(ctx, |window| async move {
            ctx.ui.focus_urlbar(window).await?;
            ctx.ui.send_keys(window, "frab").await?;
            let row = wait_for_result_at(ctx, window, 1).await?;
            let provider = row.provider().context("row 1 is not a quick suggestion")?;

            // With the suggestion gone, ArrowDown wraps back onto the heuristic row.
            ctx.ui.send_keys(window, "d").await?;
            ctx.ui.send_key(window, NamedKey::ArrowDown).await?;
            ctx.ui.send_key(window, NamedKey::Enter).await?;
            let uri = ctx.navigation.await_load(window).await?;
            assert_searched_for(ctx, &uri, "frabd").await?;

            assert_impressions(ctx, provider, false).await
        })
        .await
    })
    .await
}

async fn assert_impressions(ctx: &ScenarioContext, provider: &str, at_end: bool) -> Result<()> {
    wait_for_processes_scalars(ctx, &[DYNAMIC_PROCESS], true, |snapshot| {
        has_scalar(snapshot, IMPRESSIONS_SCALAR)
            && (!at_end || has_scalar(snapshot, IMPRESSIONS_AT_END_SCALAR))
    })
    .await?;

    let scalars = process_scalars(ctx, DYNAMIC_PROCESS, true, true).await?;
    assert_keyed_scalar(&scalars, IMPRESSIONS_SCALAR, provider, 1)?;
    if at_end {
        assert_keyed_scalar(&scalars, IMPRESSIONS_AT_END_SCALAR, provider, 1)?;
    } else {
        assert_scalar_absent(&scalars, IMPRESSIONS_AT_END_SCALAR)?;
    }
    Ok(())
}
