use anyhow::{ensure, Result};
use tracing::info;

use super::{assert_searched_for, pick_suggestion};
use crate::browser::{PrefValue, WindowId, PRIVATE_SUGGESTIONS_PREF, SUGGESTIONS_PREF};
use crate::context::ScenarioContext;
use crate::scope::{with_addon, with_blank_tab, with_prefs, with_window};
use crate::telemetry::wait_for_result_at;

/// Picking the suggestion for a partial keyword searches for its full term.
pub async fn basic(ctx: &ScenarioContext) -> Result<()> {
    with_addon(ctx, |_| async move {
        with_blank_tab(ctx, |window| async move {
            let (row, uri) = pick_suggestion(ctx, window, "frab").await?;
            info!(title = %row.title, %uri, "suggestion picked");
            assert_searched_for(ctx, &uri, "frabbits").await
        })
        .await
    })
    .await
}

/// No suggestion while search suggestions are turned off.
pub async fn suggestions_disabled(ctx: &ScenarioContext) -> Result<()> {
    with_addon(ctx, |_| async move {
        let prefs = [(SUGGESTIONS_PREF, PrefValue::Bool(false))];
        with_prefs(ctx, &prefs, || async move {
            with_blank_tab(ctx, |window| async move {
                assert_only_heuristic_row(ctx, window, "frab").await
            })
            .await
        })
        .await
    })
    .await
}

/// No suggestion in private windows unless private suggestions are turned on as well.
pub async fn suggestions_disabled_private(ctx: &ScenarioContext) -> Result<()> {
    with_addon(ctx, |_| async move {
        let prefs = [
            (SUGGESTIONS_PREF, PrefValue::Bool(true)),
            (PRIVATE_SUGGESTIONS_PREF, PrefValue::Bool(false)),
        ];
        with_prefs(ctx, &prefs, || async move {
            with_window(ctx, true, |window| async move {
                assert_only_heuristic_row(ctx, window, "frab").await
            })
            .await
        })
        .await
    })
    .await
}

async fn assert_only_heuristic_row(
    ctx: &ScenarioContext,
    window: WindowId,
    text: &str,
) -> Result<()> {
    ctx.ui.focus_urlbar(window).await?;
    ctx.ui.send_keys(window, text).await?;
    wait_for_result_at(ctx, window, 0).await?;
    ctx.settle().await;

    let rows = ctx.ui.result_rows(window).await?;
    ensure!(
        rows.len() == 1,
        "expected only the heuristic row for {text:?}, got {rows:?}"
    );
    Ok(())
}
