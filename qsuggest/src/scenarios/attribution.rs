use anyhow::{ensure, Result};
use tracing::info;

use super::pick_suggestion;
use crate::browser::{PrefValue, ATTRIBUTION_URL_PREF};
use crate::context::ScenarioContext;
use crate::scope::{with_addon, with_blank_tab, with_prefs};

/// Picking a suggestion pings the partner attribution URL exactly once.
pub async fn attribution(ctx: &ScenarioContext) -> Result<()> {
    with_addon(ctx, |_| async move {
        let prefs = [(
            ATTRIBUTION_URL_PREF,
            PrefValue::from(ctx.attribution_url.as_str()),
        )];
        with_prefs(ctx, &prefs, || async move {
            let before = ctx.attribution.hits().await?;
            ensure!(before == 0, "attribution server saw {before} hits before the pick");

            with_blank_tab(ctx, |window| async move {
                pick_suggestion(ctx, window, "frab").await?;
                Ok(())
            })
            .await?;

            let after = ctx.attribution.hits().await?;
            info!(after, "attribution hits");
            ensure!(after == 1, "expected one attribution hit, got {after}");
            Ok(())
        })
        .await
    })
    .await
}
