//! End-to-end checks of the quick suggest add-on, driven through the browser interfaces.

mod attribution;
mod suggestions;
mod telemetry;

use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use url::Url;

use crate::browser::{NamedKey, ResultRow, WindowId};
use crate::context::ScenarioContext;
use crate::telemetry::wait_for_result_at;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    Basic,
    Attribution,
    SuggestionsDisabled,
    SuggestionsDisabledPrivate,
    TelemetryNoImpressions,
    TelemetryImpressions,
    TelemetryMultipleImpressions,
    TelemetryImpressionsNotShowingAtEnd,
}

impl Scenario {
    /// Scenarios matching `names` in declaration order, all of them when `names` is empty.
    pub fn select(names: &[String]) -> Result<Vec<Scenario>> {
        let selected = names
            .iter()
            .map(|name| {
                Scenario::from_str(name).with_context(|| format!("unknown scenario {name:?}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Scenario::iter()
            .filter(|scenario| selected.is_empty() || selected.contains(scenario))
            .collect())
    }

    /// Runs the scenario on a cleared history, so every visit it finds is one it caused.
    pub async fn run(self, ctx: &ScenarioContext) -> Result<()> {
        ctx.history
            .clear_history()
            .await
            .context("clearing history")?;

        match self {
            Scenario::Basic => suggestions::basic(ctx).await,
            Scenario::Attribution => attribution::attribution(ctx).await,
            Scenario::SuggestionsDisabled => suggestions::suggestions_disabled(ctx).await,
            Scenario::SuggestionsDisabledPrivate => {
                suggestions::suggestions_disabled_private(ctx).await
            }
            Scenario::TelemetryNoImpressions => telemetry::no_impressions(ctx).await,
            Scenario::TelemetryImpressions => telemetry::impressions(ctx).await,
            Scenario::TelemetryMultipleImpressions => telemetry::multiple_impressions(ctx).await,
            Scenario::TelemetryImpressionsNotShowingAtEnd => {
                telemetry::impressions_not_showing_at_end(ctx).await
            }
        }
    }
}

/// Types `text`, selects the quick suggestion below the heuristic row and picks it. Returns the
/// picked row and the URI the tab landed on.
async fn pick_suggestion(
    ctx: &ScenarioContext,
    window: WindowId,
    text: &str,
) -> Result<(ResultRow, Url)> {
    ctx.ui.focus_urlbar(window).await?;
    ctx.ui.send_keys(window, text).await?;
    let row = wait_for_result_at(ctx, window, 1).await?;
    ctx.ui.send_key(window, NamedKey::ArrowDown).await?;
    ctx.ui.send_key(window, NamedKey::Enter).await?;
    let uri = ctx.navigation.await_load(window).await?;
    Ok((row, uri))
}

/// Checks that the tab landed on the search results for `term` and that this was the only visit.
async fn assert_searched_for(ctx: &ScenarioContext, uri: &Url, term: &str) -> Result<()> {
    let expected = ctx.search_url(term)?;
    ensure!(*uri == expected, "expected a search for {term}, landed on {uri}");
    let visits = ctx.history.visits().await;
    ensure!(
        visits == [expected],
        "expected only the search for {term} in history, got {visits:?}"
    );
    Ok(())
}
