use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use qsuggest_attribution::api::AttributionApi;
use qsuggest_attribution::client::AttributionClient;
use qsuggest_config::configuration::Config;
use qsuggest_core::{ConditionPoller, PollOptions, SignedState};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::browser::{
    search_url, AddonManager, HistoryStore, NavigationObserver, PreferenceStore, SnapshotSource,
    UiDriver, WindowId, ATTRIBUTION_URL_PREF,
};
use crate::fake::FakeBrowser;

pub const DEFAULT_ADDON_PATH: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/quick-suggest-keyword.json");

/// Everything a scenario may touch, passed explicitly to each one.
///
/// The browser facing fields are trait objects so scenarios run unchanged against any browser
/// implementation. Cloning shares the underlying collaborators.
#[derive(Clone)]
pub struct ScenarioContext {
    pub ui: Arc<dyn UiDriver>,
    pub navigation: Arc<dyn NavigationObserver>,
    pub addons: Arc<dyn AddonManager>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub history: Arc<dyn HistoryStore>,
    pub telemetry: Arc<dyn SnapshotSource>,
    pub attribution: Arc<dyn AttributionApi>,
    /// URL the browser pings for attributed picks. Points at the attribution server.
    pub attribution_url: String,
    pub addon_path: PathBuf,
    pub search_url_template: String,
    pub expected_signed_state: SignedState,
    pub poll: PollOptions,
    /// How long to wait before asserting that something did not show up.
    pub settle_delay: Duration,
}

impl ScenarioContext {
    pub fn new(
        config: &Config,
        browser: &FakeBrowser,
        attribution: AttributionClient,
        cancellation: CancellationToken,
    ) -> ScenarioContext {
        let attribution_url = attribution.attribution_url();
        ScenarioContext {
            ui: Arc::new(browser.clone()),
            navigation: Arc::new(browser.clone()),
            addons: Arc::new(browser.clone()),
            prefs: Arc::new(browser.clone()),
            history: Arc::new(browser.clone()),
            telemetry: Arc::new(browser.clone()),
            attribution: Arc::new(attribution),
            attribution_url,
            addon_path: config
                .addon
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ADDON_PATH)),
            search_url_template: config.browser.search_url_template.clone(),
            expected_signed_state: config.addon.expected_signed_state,
            poll: PollOptions::new(config.poll.interval(), config.poll.timeout())
                .with_cancellation(cancellation),
            settle_delay: config.browser.settle_delay(),
        }
    }

    pub fn window(&self) -> WindowId {
        self.ui.main_window()
    }

    /// Poller using the configured interval, timeout and cancellation.
    pub fn poller(&self, condition: impl Into<String>) -> ConditionPoller {
        ConditionPoller::new(self.poll.clone().with_condition(condition))
    }

    /// Search results URL the browser is expected to land on for `term`.
    pub fn search_url(&self, term: &str) -> Result<Url> {
        Ok(search_url(&self.search_url_template, term)?)
    }

    pub async fn settle(&self) {
        tokio::time::sleep(self.settle_delay).await;
    }

    /// Leaves the profile in a known state: no history, no bookmarks, no attribution URL.
    pub async fn init(&self) -> Result<()> {
        self.history
            .clear_history()
            .await
            .context("clearing history")?;
        self.history
            .erase_bookmarks()
            .await
            .context("erasing bookmarks")?;
        self.prefs.clear(ATTRIBUTION_URL_PREF);
        debug!("profile reset");
        Ok(())
    }
}
