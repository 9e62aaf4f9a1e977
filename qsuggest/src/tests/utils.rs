use std::time::Duration;

use anyhow::{Context, Result};
use qsuggest_attribution::client::AttributionClient;
use qsuggest_attribution::server::AttributionServer;
use qsuggest_config::configuration::{
    AttributionConfig, BrowserConfig, Config, PollConfig, DEFAULT_SEARCH_URL_TEMPLATE,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ScenarioContext;
use crate::fake::FakeBrowser;

pub const PROVIDER: &str = "ProviderDynamicQuickSuggest";

/// Configuration with latencies small enough for unit test runs.
pub fn fast_config() -> Config {
    Config {
        poll: PollConfig {
            interval_ms: 10,
            timeout_ms: 2000,
        },
        browser: BrowserConfig {
            search_url_template: DEFAULT_SEARCH_URL_TEMPLATE.to_owned(),
            content_latency_ms: 20,
            load_latency_ms: 5,
            settle_delay_ms: 50,
        },
        attribution: AttributionConfig { bind_port: 0 },
        ..Config::default()
    }
}

pub struct ScenarioSetup {
    pub ctx: ScenarioContext,
    pub browser: FakeBrowser,
    pub cancellation: CancellationToken,
    server: JoinHandle<Result<()>>,
}

impl ScenarioSetup {
    pub fn discard(self) {
        self.server.abort();
    }
}

/// Starts an attribution server on a free port and wires a fresh fake browser to it.
///
/// Every setup owns its own browser and server, so tests never observe each other's
/// add-ons, prefs, telemetry or attribution hits.
pub async fn create_setup(config: Config) -> Result<ScenarioSetup> {
    let server = AttributionServer::bind(config.attribution.bind_port)
        .await
        .context("AttributionServer")?;
    let client = AttributionClient::new(server.endpoint()?);
    let server = tokio::spawn(server.run());

    let browser = FakeBrowser::new(&config.browser)?;
    let cancellation = CancellationToken::new();
    let ctx = ScenarioContext::new(&config, &browser, client, cancellation.clone());
    ctx.init().await?;

    Ok(ScenarioSetup {
        ctx,
        browser,
        cancellation,
        server,
    })
}

/// Lets spawned telemetry writes land.
pub async fn wait_for_content_latency(config: &Config) {
    tokio::time::sleep(config.browser.content_latency() + Duration::from_millis(30)).await;
}
