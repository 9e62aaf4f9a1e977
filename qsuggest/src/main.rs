use anyhow::{bail, Context, Result};
use qsuggest::{FakeBrowser, Scenario, ScenarioContext};
use qsuggest::runner::{run_scenarios, RunSummary};
use qsuggest::tracing::setup_tracing;
use qsuggest_attribution::client::AttributionClient;
use qsuggest_attribution::server::AttributionServer;
use qsuggest_config::configuration::load_config;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    setup_tracing(config.log_level.clone());

    let scenarios = Scenario::select(&config.scenarios)?;

    let server = AttributionServer::bind(config.attribution.bind_port)
        .await
        .context("starting attribution server")?;
    let attribution = AttributionClient::new(server.endpoint()?);
    info!(endpoint = %server.endpoint()?, "attribution server started");
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server.run().await {
            error!("attribution server stopped: {err:#}");
        }
    });

    // Ctrl-C cancels pending polls, the current scenario then fails and the rest still report.
    let cancellation = CancellationToken::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling pending waits");
            on_signal.cancel();
        }
    });

    let browser = FakeBrowser::new(&config.browser)?;
    let ctx = ScenarioContext::new(&config, &browser, attribution, cancellation);

    let reports = run_scenarios(&ctx, &scenarios).await?;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }
    let summary = RunSummary::of(&reports);
    println!("{}", serde_json::to_string(&summary)?);

    server_handle.abort();

    if !summary.success() {
        bail!("{} of {} scenarios failed", summary.failed, reports.len());
    }
    Ok(())
}
