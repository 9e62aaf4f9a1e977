use std::any::Any;
use std::panic::AssertUnwindSafe;

use anyhow::Result;
use futures_util::FutureExt;
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::context::ScenarioContext;
use crate::scenarios::Scenario;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
}

/// Outcome of one scenario, printed as a JSON line by the runner.
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn of(reports: &[ScenarioReport]) -> RunSummary {
        let failed = reports
            .iter()
            .filter(|report| report.status == ScenarioStatus::Failed)
            .count();
        RunSummary {
            passed: reports.len() - failed,
            failed,
            elapsed_ms: reports.iter().map(|report| report.elapsed_ms).sum(),
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Resets the profile and runs the scenarios one after another. A failing or panicking
/// scenario is reported and the run continues with the next one.
pub async fn run_scenarios(
    ctx: &ScenarioContext,
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioReport>> {
    ctx.init().await?;

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let span = info_span!("scenario", name = %scenario);
        let report = run_scenario(ctx, *scenario).instrument(span).await;
        reports.push(report);
    }
    Ok(reports)
}

async fn run_scenario(ctx: &ScenarioContext, scenario: Scenario) -> ScenarioReport {
    info!("started");
    let started = Instant::now();
    let outcome = AssertUnwindSafe(scenario.run(ctx)).catch_unwind().await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
    };

    match &error {
        None => info!(elapsed_ms, "passed"),
        Some(error) => error!(elapsed_ms, %error, "failed"),
    }

    ScenarioReport {
        name: scenario.to_string(),
        status: if error.is_none() {
            ScenarioStatus::Passed
        } else {
            ScenarioStatus::Failed
        },
        elapsed_ms,
        error,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
