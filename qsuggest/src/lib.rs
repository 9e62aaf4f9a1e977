pub mod browser;
pub mod context;
pub mod fake;
pub mod runner;
pub mod scenarios;
pub mod scope;
pub mod telemetry;
pub mod tracing;

pub use context::ScenarioContext;
pub use fake::FakeBrowser;
pub use scenarios::Scenario;

#[cfg(test)]
mod tests;
