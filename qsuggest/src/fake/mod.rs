//! In-process browser standing in for a real one in scenario runs.

pub mod addon;
mod browser;
pub mod prefs;
pub mod telemetry;
pub mod urlbar;

pub use addon::{AddonError, AddonManifest, AddonRegistry};
pub use browser::FakeBrowser;
