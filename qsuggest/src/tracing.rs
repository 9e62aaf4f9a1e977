use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Logs go to stderr so stdout only carries scenario reports.
///
/// `filter` is either a bare level, applied to this crate, or a full filter directive.
pub fn setup_tracing(filter: Option<String>) {
    let default = "qsuggest=INFO"
        .parse()
        .expect("hard-coded default directive should be valid");

    let builder = EnvFilter::builder().with_default_directive(default);

    let filter = match filter {
        Some(filter) => {
            let filter = match Level::from_str(&filter) {
                Ok(level) => format!("qsuggest={level},qsuggest_core={level}"),
                Err(_) => filter,
            };
            builder.parse_lossy(filter)
        }
        None => builder.from_env_lossy(),
    };

    tracing_subscriber::registry()
        .with(Layer::default().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}
