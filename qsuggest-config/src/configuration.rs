use std::path::{absolute, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use qsuggest_core::SignedState;
use serde::{Deserialize, Serialize};

/// Prefix of environment variables overriding configuration values. Nested keys are separated
/// with a double underscore, e.g. `QSUGGEST_POLL__TIMEOUT_MS`.
pub const ENV_PREFIX: &str = "QSUGGEST_";

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_SEARCH_URL_TEMPLATE: &str = "https://example.com/search?q={searchTerms}";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub addon: AddonConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
    /// Names of the scenarios to run. Empty means all of them.
    #[serde(default)]
    pub scenarios: Vec<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            timeout_ms: 5000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AddonConfig {
    /// Add-on manifest to install. Falls back to the bundled fixture when unset.
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub expected_signed_state: SignedState,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowserConfig {
    pub search_url_template: String,
    /// Delay before telemetry recorded by the content process becomes visible.
    pub content_latency_ms: u64,
    /// Time a navigation takes to complete.
    pub load_latency_ms: u64,
    /// How long scenarios wait before asserting that a result did *not* appear.
    pub settle_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            search_url_template: DEFAULT_SEARCH_URL_TEMPLATE.to_owned(),
            content_latency_ms: 100,
            load_latency_ms: 20,
            settle_delay_ms: 500,
        }
    }
}

impl BrowserConfig {
    pub fn content_latency(&self) -> Duration {
        Duration::from_millis(self.content_latency_ms)
    }

    pub fn load_latency(&self) -> Duration {
        Duration::from_millis(self.load_latency_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AttributionConfig {
    pub bind_port: u16,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self { bind_port: 8888 }
    }
}

#[derive(Parser, Serialize, Debug, Default)]
#[command(
    name = "qsuggest",
    about = "Runs the quick suggest add-on scenarios against an in-process browser",
    long_about = None,
    version
)]
pub struct Cli {
    #[arg(short = 'c', long, value_name = "PATH")]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    #[arg(short = 'l', long, value_name = "LEVEL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[arg(short = 's', long = "scenario", value_name = "NAME", num_args = 1..)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<String>>,

    #[command(flatten)]
    pub poll: PollArgs,

    #[command(flatten)]
    pub addon: AddonArgs,

    #[command(flatten)]
    pub attribution: AttributionArgs,
}

#[derive(Args, Serialize, Debug, Default)]
pub struct PollArgs {
    #[arg(long = "interval-ms", value_name = "MILLIS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    #[arg(long = "timeout-ms", value_name = "MILLIS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Serialize, Debug, Default)]
pub struct AddonArgs {
    #[arg(long = "addon-path", value_name = "PATH")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[arg(long = "expected-signed-state", value_name = "STATE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_signed_state: Option<SignedState>,
}

#[derive(Args, Serialize, Debug, Default)]
pub struct AttributionArgs {
    #[arg(long = "attribution-port", value_name = "PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_port: Option<u16>,
}

pub fn load_config() -> Result<Config> {
    load_config_from(Cli::parse())
}

/// Layers defaults, the YAML file, `QSUGGEST_*` environment variables and the command line, in
/// that order of precedence.
pub fn load_config_from(cli: Cli) -> Result<Config> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    if let Some(path) = config_file(cli.config.as_ref())? {
        figment = figment.merge(Yaml::file(path));
    }

    let mut config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .merge(Serialized::defaults(cli))
        .extract()
        .context("invalid configuration")?;

    if let Some(path) = config.addon.path.take() {
        let path = absolute(&path)
            .with_context(|| format!("resolving add-on path {}", path.display()))?;
        config.addon.path = Some(path);
    }

    Ok(config)
}

fn config_file(explicit: Option<&PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        return Ok(Some(path.clone()));
    }

    let default = ProjectDirs::from("org", "qsuggest", "qsuggest")
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
        .filter(|path| path.exists());
    Ok(default)
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["qsuggest"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid command line")
    }

    fn load(cli: Cli) -> figment::error::Result<Config> {
        load_config_from(cli).map_err(|e| figment::Error::from(format!("{e:#}")))
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = load(parse(&[]))?;
            assert_eq!(Config::default(), config);
            assert_eq!(Duration::from_millis(100), config.poll.interval());
            assert_eq!(Duration::from_secs(5), config.poll.timeout());
            assert_eq!(SignedState::Missing, config.addon.expected_signed_state);
            Ok(())
        });
    }

    #[test]
    fn test_layer_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "qsuggest.yaml",
                r#"
poll:
  interval_ms: 20
  timeout_ms: 1000
browser:
  search_url_template: "https://search.test/?q={searchTerms}"
  content_latency_ms: 5
  load_latency_ms: 5
  settle_delay_ms: 50
addon:
  expected_signed_state: privileged
scenarios: [basic]
"#,
            )?;
            jail.set_env("QSUGGEST_POLL__TIMEOUT_MS", "2000");
            jail.set_env("QSUGGEST_ATTRIBUTION__BIND_PORT", "9000");

            let config = load(parse(&[
                "--config",
                "qsuggest.yaml",
                "--interval-ms",
                "25",
                "--addon-path",
                "addon.json",
            ]))?;

            assert_eq!(25, config.poll.interval_ms);
            assert_eq!(2000, config.poll.timeout_ms);
            assert_eq!(9000, config.attribution.bind_port);
            assert_eq!(5, config.browser.load_latency_ms);
            assert_eq!(SignedState::Privileged, config.addon.expected_signed_state);
            assert_eq!(vec!["basic".to_owned()], config.scenarios);

            let addon_path = config.addon.path.expect("addon path set");
            assert!(addon_path.is_absolute());
            assert!(addon_path.ends_with("addon.json"));
            Ok(())
        });
    }

    #[test]
    fn test_cli_scenarios_and_signed_state() {
        Jail::expect_with(|_jail| {
            let config = load(parse(&[
                "-s",
                "basic",
                "attribution",
                "--expected-signed-state",
                "privileged",
                "-l",
                "debug",
            ]))?;
            assert_eq!(vec!["basic", "attribution"], config.scenarios);
            assert_eq!(SignedState::Privileged, config.addon.expected_signed_state);
            assert_eq!(Some("debug".to_owned()), config.log_level);
            Ok(())
        });
    }

    #[test]
    fn test_missing_config_file() {
        Jail::expect_with(|_jail| {
            assert!(load_config_from(parse(&["--config", "absent.yaml"])).is_err());
            Ok(())
        });
    }
}
