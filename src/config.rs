use crate::{infra, telemetry};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::env;

const CONFIG_FILE: &str = "CONFIG_FILE";

/// The main configuration: the application specific configuration flattened out, plus the tracing
/// configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    /// Application specific configuration.
    #[serde(flatten)]
    pub config: Config,

    /// Tracing configuration.
    #[serde(rename = "tracing", default)]
    pub tracing_config: telemetry::TracingConfig,
}

/// Application specific configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Infra configuration.
    #[serde(rename = "infra")]
    pub infra_config: infra::Config,
}

/// Extension methods for "configuration structs" which can be deserialized.
pub trait ConfigExt
where
    Self: for<'de> Deserialize<'de>,
{
    /// Load the configuration from the file at the value of the `CONFIG_FILE` environment variable
    /// or `config.yaml` by default, with an overlay provided by environment variables prefixed with
    /// `"APP__"` and split/nested via `"__"`.
    fn load() -> Result<Self, figment::Error> {
        let config_file = env::var(CONFIG_FILE)
            .map(Yaml::file_exact)
            .unwrap_or(Yaml::file_exact("config.yaml"));

        let config = Figment::new()
            .merge(config_file)
            .merge(Env::prefixed("APP__").split("__"))
            .extract()?;

        Ok(config)
    }
}

impl<T> ConfigExt for T where T: for<'de> Deserialize<'de> {}
