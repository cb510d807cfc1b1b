use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tether_dispatch::DispatcherConfig;
use tether_logger::LoggerConfig;

const ENV_PREFIX: &str = "TETHER";

#[tether_derive::tether_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Everything the demo binary reads at startup.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub logger: LoggerConfig,
    pub dispatcher: DispatcherConfig,
}

/// Loads `T` from an optional TOML file overlaid with `TETHER__*` environment
/// variables. Nested keys use a double underscore, so
/// `TETHER__DISPATCHER__MAX_DISPATCH_DEPTH` maps to `dispatcher.max_dispatch_depth`.
///
/// Without a file, or when the file does not exist, only the environment and
/// the type's defaults apply.
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is malformed or the merged
/// values do not match `T`.
pub fn load_config<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(false));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .convert_case(config::Case::Snake)
                .try_parsing(true),
        )
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
