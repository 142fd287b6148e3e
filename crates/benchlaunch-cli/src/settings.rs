use benchlaunch::DEFAULT_ENTRY_POINT;
use config::{Config, ConfigError, Environment, File};
use etcetera::{choose_app_strategy, AppStrategy, AppStrategyArgs};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub static APP_STRATEGY: Lazy<AppStrategyArgs> = Lazy::new(|| AppStrategyArgs {
    top_level_domain: "io.github".to_string(),
    author: "benchlaunch".to_string(),
    app_name: "benchlaunch".to_string(),
});

pub const DEFAULT_MANIFEST: &str = "MLproject";
pub const ENV_PREFIX: &str = "BENCHLAUNCH";
const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub manifest: PathBuf,
    pub entry_point: String,
    pub quote: bool,
    pub log: LogSettings,
}

/// Settings file in the platform config directory, e.g. ~/.config/benchlaunch/settings.toml
pub fn default_settings_path() -> Option<PathBuf> {
    choose_app_strategy(APP_STRATEGY.clone())
        .ok()
        .map(|strategy| strategy.config_dir().join(SETTINGS_FILE_NAME))
}

impl Settings {
    /// Layer compiled defaults, the user settings file, an explicit settings file and
    /// `BENCHLAUNCH_*` environment variables, later sources winning.
    pub fn new(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("manifest", DEFAULT_MANIFEST)?
            .set_default("entry_point", DEFAULT_ENTRY_POINT)?
            .set_default("quote", false)?
            .set_default("log.level", "info")?
            .set_default("log.json", false)?;

        if let Some(path) = default_settings_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        if let Some(path) = settings_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
