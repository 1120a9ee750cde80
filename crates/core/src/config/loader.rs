use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// A missing file is not an error: the service runs entirely on defaults and
/// `RACECARR_` env vars (e.g. `RACECARR_DATABASE_PATH`,
/// `RACECARR_SERVER_PORT`).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed("RACECARR_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from a TOML string (useful for testing).
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
