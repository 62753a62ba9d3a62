//! Settings for the fossilizer and its HTTP front end
//!
//! Values come from struct defaults, then `config/batchfossil.toml` (or the
//! file named by `BATCHFOSSIL_CONFIG`), then `BATCHFOSSIL__<SECTION>__<KEY>`
//! variables, e.g. `BATCHFOSSIL__FOSSILIZER__INTERVAL=30s`. Command-line flags
//! are applied on top by the binary.
//!
//! ```no_run
//! use batchfossil::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Sealing every {}", config.fossilizer.interval);
//! ```

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{Config, FossilizerConfig, ServerConfig};
pub use validation::{ValidationError, validate, validate_fossilizer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load and validate the layered configuration
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Same as [`Config::load`] with an explicit file
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
