use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "BATCHFOSSIL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/batchfossil.toml";
const ENV_PREFIX: &str = "BATCHFOSSIL";
const ENV_SEPARATOR: &str = "__";

/// Read `.env`, then resolve the config file from `BATCHFOSSIL_CONFIG`
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Defaults, overlaid by `config_path` when it exists, overlaid by the environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::info!(path = %config_path.display(), "No configuration file, using defaults");
    }

    // BATCHFOSSIL__FOSSILIZER__MAX_LEAVES -> fossilizer.max_leaves
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.fossilizer.max_leaves, 32768);
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:6000");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[fossilizer]
interval = "30s"
max_leaves = 1024
max_sim_batches = 4
path = "/var/lib/batchfossil"
archive = true
stop_batch = true
provider = "unit-test"
commit = "abc123"

[server]
bind_addr = "127.0.0.1:7000"
recent_results = 50
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        let fossilizer = &config.fossilizer;
        assert_eq!(fossilizer.interval.as_duration(), Duration::from_secs(30));
        assert_eq!(fossilizer.max_leaves, 1024);
        assert_eq!(fossilizer.max_sim_batches, 4);
        assert_eq!(fossilizer.path, PathBuf::from("/var/lib/batchfossil"));
        assert!(fossilizer.archive);
        assert!(fossilizer.stop_batch);
        assert_eq!(fossilizer.provider, "unit-test");
        assert_eq!(fossilizer.commit, "abc123");
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:7000");
        assert_eq!(config.server.recent_results, 50);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[fossilizer]\nmax_leaves = 8\n").unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.fossilizer.max_leaves, 8);
        assert_eq!(config.fossilizer.interval.as_duration(), Duration::from_secs(600));
        assert_eq!(config.fossilizer.max_sim_batches, 1);
    }

    // Environment variable overrides are not exercised here: env::set_var is
    // unsafe under edition 2024 and would leak across parallel tests
}
