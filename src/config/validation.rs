use super::models::{Config, FossilizerConfig, ServerConfig};
use std::path::Component;
use std::time::Duration;
use thiserror::Error;

/// Anything above this is almost certainly a unit mistake ("10" meaning minutes)
const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Hard ceiling on leaves per batch, bounds memory of one sealing task
const MAX_LEAVES_LIMIT: usize = 1 << 24;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Fossilizer interval {0:?} exceeds the limit of 7 days")]
    IntervalTooLong(Duration),

    #[error("max_leaves ({actual}) exceeds limit of {limit}")]
    MaxLeavesExceedsLimit { actual: usize, limit: usize },

    #[error("Batch log path must not contain '..': {0}")]
    PathTraversal(String),

    #[error("Provider must not contain control characters")]
    InvalidProvider,

    #[error("Server {field} must be positive")]
    ZeroServerLimit { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_fossilizer(&config.fossilizer)?;
    validate_server(&config.server)?;
    Ok(())
}

/// Validate fossilizer settings
///
/// Zero values are not errors here: they fall back to defaults when the
/// fossilizer normalizes its configuration.
pub fn validate_fossilizer(config: &FossilizerConfig) -> Result<(), ValidationError> {
    let interval = config.interval.as_duration();
    if interval > MAX_INTERVAL {
        return Err(ValidationError::IntervalTooLong(interval));
    }

    if config.max_leaves > MAX_LEAVES_LIMIT {
        return Err(ValidationError::MaxLeavesExceedsLimit {
            actual: config.max_leaves,
            limit: MAX_LEAVES_LIMIT,
        });
    }

    if config
        .path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(ValidationError::PathTraversal(
            config.path.display().to_string(),
        ));
    }

    if config.provider.chars().any(char::is_control) {
        return Err(ValidationError::InvalidProvider);
    }

    Ok(())
}

fn validate_server(config: &ServerConfig) -> Result<(), ValidationError> {
    if config.recent_results == 0 {
        return Err(ValidationError::ZeroServerLimit {
            field: "recent_results",
        });
    }
    if config.event_buffer == 0 {
        return Err(ValidationError::ZeroServerLimit {
            field: "event_buffer",
        });
    }
    Ok(())
}
