use crate::config::types::{Config, EngineConfig, HttpConfig, OutputConfig, SeedEntry, UserAgentConfig};
use crate::http::Handler;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_http_config(&config.http)?;
    if let Some(output) = &config.output {
        validate_output_config(output)?;
    }
    validate_seeds(&config.seed)?;
    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.thread_num < 1 || config.thread_num > 100 {
        return Err(ConfigError::Validation(format!(
            "thread_num must be between 1 and 100, got {}",
            config.thread_num
        )));
    }

    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "poll_interval_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(&seed.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed.url
            )));
        }

        if Handler::from_name(&seed.func_name).is_none() {
            return Err(ConfigError::UnknownHandler(seed.func_name.clone()));
        }

        if let Some(limit) = &seed.rate_limit {
            if limit.category.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Seed '{}' has an empty rate-limit category",
                    seed.url
                )));
            }
            if limit.per_second < 1 {
                return Err(ConfigError::Validation(format!(
                    "Seed '{}' rate limit must allow at least 1 request per second",
                    seed.url
                )));
            }
        }
    }

    Ok(())
}
