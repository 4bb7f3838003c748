use crate::config::types::{Config, HarvestConfig, QuotaConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_quota_config(&config.quota)?;
    validate_api_config(config)?;
    validate_output_config(config)?;
    validate_credentials(config)?;
    validate_search_space(config)?;
    Ok(())
}

/// Validates harvest configuration
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.target_count == 0 {
        return Err(ConfigError::Validation(
            "target_count must be >= 1".to_string(),
        ));
    }

    if config.max_results_per_search < 1 || config.max_results_per_search > 500 {
        return Err(ConfigError::Validation(format!(
            "max_results_per_search must be between 1 and 500, got {}",
            config.max_results_per_search
        )));
    }

    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_interval must be >= 1".to_string(),
        ));
    }

    if let Some(published_after) = &config.published_after {
        chrono::DateTime::parse_from_rfc3339(published_after).map_err(|e| {
            ConfigError::Validation(format!(
                "published_after must be an RFC 3339 timestamp: {}",
                e
            ))
        })?;
    }

    Ok(())
}

/// Validates quota configuration
fn validate_quota_config(config: &QuotaConfig) -> Result<(), ConfigError> {
    if config.daily_budget == 0 {
        return Err(ConfigError::Validation(
            "daily_budget must be >= 1".to_string(),
        ));
    }

    if config.search_cost == 0 || config.detail_cost == 0 {
        return Err(ConfigError::Validation(
            "search_cost and detail_cost must be >= 1".to_string(),
        ));
    }

    if config.search_cost > config.daily_budget {
        return Err(ConfigError::Validation(format!(
            "search_cost ({}) exceeds daily_budget ({}); no search could ever be issued",
            config.search_cost, config.daily_budget
        )));
    }

    if config.window_hours == 0 {
        return Err(ConfigError::Validation(
            "window_hours must be >= 1".to_string(),
        ));
    }

    if config.max_retries == 0 {
        return Err(ConfigError::Validation(
            "max_retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the API base URL
fn validate_api_config(config: &Config) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must be http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.api.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output paths
fn validate_output_config(config: &Config) -> Result<(), ConfigError> {
    if config.output.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv_path cannot be empty".to_string(),
        ));
    }

    if config.output.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the credential list
fn validate_credentials(config: &Config) -> Result<(), ConfigError> {
    if config.credential.is_empty() {
        return Err(ConfigError::Validation(
            "at least one credential is required".to_string(),
        ));
    }

    for entry in &config.credential {
        if entry.id.is_empty() {
            return Err(ConfigError::Validation(
                "credential id cannot be empty".to_string(),
            ));
        }
        if entry.token.is_empty() {
            return Err(ConfigError::Validation(format!(
                "credential '{}' has an empty token",
                entry.id
            )));
        }
    }

    let mut ids: Vec<&str> = config.credential.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != config.credential.len() {
        return Err(ConfigError::Validation(
            "credential ids must be unique".to_string(),
        ));
    }

    Ok(())
}

/// Validates the category and city tables that define the search space
fn validate_search_space(config: &Config) -> Result<(), ConfigError> {
    if config.category.is_empty() {
        return Err(ConfigError::Validation(
            "at least one category is required".to_string(),
        ));
    }

    if config.city.is_empty() {
        return Err(ConfigError::Validation(
            "at least one city is required".to_string(),
        ));
    }

    for category in &config.category {
        if category.term.is_empty() {
            return Err(ConfigError::Validation(
                "category term cannot be empty".to_string(),
            ));
        }

        // Per-category city lists must reference configured cities
        for city in &category.cities {
            if !config.city.iter().any(|c| &c.name == city) {
                return Err(ConfigError::Validation(format!(
                    "category '{}' references unknown city '{}'",
                    category.term, city
                )));
            }
        }
    }

    for city in &config.city {
        if city.name.is_empty() || city.country.is_empty() {
            return Err(ConfigError::Validation(
                "city name and country cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
