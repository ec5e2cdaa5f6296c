use super::Config;
use super::ConfigError;
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate endpoint URL
        let endpoint = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint URL '{}' must use http or https",
                self.endpoint
            )));
        }

        if self.client_token.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Client token must be set (--client-token or DD_CLIENT_TOKEN)".to_string(),
            ));
        }

        if self.feature_name.is_empty()
            || !self
                .feature_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidConfig(format!(
                "Feature name '{}' must be non-empty and only use [A-Za-z0-9_-]",
                self.feature_name
            )));
        }

        // Validate timeouts
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Connection timeout must be greater than 0".to_string(),
            ));
        }

        // Validate batch file limits
        let persistence = &self.persistence;
        if persistence.max_item_size == 0 || persistence.max_items_per_batch == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch item limits must be greater than 0".to_string(),
            ));
        }
        if persistence.max_item_size > persistence.max_batch_size {
            return Err(ConfigError::InvalidConfig(format!(
                "Max item size ({}) must not exceed max batch size ({})",
                persistence.max_item_size, persistence.max_batch_size
            )));
        }
        if persistence.max_batch_size > persistence.max_disk_space {
            return Err(ConfigError::InvalidConfig(format!(
                "Max batch size ({}) must not exceed max disk space ({})",
                persistence.max_batch_size, persistence.max_disk_space
            )));
        }
        if persistence.cleanup_frequency.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Cleanup frequency must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
