//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_api(config, &mut result);
        Self::validate_request(config, &mut result);
        Self::validate_realtime(config, &mut result);
        Self::validate_transfer(config, &mut result);
        Self::validate_storage(config, &mut result);

        Ok(result)
    }

    fn validate_api(config: &Config, result: &mut ValidationResult) {
        match Url::parse(&config.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result.add_error(ValidationError::new(
                "api.base_url",
                format!("Unsupported scheme '{}', expected http or https", url.scheme()),
            )),
            Err(e) => result.add_error(ValidationError::new(
                "api.base_url",
                format!("Invalid URL: {}", e),
            )),
        }

        for (path, value) in [
            ("api.login_path", &config.api.login_path),
            ("api.verify_path", &config.api.verify_path),
            ("api.logout_path", &config.api.logout_path),
        ] {
            if value.is_empty() {
                result.add_error(ValidationError::new(path, "Endpoint path cannot be empty"));
            }
        }
    }

    fn validate_request(config: &Config, result: &mut ValidationResult) {
        let request = &config.request;

        if request.timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "request.timeout_ms",
                "timeout_ms must be greater than 0",
            ));
        }

        if request.retry_attempts > 10 {
            result.add_warning(ValidationWarning::new(
                "request.retry_attempts",
                "retry_attempts is very high (>10), failing requests will take long to surface",
            ));
        }

        if request.retryable_statuses.contains(&401) {
            result.add_warning(ValidationWarning::new(
                "request.retryable_statuses",
                "401 is never retried; it always clears the session",
            ));
        }
    }

    fn validate_realtime(config: &Config, result: &mut ValidationResult) {
        let realtime = &config.realtime;

        match Url::parse(&realtime.url) {
            Ok(url) if matches!(url.scheme(), "ws" | "wss" | "http" | "https") => {}
            Ok(url) => result.add_error(ValidationError::new(
                "realtime.url",
                format!("Unsupported scheme '{}', expected ws, wss, http or https", url.scheme()),
            )),
            Err(e) => result.add_error(ValidationError::new(
                "realtime.url",
                format!("Invalid URL: {}", e),
            )),
        }

        if realtime.max_reconnect_attempts == 0 {
            result.add_error(ValidationError::new(
                "realtime.max_reconnect_attempts",
                "max_reconnect_attempts must be greater than 0",
            ));
        }

        if realtime.backoff_multiplier.is_nan() || realtime.backoff_multiplier < 1.0 {
            result.add_error(ValidationError::new(
                "realtime.backoff_multiplier",
                "backoff_multiplier must be at least 1.0",
            ));
        }

        if realtime.max_reconnect_delay_ms < realtime.reconnect_delay_ms {
            result.add_error(ValidationError::new(
                "realtime.max_reconnect_delay_ms",
                "max_reconnect_delay_ms cannot be lower than reconnect_delay_ms",
            ));
        }
    }

    fn validate_transfer(config: &Config, result: &mut ValidationResult) {
        if config.transfer.concurrency == 0 {
            result.add_error(ValidationError::new(
                "transfer.concurrency",
                "concurrency must be greater than 0",
            ));
        }

        if config.transfer.concurrency > 16 {
            result.add_warning(ValidationWarning::new(
                "transfer.concurrency",
                "concurrency above 16 may saturate the recording server",
            ));
        }
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        let storage = &config.storage;

        if storage.dir.is_empty() {
            result.add_error(ValidationError::new("storage.dir", "Storage directory cannot be empty"));
        }

        for (path, key) in [
            ("storage.token_key", &storage.token_key),
            ("storage.user_key", &storage.user_key),
        ] {
            if key.is_empty() {
                result.add_error(ValidationError::new(path, "Storage key cannot be empty"));
            } else if key.contains(['/', '\\']) {
                result.add_error(ValidationError::new(path, "Storage key cannot contain path separators"));
            }
        }

        if storage.token_key == storage.user_key {
            result.add_error(ValidationError::new(
                "storage.user_key",
                "user_key must differ from token_key",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
