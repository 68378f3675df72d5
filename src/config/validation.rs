//! Semantic validation of a deserialized [`Config`].
//!
//! All issues are collected rather than stopping at the first one.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::schema::Config;
use crate::error::{Severity, ValidationIssue};
use crate::sign::Sign;

/// Shortest accepted public code.
pub const MIN_CODE_LENGTH: usize = 4;

/// Longest accepted public code.
pub const MAX_CODE_LENGTH: usize = 12;

const LONG_COUNTDOWN: Duration = Duration::from_secs(30);

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &Config) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_server(config);
        self.validate_game(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_server(&mut self, config: &Config) {
        if config.server.bind.parse::<SocketAddr>().is_err() {
            self.add_error(
                "server.bind",
                &format!("'{}' is not a socket address", config.server.bind),
            );
        }
        if config.server.sse_buffer == 0 {
            self.add_error("server.sse_buffer", "must be greater than 0");
        }
    }

    fn validate_game(&mut self, config: &Config) {
        let game = &config.game;

        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&game.code_length) {
            self.add_error(
                "game.code_length",
                &format!("must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}"),
            );
        }
        if game.max_code_attempts == 0 {
            self.add_error("game.max_code_attempts", "must be at least 1");
        }
        // A cooldown covering the whole ring would leave a player with no legal sign.
        if game.sign_cooldown >= Sign::COUNT {
            self.add_error(
                "game.sign_cooldown",
                &format!("must be less than the number of signs ({})", Sign::COUNT),
            );
        }
        if game.countdown > LONG_COUNTDOWN {
            self.add_warning(
                "game.countdown",
                &format!(
                    "countdown of {} is unusually long",
                    humantime::format_duration(game.countdown)
                ),
            );
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(config: &Config) -> ValidationResult {
        Validator::new().validate(config)
    }

    #[test]
    fn defaults_are_valid() {
        let result = validate(&Config::default());
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = Config::default();
        config.server.bind = "localhost".into();
        config.server.sse_buffer = 0;
        config.game.code_length = 2;
        config.game.max_code_attempts = 0;
        config.game.sign_cooldown = 16;

        let result = validate(&config);
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "server.bind",
                "server.sse_buffer",
                "game.code_length",
                "game.max_code_attempts",
                "game.sign_cooldown",
            ]
        );
    }

    #[test]
    fn code_length_bounds_are_inclusive() {
        let mut config = Config::default();
        config.game.code_length = MIN_CODE_LENGTH;
        assert!(validate(&config).is_valid());
        config.game.code_length = MAX_CODE_LENGTH;
        assert!(validate(&config).is_valid());
        config.game.code_length = MAX_CODE_LENGTH + 1;
        assert!(validate(&config).has_errors());
    }

    #[test]
    fn long_countdown_warns() {
        let mut config = Config::default();
        config.game.countdown = Duration::from_secs(45);
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].severity, Severity::Warning);
    }
}
