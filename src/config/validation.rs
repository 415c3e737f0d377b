//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every proxy rule names a proxy host and a usable port
//! - Every host pattern compiles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HttpClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{non_blank, HttpClientConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A proxy rule has an empty or whitespace proxy host.
    #[error("proxies[{index}]: proxy_host must not be blank")]
    BlankProxyHost { index: usize },

    /// A proxy rule uses port 0.
    #[error("proxies[{index}]: proxy_port must be between 1 and 65535")]
    InvalidProxyPort { index: usize },

    /// A host pattern is not a valid regular expression.
    #[error("proxies[{index}]: invalid host pattern '{pattern}': {reason}")]
    InvalidHostPattern {
        index: usize,
        pattern: String,
        reason: String,
    },
}

/// Validate the configuration, collecting every error found.
pub fn validate_config(config: &HttpClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, rule) in config.proxies.iter().enumerate() {
        if non_blank(Some(&rule.proxy_host)).is_none() {
            errors.push(ValidationError::BlankProxyHost { index });
        }
        if rule.proxy_port == 0 {
            errors.push(ValidationError::InvalidProxyPort { index });
        }
        for pattern in &rule.host_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ValidationError::InvalidHostPattern {
                    index,
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
