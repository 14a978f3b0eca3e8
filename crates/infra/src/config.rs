//! Runtime configuration, read from the environment with defaults.

use storefront_observability::LogFormat;
use tracing::warn;

pub const CONFLICT_RETRIES_VAR: &str = "STOREFRONT_CONFLICT_RETRIES";
pub const LOG_FORMAT_VAR: &str = "STOREFRONT_LOG_FORMAT";
pub const DEFAULT_COUNTRY_VAR: &str = "STOREFRONT_DEFAULT_COUNTRY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontConfig {
    /// Extra attempts after an optimistic-concurrency conflict before the
    /// caller sees `Conflict`.
    pub conflict_retries: u32,
    pub log_format: LogFormat,
    /// Filled into shipping addresses that leave the country blank.
    pub default_country: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
            log_format: LogFormat::Json,
            default_country: "India".to_string(),
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary source. Invalid
    /// values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let conflict_retries = match lookup(CONFLICT_RETRIES_VAR) {
            None => defaults.conflict_retries,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(var = CONFLICT_RETRIES_VAR, value = %raw, "invalid value, using default");
                defaults.conflict_retries
            }),
        };

        let log_format = match lookup(LOG_FORMAT_VAR) {
            None => defaults.log_format,
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(var = LOG_FORMAT_VAR, error = %err, "invalid value, using default");
                defaults.log_format
            }),
        };

        let default_country = match lookup(DEFAULT_COUNTRY_VAR) {
            Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
            Some(_) => {
                warn!(var = DEFAULT_COUNTRY_VAR, "blank value, using default");
                defaults.default_country
            }
            None => defaults.default_country,
        };

        Self {
            conflict_retries,
            log_format,
            default_country,
        }
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> StorefrontConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StorefrontConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from(&[]), StorefrontConfig::default());
    }

    #[test]
    fn values_are_read() {
        let cfg = from(&[
            (CONFLICT_RETRIES_VAR, "7"),
            (LOG_FORMAT_VAR, "pretty"),
            (DEFAULT_COUNTRY_VAR, " Nepal "),
        ]);
        assert_eq!(cfg.conflict_retries, 7);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.default_country, "Nepal");
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = from(&[
            (CONFLICT_RETRIES_VAR, "-1"),
            (LOG_FORMAT_VAR, "xml"),
            (DEFAULT_COUNTRY_VAR, "  "),
        ]);
        assert_eq!(cfg, StorefrontConfig::default());
    }
}
