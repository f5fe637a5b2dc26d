//! Filter configuration.

use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host-level settings for evaluation.
///
/// # Examples
///
/// ```rust
/// use itemfilter::FilterConfig;
///
/// let config = FilterConfig::from_json(r#"{ "debug": true }"#).unwrap();
/// assert!(config.debug);
/// assert_eq!(config.player_refresh_interval_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Log every matched rule at debug level.
    pub debug: bool,
    /// Minimum time between two player state reads.
    pub player_refresh_interval_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            debug: false,
            player_refresh_interval_ms: 1000,
        }
    }
}

impl FilterConfig {
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn player_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.player_refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::from_json("{}").unwrap();
        assert_eq!(config, FilterConfig::default());
        assert_eq!(config.player_refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            FilterConfig::from_json("{ \"debug\": 3 }"),
            Err(FilterError::Json(_))
        ));
    }
}
