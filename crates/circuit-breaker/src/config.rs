// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Breaker thresholds and per-service presets.
//!
//! # TOML Format
//! ```toml
//! failure_threshold = 3
//! reset_timeout_secs = 30.0
//! ```

use crate::BreakerError;
use std::time::Duration;

/// When a breaker opens and how long it stays open.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open a closed breaker.
    pub failure_threshold: u32,
    /// Cooldown before an open breaker lets a probe through.
    pub reset_timeout_secs: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::optimizer()
    }
}

impl BreakerConfig {
    pub fn new(failure_threshold: u32, reset_timeout_secs: f64) -> Self {
        Self {
            failure_threshold,
            reset_timeout_secs,
        }
    }

    /// Remote model APIs: fail fast, retry within a minute.
    pub fn cloud_api() -> Self {
        Self::new(3, 60.0)
    }

    /// Heavy local work such as rendering or diffusion: tolerate more
    /// failures, back off for five minutes.
    pub fn local_compute() -> Self {
        Self::new(5, 300.0)
    }

    /// The exact solver: the fallback is cheap, so give up quickly and
    /// probe again soon.
    pub fn optimizer() -> Self {
        Self::new(3, 30.0)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.reset_timeout_secs.max(0.0))
    }

    pub fn validate(&self, name: &str) -> Result<(), BreakerError> {
        if self.failure_threshold == 0 {
            return Err(BreakerError::ZeroThreshold { name: name.into() });
        }
        if !self.reset_timeout_secs.is_finite() || self.reset_timeout_secs < 0.0 {
            return Err(BreakerError::InvalidTimeout {
                name: name.into(),
                secs: self.reset_timeout_secs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(BreakerConfig::cloud_api(), BreakerConfig::new(3, 60.0));
        assert_eq!(BreakerConfig::local_compute(), BreakerConfig::new(5, 300.0));
        assert_eq!(BreakerConfig::default(), BreakerConfig::optimizer());
        assert_eq!(BreakerConfig::optimizer().reset_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate() {
        assert!(BreakerConfig::default().validate("x").is_ok());
        assert!(matches!(
            BreakerConfig::new(0, 1.0).validate("x"),
            Err(BreakerError::ZeroThreshold { .. })
        ));
        assert!(matches!(
            BreakerConfig::new(1, f64::NAN).validate("x"),
            Err(BreakerError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_from_toml_with_defaults() {
        let config: BreakerConfig = toml::from_str("failure_threshold = 7").unwrap();
        assert_eq!(config.failure_threshold, 7);
        assert_eq!(config.reset_timeout_secs, 30.0);
    }
}
