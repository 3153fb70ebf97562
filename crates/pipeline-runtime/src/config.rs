// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! Every section is optional and falls back to its defaults.
//!
//! # TOML Format
//! ```toml
//! [monitor]
//! sample_interval_ms = 1000
//! window_size = 10
//!
//! [optimizer_breaker]
//! failure_threshold = 3
//! reset_timeout_secs = 30.0
//!
//! [scheduler]
//! solver = "branch-and-bound"
//!
//! [sensitivity]
//! impact_threshold = 0.3
//!
//! [cache]
//! ttl_secs = 3600
//! max_entries = 512
//!
//! [request]
//! timeout_secs = 600.0
//! solve_timeout_ms = 5000
//!
//! [executor]
//! stage_timeout_secs = 180.0
//!
//! [executor.stages.template]
//! program = "python3"
//! args = ["stages/template.py"]
//! ```

use crate::RuntimeError;
use circuit_breaker::{BreakerConfig, CircuitBreaker};
use resource_monitor::MonitorConfig;
use stage_model::Stage;
use stage_scheduler::{AnalysisThresholds, SchedulerConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of a cached artifact.
    pub ttl_secs: u64,
    /// Entries kept by the in-memory store before the oldest are evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_entries: 512,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// External program that runs one stage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Stage execution settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Command per stage, keyed by stage name.
    pub stages: BTreeMap<String, CommandSpec>,
    /// Upper bound on one stage's run time.
    pub stage_timeout_secs: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stages: BTreeMap::new(),
            stage_timeout_secs: 180.0,
        }
    }
}

impl ExecutorConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stage_timeout_secs.max(0.0))
    }

    /// Commands keyed by parsed stage.
    pub fn commands(&self) -> Result<BTreeMap<Stage, CommandSpec>, RuntimeError> {
        self.stages
            .iter()
            .map(|(name, spec)| {
                let stage = Stage::from_str_loose(name).ok_or_else(|| {
                    RuntimeError::ConfigError(format!("unknown stage '{name}' in [executor.stages]"))
                })?;
                Ok((stage, spec.clone()))
            })
            .collect()
    }
}

/// Per-request bounds and failure policy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Hard bound on one `generate` call, scheduling and stages included.
    pub timeout_secs: f64,
    /// External safety net around the exact solve.
    pub solve_timeout_ms: u64,
    /// Return a placeholder artifact instead of an error when no stage
    /// produced output.
    pub placeholder_on_failure: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600.0,
            solve_timeout_ms: 5000,
            placeholder_on_failure: true,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }

    pub fn solve_timeout(&self) -> Duration {
        Duration::from_millis(self.solve_timeout_ms)
    }
}

/// Configuration for the whole runtime.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub monitor: MonitorConfig,
    pub optimizer_breaker: BreakerConfig,
    pub scheduler: SchedulerConfig,
    pub sensitivity: AnalysisThresholds,
    pub cache: CacheConfig,
    pub executor: ExecutorConfig,
    pub request: RequestConfig,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Checks every section. Run once at startup.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.monitor.window_size == 0 {
            return Err(RuntimeError::ConfigError(
                "monitor.window_size must be at least 1".into(),
            ));
        }
        let fallback = self.monitor.fallback_available_pct;
        if !(fallback.is_finite() && fallback > 0.0 && fallback <= 100.0) {
            return Err(RuntimeError::ConfigError(format!(
                "monitor.fallback_available_pct must be in (0, 100], got {fallback}"
            )));
        }
        self.optimizer_breaker
            .validate("optimizer")
            .map_err(|e| RuntimeError::ConfigError(e.to_string()))?;
        self.scheduler
            .validate()
            .map_err(|e| RuntimeError::ConfigError(e.to_string()))?;
        self.sensitivity
            .validate()
            .map_err(|e| RuntimeError::ConfigError(format!("sensitivity: {e}")))?;
        if self.cache.enabled && (self.cache.ttl_secs == 0 || self.cache.max_entries == 0) {
            return Err(RuntimeError::ConfigError(
                "cache.ttl_secs and cache.max_entries must be positive when the cache is enabled"
                    .into(),
            ));
        }
        if !(self.executor.stage_timeout_secs.is_finite() && self.executor.stage_timeout_secs > 0.0)
        {
            return Err(RuntimeError::ConfigError(format!(
                "executor.stage_timeout_secs must be positive, got {}",
                self.executor.stage_timeout_secs
            )));
        }
        self.executor.commands()?;
        if !(self.request.timeout_secs.is_finite() && self.request.timeout_secs > 0.0) {
            return Err(RuntimeError::ConfigError(format!(
                "request.timeout_secs must be positive, got {}",
                self.request.timeout_secs
            )));
        }
        if self.request.solve_timeout_ms == 0 {
            return Err(RuntimeError::ConfigError(
                "request.solve_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Creates the breaker guarding the exact solver.
    pub fn create_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new("optimizer", self.optimizer_breaker.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        RuntimeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = RuntimeConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = RuntimeConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml() {
        let config = RuntimeConfig::from_toml(
            r#"
            [optimizer_breaker]
            failure_threshold = 5

            [request]
            solve_timeout_ms = 250

            [executor.stages.template]
            program = "python3"
            args = ["template.py"]
            "#,
        )
        .unwrap();
        assert_eq!(config.optimizer_breaker.failure_threshold, 5);
        assert_eq!(config.optimizer_breaker.reset_timeout_secs, 30.0);
        assert_eq!(config.request.solve_timeout(), Duration::from_millis(250));
        assert_eq!(config.request.timeout_secs, 600.0);
        let commands = config.executor.commands().unwrap();
        assert_eq!(commands[&Stage::Template].args, vec!["template.py"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_sections() {
        let mut config = RuntimeConfig::default();
        config.optimizer_breaker.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(RuntimeError::ConfigError(_))));

        let mut config = RuntimeConfig::default();
        config.scheduler.solver = "simulated-annealing".into();
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.executor.stages.insert(
            "polish".into(),
            CommandSpec {
                program: "x".into(),
                args: vec![],
            },
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("polish"));

        let mut config = RuntimeConfig::default();
        config.request.timeout_secs = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = RuntimeConfig::from_file(Path::new("/nonexistent/c2s.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }
}
