// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stage cost model.
//!
//! Both schedulers price stages through the same [`CostModel`] so the
//! greedy fallback approximates exactly the problem the exact scheduler
//! solves. Requirements shrink at lower quality levels: a stage run at
//! `low` quality does less work than the same stage at `high`.

use crate::ScheduleError;
use stage_model::{
    default_quality_weights, default_requirements, ResourceLevel, ResourceVector, StageTable,
};

/// Requirement multiplier per quality level.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LevelScale {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub minimal: f64,
}

impl Default for LevelScale {
    fn default() -> Self {
        Self {
            high: 1.0,
            medium: 0.8,
            low: 0.6,
            minimal: 0.6,
        }
    }
}

impl LevelScale {
    pub fn factor(&self, level: ResourceLevel) -> f64 {
        match level {
            ResourceLevel::High => self.high,
            ResourceLevel::Medium => self.medium,
            ResourceLevel::Low => self.low,
            ResourceLevel::Minimal => self.minimal,
        }
    }
}

/// Quality weights, base requirements and level scaling.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub quality_weights: StageTable<f64>,
    pub requirements: StageTable<ResourceVector>,
    pub level_scale: LevelScale,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            quality_weights: default_quality_weights(),
            requirements: default_requirements(),
            level_scale: LevelScale::default(),
        }
    }
}

impl CostModel {
    /// Requirement table scaled for `level`.
    pub fn requirements_for(&self, level: ResourceLevel) -> StageTable<ResourceVector> {
        let factor = self.level_scale.factor(level);
        self.requirements.map(|_, v| v.scaled(factor))
    }

    /// Checks weights, requirements and scale factors.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (stage, w) in self.quality_weights.iter() {
            if !w.is_finite() || *w < 0.0 {
                return Err(ScheduleError::Config(format!(
                    "quality weight for '{stage}' must be finite and non-negative, got {w}"
                )));
            }
        }
        for (stage, req) in self.requirements.iter() {
            if !req.is_valid_fraction() {
                return Err(ScheduleError::Config(format!(
                    "requirements for '{stage}' must be fractions in [0, 1], got {req:?}"
                )));
            }
        }
        let s = &self.level_scale;
        if ![s.high, s.medium, s.low, s.minimal]
            .iter()
            .all(|f| f.is_finite() && *f > 0.0 && *f <= 1.0)
        {
            return Err(ScheduleError::Config(
                "level scale factors must lie in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_model::Stage;

    #[test]
    fn test_requirements_scale_with_level() {
        let cost = CostModel::default();
        let high = cost.requirements_for(ResourceLevel::High);
        let low = cost.requirements_for(ResourceLevel::Low);
        assert_eq!(high.detail.cpu, 0.3);
        assert!((low.detail.cpu - 0.18).abs() < 1e-12);
        assert!((low.get(Stage::Template).memory - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut cost = CostModel::default();
        assert!(cost.validate().is_ok());
        cost.quality_weights.detail = -1.0;
        assert!(cost.validate().is_err());

        let mut cost = CostModel::default();
        cost.requirements.optimize.gpu = 1.5;
        assert!(cost.validate().is_err());

        let mut cost = CostModel::default();
        cost.level_scale.low = 0.0;
        assert!(cost.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cost: CostModel = toml::from_str(
            r#"
[quality_weights]
template = 0.6
detail = 0.3
optimize = 0.1
"#,
        )
        .unwrap();
        assert_eq!(cost.quality_weights.template, 0.6);
        assert_eq!(cost.requirements, default_requirements());
    }
}
