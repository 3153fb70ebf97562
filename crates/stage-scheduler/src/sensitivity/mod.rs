// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Post-solve sensitivity analysis of the scheduling program.
//!
//! Works on a [`SolvedModel`](crate::SolvedModel) produced by the exact
//! scheduler:
//! - [`SensitivityAnalyzer::analyze_model`] reads values, reduced costs,
//!   duals and slack into a [`SensitivityReport`].
//! - [`generate_recommendations`] turns a report into tuning advice.
//! - [`what_if_scenario`] re-solves a perturbed copy of the model.

pub mod analyzer;
pub mod recommendations;
pub mod what_if;

pub use analyzer::{
    CoefficientRange, ConstraintAnalysis, ResourceSensitivity, SensitivityAnalyzer,
    SensitivityReport, StabilityReport, StageImpact, VariableAnalysis,
};
pub use recommendations::{generate_recommendations, NO_FINDINGS};
pub use what_if::{parse_assignment, what_if_scenario, ParameterChange, WhatIfResult};

/// Tunable thresholds of the analyzer and the recommendation rules.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisThresholds {
    /// Stages whose impact score falls below this are candidates for
    /// becoming optional.
    pub impact_threshold: f64,
    /// Resources whose sensitivity score reaches this are bottlenecks.
    pub resource_alert_level: f64,
    /// Steepness of [`sigmoid_normalize`] for stage impact scores.
    pub sigmoid_scale: f64,
    /// Slack at or below this marks a constraint as binding.
    pub binding_tolerance: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            impact_threshold: 0.3,
            resource_alert_level: 0.7,
            sigmoid_scale: 10.0,
            binding_tolerance: 1e-6,
        }
    }
}

impl AnalysisThresholds {
    pub fn validate(&self) -> Result<(), String> {
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !unit(self.impact_threshold) || !unit(self.resource_alert_level) {
            return Err("impact_threshold and resource_alert_level must lie in [0, 1]".into());
        }
        if !(self.sigmoid_scale.is_finite() && self.sigmoid_scale > 0.0) {
            return Err(format!("sigmoid_scale must be positive, got {}", self.sigmoid_scale));
        }
        if !(self.binding_tolerance.is_finite() && self.binding_tolerance >= 0.0) {
            return Err(format!(
                "binding_tolerance must be non-negative, got {}",
                self.binding_tolerance
            ));
        }
        Ok(())
    }
}

/// Logistic squashing of `x · scale` into `[0, 1]`.
///
/// Saturates to exactly `1.0` / `0.0` once the exponent leaves
/// `[-40, 40]`, so no input can overflow. NaN maps to `0.5`.
pub fn sigmoid_normalize(x: f64, scale: f64) -> f64 {
    let z = x * scale;
    if z.is_nan() {
        return 0.5;
    }
    if z > 40.0 {
        return 1.0;
    }
    if z < -40.0 {
        return 0.0;
    }
    1.0 / (1.0 + (-z).exp())
}
