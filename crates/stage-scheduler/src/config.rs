// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scheduler configuration.
//!
//! # TOML Format
//! ```toml
//! solver = "branch-and-bound"
//! require_template = false
//! strict_model_errors = false
//!
//! [limits]
//! max_nodes = 10000
//! time_limit_ms = 2000
//!
//! [bands]
//! high_pct = 50.0
//! swap_minimal_used_pct = 75.0
//!
//! [cost.quality_weights]
//! template = 0.5
//! detail = 0.3
//! optimize = 0.2
//! ```

use crate::{CostModel, LevelBands, ScheduleError};
use lp_solver::{BranchAndBound, Solver, SolverLimits};
use std::sync::Arc;

/// Solver names accepted by [`SchedulerConfig::create_solver`].
pub const KNOWN_SOLVERS: [&str; 2] = ["branch-and-bound", "none"];

/// Configuration shared by the exact scheduler and the greedy fallback.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Solver backend: `"branch-and-bound"` or `"none"` (always fall back).
    pub solver: String,
    /// Internal work budget of the solver.
    pub limits: SolverLimits,
    pub cost: CostModel,
    pub bands: LevelBands,
    /// Require every request to run at least the template stage. Makes
    /// the exact model infeasible when not even templates fit.
    pub require_template: bool,
    /// Surface model-construction errors instead of falling back.
    pub strict_model_errors: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            solver: "branch-and-bound".to_string(),
            limits: SolverLimits::default(),
            cost: CostModel::default(),
            bands: LevelBands::default(),
            require_template: false,
            strict_model_errors: false,
        }
    }
}

impl SchedulerConfig {
    /// Creates the solver backend named by this config.
    ///
    /// # Errors
    /// [`ScheduleError::SolverUnavailable`] when the backend is disabled
    /// (`"none"`) or unknown.
    pub fn create_solver(&self) -> Result<Arc<dyn Solver>, ScheduleError> {
        match self.solver.to_lowercase().as_str() {
            "branch-and-bound" | "bnb" | "mip" => {
                Ok(Arc::new(BranchAndBound::new(self.limits.clone())))
            }
            "none" => Err(ScheduleError::SolverUnavailable(
                "solver disabled by configuration".into(),
            )),
            other => Err(ScheduleError::SolverUnavailable(format!(
                "unknown solver '{other}'; expected one of {KNOWN_SOLVERS:?}"
            ))),
        }
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let name = self.solver.to_lowercase();
        if !matches!(name.as_str(), "branch-and-bound" | "bnb" | "mip" | "none") {
            return Err(ScheduleError::Config(format!(
                "unknown solver '{}'; expected one of {KNOWN_SOLVERS:?}",
                self.solver
            )));
        }
        if self.limits.max_nodes == 0 || self.limits.max_iterations == 0 {
            return Err(ScheduleError::Config(
                "solver limits must allow at least one node and one iteration".into(),
            ));
        }
        self.cost.validate()?;
        self.bands.validate()
    }
}
