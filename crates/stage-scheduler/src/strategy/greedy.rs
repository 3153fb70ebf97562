// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Greedy fallback scheduler.
//!
//! Approximates the exact program in linear time and never fails. Requests
//! are visited by descending value/cost ratio:
//!
//! ```text
//! value = 1 + priority
//! cost  = 1 + word_count(prompt) / 100
//! ```
//!
//! Each request then takes stages strictly in canonical order while the
//! remaining resource pool covers them, stopping at the first stage that
//! does not fit. Ties keep submission order (stable sort), and the result
//! is reported in submission order regardless of visiting order.
//!
//! # When to use
//! - The circuit breaker is open or the solver is unavailable.
//! - The exact solve failed for any reason.

use crate::strategy::ScheduleStrategy;
use crate::{Assignment, CostModel, LevelBands, Schedule, ScheduleError, SchedulerConfig};
use resource_monitor::ResourceSnapshot;
use stage_model::{PipelineState, ResourceVector, Stage};

/// Slack allowed when admitting a stage into the remaining pool.
const ADMIT_TOLERANCE: f64 = 1e-9;

/// Value-over-cost greedy scheduler.
#[derive(Debug, Clone, Default)]
pub struct GreedyFallback {
    cost: CostModel,
    bands: LevelBands,
}

impl GreedyFallback {
    pub fn new(cost: CostModel, bands: LevelBands) -> Self {
        Self { cost, bands }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.cost.clone(), config.bands.clone())
    }

    /// `(1 + priority) / (1 + words / 100)`.
    pub fn value_cost_ratio(request: &PipelineState) -> f64 {
        let value = 1.0 + request.priority;
        let cost = 1.0 + request.word_count() as f64 / 100.0;
        value / cost
    }

    /// Indices of `requests` in visiting order.
    pub fn visit_order(requests: &[PipelineState]) -> Vec<usize> {
        let ratios: Vec<f64> = requests.iter().map(Self::value_cost_ratio).collect();
        let mut order: Vec<usize> = (0..requests.len()).collect();
        order.sort_by(|a, b| ratios[*b].total_cmp(&ratios[*a]));
        order
    }

    /// Produces a schedule. Never fails; the worst case is an empty stage
    /// list for every request.
    pub fn optimize(&self, requests: &[PipelineState], snapshot: &ResourceSnapshot) -> Schedule {
        let level = self.bands.classify(snapshot);
        let requirements = self.cost.requirements_for(level);
        let mut pool = ResourceVector::available_in(snapshot);
        let mut chosen: Vec<Vec<Stage>> = vec![Vec::new(); requests.len()];
        let mut objective = 0.0;

        for i in Self::visit_order(requests) {
            for stage in Stage::ALL {
                let need = requirements.get(stage);
                if !need.fits_within(&pool, ADMIT_TOLERANCE) {
                    break;
                }
                pool = pool.saturating_sub(need);
                chosen[i].push(stage);
                objective += requests[i].priority * self.cost.quality_weights.get(stage);
            }
        }

        tracing::debug!(
            "greedy fallback scheduled {} stages across {} requests at level {level}",
            chosen.iter().map(Vec::len).sum::<usize>(),
            requests.len()
        );

        Schedule {
            strategy_name: self.name().to_string(),
            level,
            objective,
            assignments: chosen
                .into_iter()
                .enumerate()
                .map(|(request, stages)| Assignment { request, stages })
                .collect(),
        }
    }
}

impl ScheduleStrategy for GreedyFallback {
    fn name(&self) -> &str {
        "greedy"
    }

    fn schedule(
        &self,
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<Schedule, ScheduleError> {
        Ok(self.optimize(requests, snapshot))
    }
}
