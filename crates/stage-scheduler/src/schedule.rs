// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Schedule: the output of a scheduling strategy.
//!
//! A schedule holds one [`Assignment`] per request, in the same order as
//! the requests were submitted. It is the contract between the schedulers
//! and the orchestrator.

use crate::{CostModel, ScheduleError};
use resource_monitor::{Resource, ResourceSnapshot};
use stage_model::{is_canonical_prefix, total_requirement, PipelineState, ResourceLevel, Stage};

/// Absolute slack allowed when checking resource feasibility.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// The stages chosen for one request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Assignment {
    /// Position of the request in the submitted batch.
    pub request: usize,
    pub stages: Vec<Stage>,
}

/// The complete decision for one batch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Schedule {
    /// Strategy that produced this schedule.
    pub strategy_name: String,
    /// Quality level the requirements were scaled for.
    pub level: ResourceLevel,
    /// Σ priority · weight over the chosen stages.
    pub objective: f64,
    /// One entry per request, in input order.
    pub assignments: Vec<Assignment>,
}

impl Schedule {
    /// A schedule with no requests.
    pub fn empty(strategy_name: impl Into<String>, level: ResourceLevel) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            level,
            objective: 0.0,
            assignments: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Stages chosen for the request at `index`.
    pub fn stages_for(&self, index: usize) -> Option<&[Stage]> {
        self.assignments.get(index).map(|a| a.stages.as_slice())
    }

    /// Total number of `(request, stage)` pairs scheduled.
    pub fn total_stages(&self) -> usize {
        self.assignments.iter().map(|a| a.stages.len()).sum()
    }

    /// Validates the schedule against the batch it was made for.
    ///
    /// Checks:
    /// - One assignment per request, in input order.
    /// - Every stage list is a canonical prefix.
    /// - Summed requirements fit every resource present in `snapshot`.
    pub fn validate(
        &self,
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
        cost: &CostModel,
    ) -> Result<(), ScheduleError> {
        let fail = |detail: String| ScheduleError::Validation {
            strategy: self.strategy_name.clone(),
            detail,
        };

        if self.assignments.len() != requests.len() {
            return Err(fail(format!(
                "{} assignments for {} requests",
                self.assignments.len(),
                requests.len()
            )));
        }

        for (i, a) in self.assignments.iter().enumerate() {
            if a.request != i {
                return Err(fail(format!("assignment {i} refers to request {}", a.request)));
            }
            if !is_canonical_prefix(&a.stages) {
                return Err(fail(format!(
                    "request {i} stages {:?} break precedence",
                    a.stages
                )));
            }
        }

        let requirements = cost.requirements_for(self.level);
        let demand = self
            .assignments
            .iter()
            .map(|a| total_requirement(&requirements, &a.stages))
            .fold(stage_model::ResourceVector::default(), |acc, v| acc + v);

        for resource in Resource::SCHEDULABLE {
            if let Some(capacity) = snapshot.fraction(resource) {
                let used = demand.get(resource);
                if used > capacity + FEASIBILITY_TOLERANCE {
                    return Err(fail(format!(
                        "{resource} demand {used:.4} exceeds available {capacity:.4}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Writes the decision into each request's state.
    ///
    /// `states` must be the batch this schedule was made for.
    pub fn apply(&self, states: &mut [PipelineState], fallback_used: bool) -> Result<(), ScheduleError> {
        if states.len() != self.assignments.len() {
            return Err(ScheduleError::Validation {
                strategy: self.strategy_name.clone(),
                detail: format!(
                    "cannot apply {} assignments to {} requests",
                    self.assignments.len(),
                    states.len()
                ),
            });
        }
        for (state, a) in states.iter_mut().zip(&self.assignments) {
            state
                .set_schedule(self.level, a.stages.clone(), fallback_used)
                .map_err(|e| ScheduleError::Validation {
                    strategy: self.strategy_name.clone(),
                    detail: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// Returns a human-readable summary of the schedule.
    ///
    /// # Example output
    /// ```text
    /// Schedule (branch-and-bound, level high): 2 requests, 4 stages, objective 0.8000
    ///   [0] template → detail
    ///   [1] template → detail
    /// ```
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Schedule ({}, level {}): {} requests, {} stages, objective {:.4}",
            self.strategy_name,
            self.level,
            self.len(),
            self.total_stages(),
            self.objective
        );
        for a in &self.assignments {
            let stages = if a.stages.is_empty() {
                "(none)".to_string()
            } else {
                a.stages
                    .iter()
                    .map(Stage::as_str)
                    .collect::<Vec<_>>()
                    .join(" → ")
            };
            s.push_str(&format!("\n  [{}] {stages}", a.request));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(stages: Vec<Vec<Stage>>) -> Schedule {
        Schedule {
            strategy_name: "test".into(),
            level: ResourceLevel::High,
            objective: 0.0,
            assignments: stages
                .into_iter()
                .enumerate()
                .map(|(request, stages)| Assignment { request, stages })
                .collect(),
        }
    }

    fn batch(n: usize) -> Vec<PipelineState> {
        (0..n).map(|i| PipelineState::new(format!("r{i}"), None, 0.5)).collect()
    }

    #[test]
    fn test_validate_accepts_feasible() {
        let s = schedule(vec![Stage::prefix(2), Stage::prefix(2)]);
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0), (Resource::Memory, 1.0)]);
        s.validate(&batch(2), &snap, &CostModel::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_overcommit() {
        let s = schedule(vec![Stage::prefix(3), Stage::prefix(3)]);
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0)]);
        let err = s.validate(&batch(2), &snap, &CostModel::default()).unwrap_err();
        assert!(err.to_string().contains("cpu demand"));
    }

    #[test]
    fn test_validate_ignores_absent_resources() {
        // Two full requests need 1.6 of every axis; only tracked axes count.
        let s = schedule(vec![Stage::prefix(3), Stage::prefix(3)]);
        s.validate(&batch(2), &ResourceSnapshot::new(), &CostModel::default())
            .unwrap();
        let snap = ResourceSnapshot::from_fractions([(Resource::Memory, 1.0)]);
        assert!(s.validate(&batch(2), &snap, &CostModel::default()).is_err());

        let one = schedule(vec![Stage::prefix(3)]);
        let snap = ResourceSnapshot::from_fractions([(Resource::Memory, 1.0)]);
        one.validate(&batch(1), &snap, &CostModel::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_broken_precedence_and_order() {
        let snap = ResourceSnapshot::new();
        let s = schedule(vec![vec![Stage::Detail]]);
        assert!(s.validate(&batch(1), &snap, &CostModel::default()).is_err());

        let mut s = schedule(vec![vec![], vec![]]);
        s.assignments.swap(0, 1);
        assert!(s.validate(&batch(2), &snap, &CostModel::default()).is_err());
        assert!(schedule(vec![vec![]]).validate(&batch(2), &snap, &CostModel::default()).is_err());
    }

    #[test]
    fn test_apply_sets_state() {
        let s = schedule(vec![Stage::prefix(1), Stage::prefix(0)]);
        let mut states = batch(2);
        s.apply(&mut states, true).unwrap();
        assert_eq!(states[0].stages_to_run(), &[Stage::Template]);
        assert!(states[1].stages_to_run().is_empty());
        assert!(states.iter().all(|st| st.fallback_used));
        assert!(s.apply(&mut batch(3), false).is_err());
    }

    #[test]
    fn test_summary() {
        let s = schedule(vec![Stage::prefix(2), vec![]]);
        let text = s.summary();
        assert!(text.contains("2 requests, 2 stages"));
        assert!(text.contains("[0] template → detail"));
        assert!(text.contains("[1] (none)"));
    }
}
