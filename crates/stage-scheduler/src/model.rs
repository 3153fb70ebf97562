// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The stage-assignment program.
//!
//! For request `i` and stage `s`, the binary `x[i,s]` is 1 iff `s` runs
//! for `i`:
//!
//! ```text
//! maximise    Σ priority[i] · weight[s] · x[i,s]
//! subject to  Σ req[s][r] · x[i,s] ≤ available[r]     each resource r in the snapshot
//!             x[i,detail]   ≤ x[i,template]           each request i
//!             x[i,optimize] ≤ x[i,detail]             each request i
//!             x[i,template] ≥ 1                       each i, only with `require_template`
//! ```
//!
//! Resources absent from the snapshot get no constraint at all, so their
//! requirement terms are effectively free.

use crate::{SchedulerConfig, ScheduleError};
use lp_solver::{ConstraintId, Problem, Sense, Solution, SolveStatus, VarId};
use resource_monitor::{Resource, ResourceSnapshot};
use stage_model::{PipelineState, ResourceLevel, ResourceVector, Stage, StageTable};
use std::collections::BTreeMap;

/// What a model constraint encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum ConstraintRole {
    Resource(Resource),
    Precedence { request: usize, stage: Stage },
    RequireTemplate { request: usize },
}

/// Maps solver variables and constraints back to requests and stages.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelIndex {
    pub level: ResourceLevel,
    pub priorities: Vec<f64>,
    /// `vars[i][s.index()]` is `x[i,s]`.
    pub vars: Vec<[VarId; 3]>,
    /// Role of each constraint, by constraint index.
    pub roles: Vec<ConstraintRole>,
    /// Scaled per-stage requirements used for the resource rows.
    pub requirements: StageTable<ResourceVector>,
    pub quality_weights: StageTable<f64>,
    /// Available fraction per constrained resource.
    pub available: BTreeMap<Resource, f64>,
}

impl ModelIndex {
    pub fn num_requests(&self) -> usize {
        self.vars.len()
    }

    pub fn var(&self, request: usize, stage: Stage) -> Option<VarId> {
        self.vars.get(request).map(|v| v[stage.index()])
    }

    /// `(request, stage)` of a variable.
    pub fn locate(&self, var: VarId) -> Option<(usize, Stage)> {
        let request = var.0 / Stage::ALL.len();
        let stage = Stage::ALL[var.0 % Stage::ALL.len()];
        (self.vars.get(request)?[stage.index()] == var).then_some((request, stage))
    }

    pub fn role(&self, constraint: ConstraintId) -> Option<ConstraintRole> {
        self.roles.get(constraint.0).copied()
    }

    /// Constraint ids of the resource rows.
    pub fn resource_constraints(&self) -> impl Iterator<Item = (Resource, ConstraintId)> + '_ {
        self.roles.iter().enumerate().filter_map(|(i, role)| match role {
            ConstraintRole::Resource(r) => Some((*r, ConstraintId(i))),
            _ => None,
        })
    }
}

/// A built, not yet solved, scheduling program.
#[derive(Debug, Clone)]
pub struct ScheduleModel {
    pub problem: Problem,
    pub index: ModelIndex,
}

impl ScheduleModel {
    /// Formulates the program for `requests` against `snapshot`.
    ///
    /// # Errors
    /// [`ScheduleError::ModelConstruction`] if a priority, weight or
    /// requirement is not a usable number.
    pub fn build(
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
        config: &SchedulerConfig,
    ) -> Result<Self, ScheduleError> {
        let level = config.bands.classify(snapshot);
        let requirements = config.cost.requirements_for(level);
        let weights = config.cost.quality_weights;

        for (stage, w) in weights.iter() {
            if !w.is_finite() || *w < 0.0 {
                return Err(ScheduleError::ModelConstruction(format!(
                    "quality weight for '{stage}' is {w}"
                )));
            }
        }
        for (stage, req) in requirements.iter() {
            if !req.is_valid_fraction() {
                return Err(ScheduleError::ModelConstruction(format!(
                    "requirement vector for '{stage}' is not a fraction: {req:?}"
                )));
            }
        }

        let mut problem = Problem::new(format!("stage-schedule-{}", requests.len()), Sense::Maximize);
        let mut vars = Vec::with_capacity(requests.len());
        let mut priorities = Vec::with_capacity(requests.len());

        for (i, request) in requests.iter().enumerate() {
            let p = request.priority;
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(ScheduleError::ModelConstruction(format!(
                    "request {i} ('{}') has priority {p} outside [0, 1]",
                    request.target_name
                )));
            }
            priorities.push(p);
            let ids = Stage::ALL.map(|s| problem.add_binary(format!("x_{i}_{s}"), p * weights.get(s)));
            vars.push(ids);
        }

        let mut roles = Vec::new();
        let mut available = BTreeMap::new();

        for resource in Resource::SCHEDULABLE {
            let Some(capacity) = snapshot.fraction(resource) else {
                continue;
            };
            let terms: Vec<(VarId, f64)> = vars
                .iter()
                .flat_map(|ids| {
                    Stage::ALL
                        .iter()
                        .map(|s| (ids[s.index()], requirements.get(*s).get(resource)))
                        .collect::<Vec<_>>()
                })
                .filter(|(_, coeff)| *coeff > 0.0)
                .collect();
            if terms.is_empty() {
                continue;
            }
            problem.add_constraint(format!("resource_{resource}"), terms, None, Some(capacity));
            roles.push(ConstraintRole::Resource(resource));
            available.insert(resource, capacity);
        }

        for (i, ids) in vars.iter().enumerate() {
            for stage in [Stage::Detail, Stage::Optimize] {
                let Some(prev) = stage.predecessor() else {
                    continue;
                };
                problem.add_constraint(
                    format!("precedence_{i}_{stage}"),
                    vec![(ids[stage.index()], 1.0), (ids[prev.index()], -1.0)],
                    None,
                    Some(0.0),
                );
                roles.push(ConstraintRole::Precedence { request: i, stage });
            }
            if config.require_template {
                problem.add_constraint(
                    format!("require_template_{i}"),
                    vec![(ids[Stage::Template.index()], 1.0)],
                    Some(1.0),
                    None,
                );
                roles.push(ConstraintRole::RequireTemplate { request: i });
            }
        }

        problem
            .validate()
            .map_err(|e| ScheduleError::ModelConstruction(e.to_string()))?;

        Ok(Self {
            problem,
            index: ModelIndex {
                level,
                priorities,
                vars,
                roles,
                requirements,
                quality_weights: weights,
                available,
            },
        })
    }

    pub fn num_requests(&self) -> usize {
        self.index.num_requests()
    }
}

/// A model together with the solver's answer.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    pub model: ScheduleModel,
    pub solution: Solution,
    pub solver_name: String,
    pub solve_time_ms: f64,
}

impl SolvedModel {
    pub fn status(&self) -> SolveStatus {
        self.solution.status
    }

    /// Stage prefix chosen for each request, in input order.
    ///
    /// Stages are read in canonical order and cut at the first unselected
    /// stage. Empty when the solve produced no values.
    pub fn stages_per_request(&self) -> Vec<Vec<Stage>> {
        self.model
            .index
            .vars
            .iter()
            .map(|ids| {
                Stage::ALL
                    .iter()
                    .copied()
                    .take_while(|s| {
                        self.solution
                            .value(ids[s.index()])
                            .is_some_and(|v| v > 0.5)
                    })
                    .collect()
            })
            .collect()
    }
}
