// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sensitivity report construction.
//!
//! Dual values and reduced costs come from the LP relaxation that produced
//! the reported integer solution, so they describe the final
//! branch-and-bound node rather than the integer program as a whole.

use super::{sigmoid_normalize, AnalysisThresholds, ParameterChange, WhatIfResult};
use crate::model::{ConstraintRole, SolvedModel};
use crate::AnalysisError;
use lp_solver::{BasisStatus, ConstraintId, Sense, SolveStatus, Solver, VarId};
use resource_monitor::Resource;
use stage_model::{Stage, StageTable};

/// Allowable interval for an objective coefficient. `None` on a side means
/// unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CoefficientRange {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl CoefficientRange {
    pub fn contains(&self, value: f64) -> bool {
        self.lower.map_or(true, |l| value >= l) && self.upper.map_or(true, |u| value <= u)
    }
}

/// Per-variable view of the solution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariableAnalysis {
    pub name: String,
    pub request: usize,
    pub stage: Stage,
    pub value: f64,
    pub objective_coefficient: f64,
    pub reduced_cost: Option<f64>,
    pub basis: Option<BasisStatus>,
    /// Range over which the coefficient can move without changing the
    /// basis. `None` when unavailable (basic or fixed variables, or no
    /// basis information).
    pub objective_range: Option<CoefficientRange>,
}

/// Per-constraint view of the solution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConstraintAnalysis {
    pub name: String,
    pub role: ConstraintRole,
    pub dual: Option<f64>,
    pub activity: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// Distance to the nearest bound. `None` for a free row.
    pub slack: Option<f64>,
    pub binding: bool,
}

/// Share of the objective contributed by one stage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageImpact {
    pub stage: Stage,
    /// Σ priority · weight over requests that run this stage.
    pub contribution: f64,
    /// `contribution / objective`, 0 when the objective is 0.
    pub share: f64,
    /// Bounded impact score in `[0, 1]`; 0.5 at an even three-way split.
    pub score: f64,
    /// Number of requests that run this stage.
    pub scheduled: usize,
}

/// Pressure on one resource constraint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceSensitivity {
    pub resource: Resource,
    pub available: f64,
    pub used: f64,
    /// `used / available`, 0 when nothing is available.
    pub utilization: f64,
    pub dual: f64,
    pub binding: bool,
    /// 0 for slack resources; for binding ones the dual magnitude relative
    /// to the largest binding dual, or 1 when no binding row carries a dual.
    pub score: f64,
}

/// How close the solution sits to changing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StabilityReport {
    pub binding_resources: usize,
    pub total_resources: usize,
    pub binding_constraints: usize,
    /// Nonbasic variables with zero reduced cost: an alternative optimum
    /// exists along each of them.
    pub alternative_optima: usize,
    /// `1 - binding_resources / total_resources`, 1 with no resource rows.
    pub score: f64,
}

/// Full analysis of one solve.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SensitivityReport {
    pub model: String,
    pub solver: String,
    pub status: SolveStatus,
    pub objective: f64,
    pub variables: Vec<VariableAnalysis>,
    pub constraints: Vec<ConstraintAnalysis>,
    pub stage_impacts: Vec<StageImpact>,
    pub resources: Vec<ResourceSensitivity>,
    pub stability: StabilityReport,
}

impl SensitivityReport {
    pub fn binding_constraints(&self) -> impl Iterator<Item = &ConstraintAnalysis> {
        self.constraints.iter().filter(|c| c.binding)
    }

    pub fn resource(&self, resource: Resource) -> Option<&ResourceSensitivity> {
        self.resources.iter().find(|r| r.resource == resource)
    }

    pub fn stage_impact(&self, stage: Stage) -> Option<&StageImpact> {
        self.stage_impacts.iter().find(|s| s.stage == stage)
    }

    /// Returns a human-readable summary of the report.
    ///
    /// # Example output
    /// ```text
    /// Sensitivity of stage-schedule-1 (branch-and-bound, optimal, objective 0.8000)
    ///   stability 0.50 (1/2 resources binding, 0 alternative optima)
    ///   resource cpu     used 0.400/1.000  dual 0.0000  score 0.00
    ///   resource gpu     used 0.500/0.500  dual 0.6000  score 1.00  binding
    ///   stage template   share 62.5%  score 0.95
    /// ```
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Sensitivity of {} ({}, {}, objective {:.4})\n  stability {:.2} ({}/{} resources binding, {} alternative optima)",
            self.model,
            self.solver,
            self.status,
            self.objective,
            self.stability.score,
            self.stability.binding_resources,
            self.stability.total_resources,
            self.stability.alternative_optima,
        );
        for r in &self.resources {
            s.push_str(&format!(
                "\n  resource {:<7} used {:.3}/{:.3}  dual {:.4}  score {:.2}{}",
                r.resource.as_str(),
                r.used,
                r.available,
                r.dual,
                r.score,
                if r.binding { "  binding" } else { "" }
            ));
        }
        for st in &self.stage_impacts {
            s.push_str(&format!(
                "\n  stage {:<10} share {:.1}%  score {:.2}",
                st.stage.as_str(),
                st.share * 100.0,
                st.score
            ));
        }
        s
    }
}

/// Reads sensitivity information out of solved scheduling models.
#[derive(Debug, Clone, Default)]
pub struct SensitivityAnalyzer {
    thresholds: AnalysisThresholds,
}

impl SensitivityAnalyzer {
    pub fn new(thresholds: AnalysisThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AnalysisThresholds {
        &self.thresholds
    }

    /// Analyses a solved model.
    ///
    /// # Errors
    /// [`AnalysisError::NotSolved`] unless the solve ended optimal or
    /// feasible.
    pub fn analyze_model(&self, solved: &SolvedModel) -> Result<SensitivityReport, AnalysisError> {
        let problem = &solved.model.problem;
        let index = &solved.model.index;
        let solution = &solved.solution;
        let status = solution.status;
        if !status.has_solution() {
            return Err(AnalysisError::NotSolved {
                model: problem.name.clone(),
                status,
            });
        }

        let values = &solution.values;
        let tol = self.thresholds.binding_tolerance;

        let mut variables = Vec::with_capacity(problem.num_variables());
        for (j, var) in problem.variables.iter().enumerate() {
            let id = VarId(j);
            let Some((request, stage)) = index.locate(id) else {
                continue;
            };
            let reduced_cost = solution.reduced_cost(id);
            let basis = solution.basis_status(id);
            let objective_range = match (basis, reduced_cost) {
                (Some(b), Some(rc)) => objective_range(problem.sense, var.objective, rc, b),
                _ => None,
            };
            variables.push(VariableAnalysis {
                name: var.name.clone(),
                request,
                stage,
                value: solution.value(id).unwrap_or(0.0),
                objective_coefficient: var.objective,
                reduced_cost,
                basis,
                objective_range,
            });
        }

        let mut constraints = Vec::with_capacity(problem.num_constraints());
        for (k, row) in problem.constraints.iter().enumerate() {
            let id = ConstraintId(k);
            let Some(role) = index.role(id) else {
                continue;
            };
            let activity = problem.activity(id, values).map_err(AnalysisError::Solver)?;
            let slack = match (row.lower, row.upper) {
                (Some(l), Some(u)) => Some((u - activity).min(activity - l)),
                (None, Some(u)) => Some(u - activity),
                (Some(l), None) => Some(activity - l),
                (None, None) => None,
            };
            constraints.push(ConstraintAnalysis {
                name: row.name.clone(),
                role,
                dual: solution.dual(id),
                activity,
                lower: row.lower,
                upper: row.upper,
                slack,
                binding: slack.is_some_and(|s| s.abs() <= tol),
            });
        }

        let resources = resource_sensitivity(&constraints, index.available.iter());
        let stage_impacts = self.stage_impacts(solved);

        let binding_resources = resources.iter().filter(|r| r.binding).count();
        let total_resources = resources.len();
        let alternative_optima = variables
            .iter()
            .filter(|v| {
                matches!(v.basis, Some(BasisStatus::AtLower | BasisStatus::AtUpper))
                    && v.reduced_cost.is_some_and(|rc| rc.abs() <= tol)
            })
            .count();
        let stability = StabilityReport {
            binding_resources,
            total_resources,
            binding_constraints: constraints.iter().filter(|c| c.binding).count(),
            alternative_optima,
            score: if total_resources == 0 {
                1.0
            } else {
                1.0 - binding_resources as f64 / total_resources as f64
            },
        };

        let report = SensitivityReport {
            model: problem.name.clone(),
            solver: solved.solver_name.clone(),
            status,
            objective: solution
                .objective
                .unwrap_or_else(|| problem.objective_value(values)),
            variables,
            constraints,
            stage_impacts,
            resources,
            stability,
        };
        tracing::debug!(
            "analysed {}: {} binding constraints, stability {:.2}",
            report.model,
            report.stability.binding_constraints,
            report.stability.score
        );
        Ok(report)
    }

    /// Rule-based advice for a report, using this analyzer's thresholds.
    pub fn generate_recommendations(&self, report: &SensitivityReport) -> Vec<String> {
        super::generate_recommendations(report, &self.thresholds)
    }

    /// Re-solves a perturbed copy of `solved`. See [`super::what_if_scenario`].
    pub fn what_if_scenario(
        &self,
        solved: &SolvedModel,
        changes: &[ParameterChange],
        solver: &dyn Solver,
    ) -> Result<WhatIfResult, AnalysisError> {
        super::what_if_scenario(solved, changes, solver)
    }

    fn stage_impacts(&self, solved: &SolvedModel) -> Vec<StageImpact> {
        let index = &solved.model.index;
        let mut contribution = StageTable {
            template: 0.0,
            detail: 0.0,
            optimize: 0.0,
        };
        let mut scheduled = StageTable {
            template: 0usize,
            detail: 0,
            optimize: 0,
        };
        for (request, stages) in solved.stages_per_request().iter().enumerate() {
            let priority = index.priorities.get(request).copied().unwrap_or(0.0);
            for stage in stages {
                *contribution.get_mut(*stage) += priority * index.quality_weights.get(*stage);
                *scheduled.get_mut(*stage) += 1;
            }
        }
        let total: f64 = contribution.iter().map(|(_, c)| *c).sum();
        let even = 1.0 / Stage::ALL.len() as f64;

        Stage::ALL
            .iter()
            .map(|&stage| {
                let c = *contribution.get(stage);
                let share = if total > 0.0 { c / total } else { 0.0 };
                StageImpact {
                    stage,
                    contribution: c,
                    share,
                    score: sigmoid_normalize(share - even, self.thresholds.sigmoid_scale),
                    scheduled: *scheduled.get(stage),
                }
            })
            .collect()
    }
}

/// Objective ranging for a nonbasic variable.
///
/// Moving the coefficient towards making the variable attractive keeps the
/// basis until it has absorbed the reduced cost; moving it the other way
/// never changes the basis.
fn objective_range(sense: Sense, c: f64, rc: f64, basis: BasisStatus) -> Option<CoefficientRange> {
    let edge = c - rc;
    let at_lower = match basis {
        BasisStatus::AtLower => true,
        BasisStatus::AtUpper => false,
        BasisStatus::Basic | BasisStatus::Fixed => return None,
    };
    // Maximising at the lower bound: raising c past c - rc brings it in.
    let capped_above = matches!(sense, Sense::Maximize) == at_lower;
    Some(if capped_above {
        CoefficientRange {
            lower: None,
            upper: Some(edge),
        }
    } else {
        CoefficientRange {
            lower: Some(edge),
            upper: None,
        }
    })
}

fn resource_sensitivity<'a>(
    constraints: &[ConstraintAnalysis],
    available: impl Iterator<Item = (&'a Resource, &'a f64)>,
) -> Vec<ResourceSensitivity> {
    let mut out: Vec<ResourceSensitivity> = available
        .filter_map(|(resource, capacity)| {
            let row = constraints
                .iter()
                .find(|c| c.role == ConstraintRole::Resource(*resource))?;
            Some(ResourceSensitivity {
                resource: *resource,
                available: *capacity,
                used: row.activity,
                utilization: if *capacity > 0.0 {
                    row.activity / capacity
                } else {
                    0.0
                },
                dual: row.dual.unwrap_or(0.0),
                binding: row.binding,
                score: 0.0,
            })
        })
        .collect();

    let max_dual = out
        .iter()
        .filter(|r| r.binding)
        .map(|r| r.dual.abs())
        .fold(0.0, f64::max);
    for r in out.iter_mut().filter(|r| r.binding) {
        r.score = if max_dual > 0.0 {
            r.dual.abs() / max_dual
        } else {
            1.0
        };
    }
    out
}
