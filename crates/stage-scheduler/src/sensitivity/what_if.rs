// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! What-if scenarios: re-solving a perturbed copy of a solved model.
//!
//! The copy is a plain clone of the [`Problem`](lp_solver::Problem) data;
//! the original model and its solution are never touched.
//!
//! # Assignment syntax
//! ```text
//! x_0_detail=0.9                  objective coefficient of a variable
//! x_0_detail.bounds=1             fix a variable (lower = upper = 1)
//! resource_gpu=0.8                upper bound of a constraint
//! resource_gpu.upper=none         drop the upper bound
//! require_template_0.lower=0      lower bound of a constraint
//! resource_gpu:x_1_detail=0.25    coefficient of a variable in a constraint
//! ```

use crate::model::{ScheduleModel, SolvedModel};
use crate::AnalysisError;
use lp_solver::{ConstraintId, Problem, SolveStatus, Solver, VarId};
use stage_model::Stage;
use std::time::Instant;

/// One perturbation applied to the scenario copy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterChange {
    ObjectiveCoefficient {
        variable: String,
        value: f64,
    },
    ConstraintUpperBound {
        constraint: String,
        value: Option<f64>,
    },
    ConstraintLowerBound {
        constraint: String,
        value: Option<f64>,
    },
    VariableBounds {
        variable: String,
        lower: f64,
        upper: Option<f64>,
    },
    Coefficient {
        constraint: String,
        variable: String,
        value: f64,
    },
}

impl ParameterChange {
    fn apply(&self, problem: &mut Problem) -> Result<(), AnalysisError> {
        match self {
            Self::ObjectiveCoefficient { variable, value } => {
                let var = find_variable(problem, variable)?;
                problem.set_objective(var, *value)?;
            }
            Self::ConstraintUpperBound { constraint, value } => {
                let id = find_constraint(problem, constraint)?;
                let lower = problem.constraints[id.0].lower;
                problem.set_constraint_bounds(id, lower, *value)?;
            }
            Self::ConstraintLowerBound { constraint, value } => {
                let id = find_constraint(problem, constraint)?;
                let upper = problem.constraints[id.0].upper;
                problem.set_constraint_bounds(id, *value, upper)?;
            }
            Self::VariableBounds {
                variable,
                lower,
                upper,
            } => {
                let var = find_variable(problem, variable)?;
                problem.set_variable_bounds(var, *lower, *upper)?;
            }
            Self::Coefficient {
                constraint,
                variable,
                value,
            } => {
                let id = find_constraint(problem, constraint)?;
                let var = find_variable(problem, variable)?;
                problem.set_coefficient(id, var, *value)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for ParameterChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |v: &Option<f64>| v.map_or("none".to_string(), |x| x.to_string());
        match self {
            Self::ObjectiveCoefficient { variable, value } => write!(f, "{variable}={value}"),
            Self::ConstraintUpperBound { constraint, value } => {
                write!(f, "{constraint}.upper={}", opt(value))
            }
            Self::ConstraintLowerBound { constraint, value } => {
                write!(f, "{constraint}.lower={}", opt(value))
            }
            Self::VariableBounds {
                variable,
                lower,
                upper,
            } => write!(f, "{variable}.bounds={lower}..{}", opt(upper)),
            Self::Coefficient {
                constraint,
                variable,
                value,
            } => write!(f, "{constraint}:{variable}={value}"),
        }
    }
}

fn find_variable(problem: &Problem, name: &str) -> Result<VarId, AnalysisError> {
    problem
        .variable_by_name(name)
        .ok_or_else(|| AnalysisError::UnknownVariable(name.to_string()))
}

fn find_constraint(problem: &Problem, name: &str) -> Result<ConstraintId, AnalysisError> {
    problem
        .constraint_by_name(name)
        .ok_or_else(|| AnalysisError::UnknownConstraint(name.to_string()))
}

/// Parses one `NAME=VALUE` assignment against `problem`'s names.
///
/// See the module docs for the accepted forms.
pub fn parse_assignment(problem: &Problem, input: &str) -> Result<ParameterChange, AnalysisError> {
    let invalid = |detail: &str| AnalysisError::InvalidChange {
        input: input.to_string(),
        detail: detail.to_string(),
    };
    let (target, raw) = input
        .split_once('=')
        .ok_or_else(|| invalid("expected NAME=VALUE"))?;
    let (target, raw) = (target.trim(), raw.trim());
    let bound = match raw.to_lowercase().as_str() {
        "none" | "inf" => None,
        other => Some(other.parse::<f64>().map_err(|_| invalid("value is not a number"))?),
    };
    let number = || bound.ok_or_else(|| invalid("value must be a number"));

    let change = match target.split_once(':').or_else(|| target.rsplit_once('.')) {
        Some((constraint, variable)) if target.contains(':') => ParameterChange::Coefficient {
            constraint: constraint.to_string(),
            variable: variable.to_string(),
            value: number()?,
        },
        Some((name, "upper")) => ParameterChange::ConstraintUpperBound {
            constraint: name.to_string(),
            value: bound,
        },
        Some((name, "lower")) => ParameterChange::ConstraintLowerBound {
            constraint: name.to_string(),
            value: bound,
        },
        Some((name, "bounds")) => ParameterChange::VariableBounds {
            variable: name.to_string(),
            lower: number()?,
            upper: bound,
        },
        Some(_) => return Err(invalid("field must be one of upper, lower, bounds")),
        None if problem.constraint_by_name(target).is_some() => ParameterChange::ConstraintUpperBound {
            constraint: target.to_string(),
            value: bound,
        },
        None => ParameterChange::ObjectiveCoefficient {
            variable: target.to_string(),
            value: number()?,
        },
    };

    // Resolve names now so a typo fails before any solve.
    change.apply(&mut problem.clone())?;
    Ok(change)
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WhatIfResult {
    pub changes: Vec<ParameterChange>,
    pub status: SolveStatus,
    pub original_objective: f64,
    /// `None` when the scenario has no feasible solution.
    pub scenario_objective: Option<f64>,
    /// `scenario - original`, when both exist.
    pub objective_delta: Option<f64>,
    /// Stage prefix per request under the scenario.
    pub stages: Vec<Vec<Stage>>,
    /// Requests whose stage list differs from the original solve.
    pub changed_requests: Vec<usize>,
    pub solve_time_ms: f64,
}

impl WhatIfResult {
    /// Returns a one-line summary.
    pub fn summary(&self) -> String {
        let changes = self
            .changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match self.objective_delta {
            Some(delta) => format!(
                "what-if [{changes}]: {} objective {:.4} → {:.4} (Δ {delta:+.4}), {} request(s) changed",
                self.status,
                self.original_objective,
                self.scenario_objective.unwrap_or(0.0),
                self.changed_requests.len()
            ),
            None => format!("what-if [{changes}]: {} (no solution)", self.status),
        }
    }
}

/// Clones `solved`, applies `changes` to the copy and re-solves it with
/// `solver`.
///
/// # Errors
/// - [`AnalysisError::NotSolved`] if the original has no solution to compare to.
/// - [`AnalysisError::Clone`] if the copy does not mirror the original.
/// - [`AnalysisError::UnknownVariable`] / [`AnalysisError::UnknownConstraint`]
///   for changes naming entities the model does not have.
/// - [`AnalysisError::Solver`] if the scenario cannot be solved at all.
///
/// An infeasible scenario is a result, not an error.
pub fn what_if_scenario(
    solved: &SolvedModel,
    changes: &[ParameterChange],
    solver: &dyn Solver,
) -> Result<WhatIfResult, AnalysisError> {
    let original = &solved.model.problem;
    let original_objective = match solved.solution.objective {
        Some(obj) if solved.status().has_solution() => obj,
        _ => {
            return Err(AnalysisError::NotSolved {
                model: original.name.clone(),
                status: solved.status(),
            })
        }
    };

    let mut scenario: ScheduleModel = solved.model.clone();
    if !scenario.problem.same_structure(original) {
        return Err(AnalysisError::Clone {
            model: original.name.clone(),
            detail: "copy differs in variables or constraints".into(),
        });
    }
    scenario.problem.name = format!("{}-what-if", original.name);

    for change in changes {
        change.apply(&mut scenario.problem)?;
    }
    scenario
        .problem
        .validate()
        .map_err(|e| AnalysisError::InvalidChange {
            input: changes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            detail: e.to_string(),
        })?;

    let start = Instant::now();
    let solution = solver.solve(&scenario.problem)?;
    let solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let result_model = SolvedModel {
        model: scenario,
        solution,
        solver_name: solver.name().to_string(),
        solve_time_ms,
    };
    let status = result_model.status();
    let scenario_objective = if status.has_solution() {
        result_model.solution.objective
    } else {
        None
    };
    let stages = if status.has_solution() {
        result_model.stages_per_request()
    } else {
        Vec::new()
    };
    let baseline = solved.stages_per_request();
    let changed_requests = if stages.is_empty() {
        Vec::new()
    } else {
        baseline
            .iter()
            .zip(&stages)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect()
    };

    let result = WhatIfResult {
        changes: changes.to_vec(),
        status,
        original_objective,
        scenario_objective,
        objective_delta: scenario_objective.map(|obj| obj - original_objective),
        stages,
        changed_requests,
        solve_time_ms,
    };
    tracing::debug!("{}", result.summary());
    Ok(result)
}
