// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Solver output.

use crate::{ConstraintId, VarId};
use std::fmt;

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// A valid solution was found but the search stopped at a limit.
    Feasible,
    /// No assignment satisfies the constraints.
    Infeasible,
    /// The objective can grow without bound.
    Unbounded,
    /// The search stopped at a limit before finding any solution.
    NotSolved,
}

impl SolveStatus {
    /// `true` for [`SolveStatus::Optimal`] and [`SolveStatus::Feasible`].
    pub fn has_solution(&self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "OPTIMAL",
            Self::Feasible => "FEASIBLE",
            Self::Infeasible => "INFEASIBLE",
            Self::Unbounded => "UNBOUNDED",
            Self::NotSolved => "NOT_SOLVED",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a variable sits relative to its bounds in the final LP basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisStatus {
    Basic,
    AtLower,
    AtUpper,
    /// Lower and upper bound coincide in the problem definition.
    Fixed,
}

/// Result of [`crate::Solver::solve`].
///
/// `values`, `duals`, `reduced_costs` and `basis` are empty unless
/// [`SolveStatus::has_solution`] holds. Dual and reduced-cost information
/// is taken from the LP relaxation that produced the reported solution
/// and uses the problem's own sense: a dual is the change in objective
/// per unit increase of the constraint's active bound.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Solution {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub values: Vec<f64>,
    pub duals: Vec<f64>,
    pub reduced_costs: Vec<f64>,
    pub basis: Vec<BasisStatus>,
    pub nodes_explored: u64,
    pub iterations: u64,
}

impl Solution {
    /// A solution carrying only a status, for failed solves.
    pub fn empty(status: SolveStatus, nodes_explored: u64, iterations: u64) -> Self {
        Self {
            status,
            objective: None,
            values: Vec::new(),
            duals: Vec::new(),
            reduced_costs: Vec::new(),
            basis: Vec::new(),
            nodes_explored,
            iterations,
        }
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.0).copied()
    }

    pub fn dual(&self, constraint: ConstraintId) -> Option<f64> {
        self.duals.get(constraint.0).copied()
    }

    pub fn reduced_cost(&self, var: VarId) -> Option<f64> {
        self.reduced_costs.get(var.0).copied()
    }

    pub fn basis_status(&self, var: VarId) -> Option<BasisStatus> {
        self.basis.get(var.0).copied()
    }

    /// Returns a one-line summary.
    pub fn summary(&self) -> String {
        match self.objective {
            Some(obj) => format!(
                "{} objective={obj:.6} nodes={} iterations={}",
                self.status, self.nodes_explored, self.iterations
            ),
            None => format!(
                "{} nodes={} iterations={}",
                self.status, self.nodes_explored, self.iterations
            ),
        }
    }
}
