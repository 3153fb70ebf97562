// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Depth-first branch-and-bound over simplex relaxations.
//!
//! # Algorithm
//! 1. Solve the LP relaxation of the current node.
//! 2. Prune if infeasible or if its bound cannot beat the incumbent.
//! 3. If every integer variable is integral, record a new incumbent.
//! 4. Otherwise branch on the most fractional integer variable, exploring
//!    the side nearest its relaxed value first.
//!
//! The search stops early at [`SolverLimits`]; the best incumbent found so
//! far is then reported as [`SolveStatus::Feasible`].

use crate::simplex::{self, LpResult, LpStatus};
use crate::{Problem, Solution, SolveStatus, Solver, SolverError};
use std::time::{Duration, Instant};

const INTEGRALITY_EPS: f64 = 1e-6;
const BOUND_EPS: f64 = 1e-9;

/// Internal work budget of one solve.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SolverLimits {
    /// Maximum branch-and-bound nodes.
    pub max_nodes: u64,
    /// Maximum simplex pivots across all nodes.
    pub max_iterations: u64,
    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: u64,
}

impl Default for SolverLimits {
    fn default() -> Self {
        Self {
            max_nodes: 10_000,
            max_iterations: 200_000,
            time_limit_ms: 2_000,
        }
    }
}

impl SolverLimits {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

/// Exact mixed-integer solver.
#[derive(Debug, Clone, Default)]
pub struct BranchAndBound {
    limits: SolverLimits,
}

struct Node {
    lower: Vec<f64>,
    upper: Vec<Option<f64>>,
}

impl BranchAndBound {
    pub fn new(limits: SolverLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SolverLimits {
        &self.limits
    }

    fn root(problem: &Problem) -> Node {
        let mut lower = Vec::with_capacity(problem.num_variables());
        let mut upper = Vec::with_capacity(problem.num_variables());
        for v in &problem.variables {
            if v.integer {
                lower.push((v.lower - INTEGRALITY_EPS).ceil());
                upper.push(v.upper.map(|u| (u + INTEGRALITY_EPS).floor()));
            } else {
                lower.push(v.lower);
                upper.push(v.upper);
            }
        }
        Node { lower, upper }
    }
}

/// Integer variable whose relaxed value is furthest from integral.
fn most_fractional(problem: &Problem, values: &[f64]) -> Option<(usize, f64)> {
    problem
        .variables
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(_, (var, _))| var.integer)
        .map(|(j, (_, &x))| (j, x, (x - x.floor()).min(x.ceil() - x)))
        .filter(|(_, _, frac)| *frac > INTEGRALITY_EPS)
        .max_by(|a, b| a.2.total_cmp(&b.2).then(b.0.cmp(&a.0)))
        .map(|(j, x, _)| (j, x))
}

impl Solver for BranchAndBound {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn solve(&self, problem: &Problem) -> Result<Solution, SolverError> {
        problem.validate()?;

        let sign = problem.sense.sign();
        let start = Instant::now();
        let mut stack = vec![Self::root(problem)];
        let mut incumbent: Option<(f64, LpResult)> = None;
        let mut nodes = 0u64;
        let mut iterations = 0u64;
        let mut limit_hit = false;
        let mut unbounded = false;

        while let Some(node) = stack.pop() {
            if nodes >= self.limits.max_nodes
                || iterations >= self.limits.max_iterations
                || start.elapsed() >= self.limits.time_limit()
            {
                limit_hit = true;
                break;
            }
            nodes += 1;

            let budget = self.limits.max_iterations - iterations;
            let lp = simplex::solve_relaxation(problem, &node.lower, &node.upper, budget);
            iterations += lp.iterations;

            match lp.status {
                LpStatus::Optimal => {}
                LpStatus::Infeasible => continue,
                LpStatus::Unbounded => {
                    unbounded = true;
                    break;
                }
                LpStatus::IterationLimit => {
                    limit_hit = true;
                    break;
                }
            }

            let bound = sign * lp.objective;
            if incumbent
                .as_ref()
                .is_some_and(|(best, _)| bound <= best + BOUND_EPS)
            {
                continue;
            }

            match most_fractional(problem, &lp.values) {
                None => {
                    tracing::debug!(
                        "'{}': incumbent {:.6} at node {nodes}",
                        problem.name,
                        lp.objective
                    );
                    incumbent = Some((bound, lp));
                }
                Some((j, x)) => {
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                    };
                    down.upper[j] = Some(x.floor());
                    let mut up = node;
                    up.lower[j] = x.ceil();

                    // Last pushed is explored first.
                    if x - x.floor() >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        if unbounded {
            return Ok(Solution::empty(SolveStatus::Unbounded, nodes, iterations));
        }

        let solution = match incumbent {
            Some((_, lp)) => {
                let values: Vec<f64> = problem
                    .variables
                    .iter()
                    .zip(&lp.values)
                    .map(|(v, &x)| if v.integer { x.round() } else { x })
                    .collect();
                Solution {
                    status: if limit_hit {
                        SolveStatus::Feasible
                    } else {
                        SolveStatus::Optimal
                    },
                    objective: Some(problem.objective_value(&values)),
                    values,
                    duals: lp.duals,
                    reduced_costs: lp.reduced_costs,
                    basis: lp.basis,
                    nodes_explored: nodes,
                    iterations,
                }
            }
            None if limit_hit => Solution::empty(SolveStatus::NotSolved, nodes, iterations),
            None => Solution::empty(SolveStatus::Infeasible, nodes, iterations),
        };

        tracing::debug!(
            "'{}' solved in {:.1} ms: {}",
            problem.name,
            start.elapsed().as_secs_f64() * 1000.0,
            solution.summary()
        );
        Ok(solution)
    }
}
