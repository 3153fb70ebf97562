// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # lp-solver
//!
//! Linear and mixed-integer programming for the stage scheduler.
//!
//! This crate provides:
//! - [`Problem`]: a plain-data, serialisable model (variables, linear
//!   constraints, objective) that can be cloned and perturbed freely.
//! - [`Solver`]: the backend trait the scheduler depends on.
//! - [`BranchAndBound`]: depth-first branch-and-bound over a dense
//!   two-phase simplex, bounded by [`SolverLimits`].
//! - [`Solution`]: status, values, and post-solve information (duals,
//!   reduced costs, basis status) for sensitivity analysis.
//!
//! # Example
//! ```
//! use lp_solver::{BranchAndBound, Problem, Sense, SolveStatus, Solver};
//!
//! let mut p = Problem::new("pick", Sense::Maximize);
//! let a = p.add_binary("a", 3.0);
//! let b = p.add_binary("b", 2.0);
//! p.add_constraint("one", vec![(a, 1.0), (b, 1.0)], None, Some(1.0));
//!
//! let s = BranchAndBound::default().solve(&p).unwrap();
//! assert_eq!(s.status, SolveStatus::Optimal);
//! assert_eq!(s.value(a), Some(1.0));
//! ```

mod branch;
mod error;
mod problem;
mod simplex;
mod solution;
mod solver;

pub use branch::{BranchAndBound, SolverLimits};
pub use error::SolverError;
pub use problem::{Constraint, ConstraintId, Problem, Sense, VarId, Variable};
pub use solution::{BasisStatus, Solution, SolveStatus};
pub use solver::Solver;
