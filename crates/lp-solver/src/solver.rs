// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The solver seam.

use crate::{Problem, Solution, SolverError};

/// A backend that can solve a [`Problem`].
///
/// Implementations must be stateless between calls so one instance can be
/// shared by concurrent schedulers and by what-if re-solves.
pub trait Solver: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Solves `problem`.
    ///
    /// # Errors
    /// Returns [`SolverError`] only if the problem cannot be processed at
    /// all. Infeasibility and limits are reported via the solution status.
    fn solve(&self, problem: &Problem) -> Result<Solution, SolverError>;
}
