// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for problem construction and solving.

/// Errors that prevent a problem from being solved at all.
///
/// An infeasible or unbounded problem is *not* an error: it is reported
/// through [`crate::SolveStatus`] on a successful [`crate::Solution`].
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// A variable or constraint definition is malformed.
    #[error("invalid problem '{problem}': {detail}")]
    InvalidProblem { problem: String, detail: String },

    /// A term or lookup referenced a variable that does not exist.
    #[error("unknown variable index {0}")]
    UnknownVariable(usize),

    /// A lookup referenced a constraint that does not exist.
    #[error("unknown constraint index {0}")]
    UnknownConstraint(usize),

    /// The solver backend could not be created.
    #[error("solver '{0}' is not available")]
    Unavailable(String),
}
