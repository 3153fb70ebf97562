// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for scheduling and sensitivity analysis.

use lp_solver::{SolveStatus, SolverError};

/// Errors from building or solving a schedule.
///
/// Every variant is recoverable by falling back to
/// [`crate::GreedyFallback`]; none should reach an end user on its own.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// No optimisation backend could be created.
    #[error("solver unavailable: {0}")]
    SolverUnavailable(String),

    /// The solver finished without a usable solution.
    #[error("exact solve returned status {status}")]
    Infeasible { status: SolveStatus },

    /// Variables, constraints or objective could not be set up from the inputs.
    #[error("model construction failed: {0}")]
    ModelConstruction(String),

    /// The solver rejected the problem.
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    /// A produced schedule violates an invariant.
    #[error("schedule from '{strategy}' is invalid: {detail}")]
    Validation { strategy: String, detail: String },

    /// Scheduler configuration is inconsistent.
    #[error("invalid scheduler configuration: {0}")]
    Config(String),
}

/// Errors from post-solve analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The model has no feasible solution to analyse.
    #[error("model '{model}' was not solved to a feasible status (status {status})")]
    NotSolved { model: String, status: SolveStatus },

    /// The scenario copy does not mirror the original model.
    #[error("failed to clone model '{model}': {detail}")]
    Clone { model: String, detail: String },

    /// A change referenced a variable the model does not have.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// A change referenced a constraint the model does not have.
    #[error("unknown constraint '{0}'")]
    UnknownConstraint(String),

    /// A what-if change could not be parsed.
    #[error("invalid parameter change '{input}': {detail}")]
    InvalidChange { input: String, detail: String },

    /// The scenario could not be solved.
    #[error("scenario solve failed: {0}")]
    Solver(#[from] SolverError),
}
