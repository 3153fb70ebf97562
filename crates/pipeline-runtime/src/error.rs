// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the orchestration runtime.

use stage_model::StateError;
use stage_scheduler::{AnalysisError, ScheduleError};

/// Errors that can occur while orchestrating requests.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The request itself is unusable (e.g. an empty prompt).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Scheduling failed in a way the fallback does not cover.
    #[error("scheduling error: {0}")]
    ScheduleError(#[from] ScheduleError),

    /// The exact solve exceeded the external safety timeout.
    #[error("exact solve exceeded {timeout_ms} ms")]
    SolveTimeout { timeout_ms: u64 },

    /// A lifecycle transition or stage record was rejected.
    #[error("request state error: {0}")]
    StateError(#[from] StateError),

    /// Sensitivity analysis failed.
    #[error("analysis error: {0}")]
    AnalysisError(#[from] AnalysisError),

    /// No exact solve has completed yet, so there is nothing to analyse.
    #[error("no solved model is available yet")]
    NoSolvedModel,

    /// Every scheduled stage failed and placeholders are disabled.
    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// The request did not finish within its time bound.
    #[error("request exceeded {timeout_secs} s")]
    Timeout { timeout_secs: f64 },

    /// A blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable category of an [`ErrorResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    SchedulingFailed,
    StageFailed,
    Timeout,
    Internal,
}

/// What callers of the generation entrypoint receive instead of a raw error.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl From<&RuntimeError> for ErrorResponse {
    fn from(err: &RuntimeError) -> Self {
        let code = match err {
            RuntimeError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RuntimeError::ScheduleError(_)
            | RuntimeError::SolveTimeout { .. }
            | RuntimeError::NoSolvedModel
            | RuntimeError::AnalysisError(_) => ErrorCode::SchedulingFailed,
            RuntimeError::StageFailed { .. } => ErrorCode::StageFailed,
            RuntimeError::Timeout { .. } => ErrorCode::Timeout,
            RuntimeError::ConfigError(_) | RuntimeError::StateError(_) | RuntimeError::Internal(_) => {
                ErrorCode::Internal
            }
        };
        Self::new(code, err.to_string())
    }
}

impl From<RuntimeError> for ErrorResponse {
    fn from(err: RuntimeError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let r = ErrorResponse::from(RuntimeError::InvalidRequest("empty prompt".into()));
        assert_eq!(r.code, ErrorCode::InvalidRequest);
        assert!(r.message.contains("empty prompt"));

        let r = ErrorResponse::from(RuntimeError::Timeout { timeout_secs: 2.0 });
        assert_eq!(r.code, ErrorCode::Timeout);

        let r = ErrorResponse::from(RuntimeError::ScheduleError(ScheduleError::ModelConstruction(
            "bad".into(),
        )));
        assert_eq!(r.code, ErrorCode::SchedulingFailed);
    }

    #[test]
    fn test_error_response_json() {
        let r = ErrorResponse::new(ErrorCode::StageFailed, "template: exit status 1");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["code"], "stage_failed");
        assert_eq!(json["message"], "template: exit status 1");
    }
}
