// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for pipeline state bookkeeping.

use crate::{RequestPhase, Stage};

/// Errors raised when a [`crate::PipelineState`] update would break an invariant.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A stage output was recorded before its predecessor's output.
    #[error("cannot record '{stage}' output: '{missing}' has not produced output")]
    MissingPredecessor { stage: Stage, missing: Stage },

    /// A stage output was recorded twice.
    #[error("stage '{0}' already produced output")]
    StageAlreadyRecorded(Stage),

    /// The stage list is not a prefix of the canonical order.
    #[error("stage list {0:?} is not a prefix of template → detail → optimize")]
    NotAPrefix(Vec<Stage>),

    /// The request lifecycle does not allow this transition.
    #[error("illegal phase transition {from} → {to}")]
    IllegalTransition { from: RequestPhase, to: RequestPhase },
}
