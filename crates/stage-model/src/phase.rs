// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Request lifecycle.
//!
//! ```text
//! Submitted ─► ExactSolveAttempted ─► Scheduled ───────────┐
//!    │  │                 │                                 ▼
//!    │  │                 └─► ExactSolveFailed ─► FallbackScheduled ─► StagesExecuting ─► Completed
//!    │  └──────────────(breaker open)──────────────┘                        └─► StageFailed
//!    └──(cache hit)──► Completed
//! ```

use std::fmt;

/// Where a request currently sits in the orchestration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestPhase {
    #[default]
    Submitted,
    ExactSolveAttempted,
    Scheduled,
    ExactSolveFailed,
    FallbackScheduled,
    StagesExecuting,
    Completed,
    StageFailed,
}

impl RequestPhase {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Submitted, ExactSolveAttempted)
                | (Submitted, FallbackScheduled)
                | (Submitted, Completed)
                | (ExactSolveAttempted, Scheduled)
                | (ExactSolveAttempted, ExactSolveFailed)
                | (ExactSolveFailed, FallbackScheduled)
                | (Scheduled, StagesExecuting)
                | (FallbackScheduled, StagesExecuting)
                | (StagesExecuting, Completed)
                | (StagesExecuting, StageFailed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::StageFailed)
    }

    /// `true` once a stage list has been chosen.
    pub fn is_scheduled(&self) -> bool {
        matches!(
            self,
            Self::Scheduled | Self::FallbackScheduled | Self::StagesExecuting
        ) || self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::ExactSolveAttempted => "EXACT_SOLVE_ATTEMPTED",
            Self::Scheduled => "SCHEDULED",
            Self::ExactSolveFailed => "EXACT_SOLVE_FAILED",
            Self::FallbackScheduled => "FALLBACK_SCHEDULED",
            Self::StagesExecuting => "STAGES_EXECUTING",
            Self::Completed => "COMPLETED",
            Self::StageFailed => "STAGE_FAILED",
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::RequestPhase::*;

    #[test]
    fn test_exact_path() {
        assert!(Submitted.can_transition_to(ExactSolveAttempted));
        assert!(ExactSolveAttempted.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(StagesExecuting));
        assert!(StagesExecuting.can_transition_to(Completed));
    }

    #[test]
    fn test_fallback_paths() {
        assert!(ExactSolveAttempted.can_transition_to(ExactSolveFailed));
        assert!(ExactSolveFailed.can_transition_to(FallbackScheduled));
        assert!(Submitted.can_transition_to(FallbackScheduled));
        assert!(FallbackScheduled.can_transition_to(StagesExecuting));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Submitted.can_transition_to(Scheduled));
        assert!(!ExactSolveFailed.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(Submitted));
        assert!(!StageFailed.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(Scheduled));
    }

    #[test]
    fn test_terminal_and_display() {
        assert!(Completed.is_terminal());
        assert!(StageFailed.is_terminal());
        assert!(!StagesExecuting.is_terminal());
        assert!(FallbackScheduled.is_scheduled());
        assert!(!ExactSolveFailed.is_scheduled());
        assert_eq!(FallbackScheduled.to_string(), "FALLBACK_SCHEDULED");
    }
}
