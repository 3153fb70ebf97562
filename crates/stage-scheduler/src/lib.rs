// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stage-scheduler
//!
//! Decides which stage prefix each request in a batch runs, given the
//! resources currently available.
//!
//! # Strategies
//!
//! | Strategy | Quality | Cost | Can fail |
//! |---|---|---|---|
//! | [`ExactScheduler`] | Optimal | Integer program solve | Yes |
//! | [`GreedyFallback`] | Approximate | Linear | No |
//!
//! Both price stages through one [`CostModel`] and classify the snapshot
//! with the same [`LevelBands`], so the fallback approximates exactly the
//! program the exact scheduler solves.
//!
//! # Sensitivity
//!
//! The [`sensitivity`] module inspects a [`SolvedModel`]: duals, slack,
//! stage impact, bottleneck resources, and what-if re-solves.
//!
//! # Example
//! ```
//! use resource_monitor::{Resource, ResourceSnapshot};
//! use stage_model::PipelineState;
//! use stage_scheduler::{ExactScheduler, ScheduleStrategy, SchedulerConfig};
//!
//! let snapshot = ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0), (Resource::Memory, 1.0)]);
//! let batch = vec![PipelineState::new("a lighthouse at dusk", None, 0.5)];
//! let schedule = ExactScheduler::from_config(SchedulerConfig::default())
//!     .schedule(&batch, &snapshot)
//!     .unwrap();
//! println!("{}", schedule.summary());
//! ```

mod config;
mod cost;
mod error;
mod levels;
pub mod model;
mod schedule;
pub mod sensitivity;
pub mod strategy;

pub use config::{SchedulerConfig, KNOWN_SOLVERS};
pub use cost::{CostModel, LevelScale};
pub use error::{AnalysisError, ScheduleError};
pub use levels::LevelBands;
pub use model::{ConstraintRole, ModelIndex, ScheduleModel, SolvedModel};
pub use schedule::{Assignment, Schedule, FEASIBILITY_TOLERANCE};
pub use sensitivity::{AnalysisThresholds, SensitivityAnalyzer, SensitivityReport};
pub use strategy::exact::ExactScheduler;
pub use strategy::greedy::GreedyFallback;
pub use strategy::ScheduleStrategy;

use resource_monitor::ResourceSnapshot;
use stage_model::PipelineState;

/// Runs the exact scheduler and falls back to greedy on any failure.
///
/// Returns the schedule and whether the fallback produced it. This is the
/// synchronous core of the orchestrator's scheduling path, without breaker
/// bookkeeping or timeouts.
pub fn schedule_or_fallback(
    exact: &ExactScheduler,
    greedy: &GreedyFallback,
    requests: &[PipelineState],
    snapshot: &ResourceSnapshot,
) -> (Schedule, bool) {
    match exact.schedule(requests, snapshot) {
        Ok(schedule) => (schedule, false),
        Err(e) => {
            tracing::warn!("exact scheduling failed ({e}); using greedy fallback");
            (greedy.optimize(requests, snapshot), true)
        }
    }
}
