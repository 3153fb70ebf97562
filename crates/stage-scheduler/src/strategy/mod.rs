// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`ScheduleStrategy`] trait and its implementations.

pub mod exact;
pub mod greedy;

use crate::{Schedule, ScheduleError};
use resource_monitor::ResourceSnapshot;
use stage_model::PipelineState;

/// Decides which stage prefix each request in a batch should run.
///
/// Strategies are purely algorithmic, with no I/O or system calls, and
/// always return assignments in the same order as `requests`.
pub trait ScheduleStrategy: Send + Sync {
    /// Human-readable name of this strategy.
    fn name(&self) -> &str;

    /// Produces a schedule for `requests` under `snapshot`.
    fn schedule(
        &self,
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<Schedule, ScheduleError>;
}
