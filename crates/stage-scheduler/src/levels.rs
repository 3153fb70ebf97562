// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Resource-level classification.
//!
//! The scheduler picks a [`ResourceLevel`] from the tightest schedulable
//! resource in the snapshot, then lets swap pressure push it down:
//!
//! ```text
//! min available ≥ high_pct    → high
//! min available ≥ medium_pct  → medium
//! min available ≥ low_pct     → low
//! otherwise                   → minimal
//!
//! swap used > swap_downgrade_used_pct → one band lower
//! swap used > swap_minimal_used_pct   → minimal
//! ```

use crate::ScheduleError;
use resource_monitor::{Resource, ResourceSnapshot};
use stage_model::ResourceLevel;

/// Threshold bands, all in percent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LevelBands {
    pub high_pct: f64,
    pub medium_pct: f64,
    pub low_pct: f64,
    pub swap_downgrade_used_pct: f64,
    pub swap_minimal_used_pct: f64,
}

impl Default for LevelBands {
    fn default() -> Self {
        Self {
            high_pct: 50.0,
            medium_pct: 20.0,
            low_pct: 10.0,
            swap_downgrade_used_pct: 50.0,
            swap_minimal_used_pct: 75.0,
        }
    }
}

impl LevelBands {
    /// Classifies a snapshot. A snapshot with no schedulable resources
    /// constrains nothing and classifies as high before swap is applied.
    pub fn classify(&self, snapshot: &ResourceSnapshot) -> ResourceLevel {
        let tightest = Resource::SCHEDULABLE
            .iter()
            .filter_map(|r| snapshot.get(*r))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));

        let level = match tightest {
            None => ResourceLevel::High,
            Some(v) if v >= self.high_pct => ResourceLevel::High,
            Some(v) if v >= self.medium_pct => ResourceLevel::Medium,
            Some(v) if v >= self.low_pct => ResourceLevel::Low,
            Some(_) => ResourceLevel::Minimal,
        };

        match snapshot.get(Resource::Swap).map(|avail| 100.0 - avail) {
            Some(used) if used > self.swap_minimal_used_pct => ResourceLevel::Minimal,
            Some(used) if used > self.swap_downgrade_used_pct => level.downgraded(),
            _ => level,
        }
    }

    /// Checks band ordering and range.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        let all = [
            self.high_pct,
            self.medium_pct,
            self.low_pct,
            self.swap_downgrade_used_pct,
            self.swap_minimal_used_pct,
        ];
        if !all.iter().all(|v| in_range(*v)) {
            return Err(ScheduleError::Config(
                "level bands must lie within [0, 100]".into(),
            ));
        }
        if !(self.high_pct >= self.medium_pct && self.medium_pct >= self.low_pct) {
            return Err(ScheduleError::Config(format!(
                "level bands must satisfy high ≥ medium ≥ low, got {} / {} / {}",
                self.high_pct, self.medium_pct, self.low_pct
            )));
        }
        if self.swap_downgrade_used_pct > self.swap_minimal_used_pct {
            return Err(ScheduleError::Config(
                "swap downgrade cutoff must not exceed the minimal cutoff".into(),
            ));
        }
        Ok(())
    }
}
