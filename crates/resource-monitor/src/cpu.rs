// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU availability monitoring.
//!
//! Reads CPU state from:
//! - `/proc/stat`: cumulative tick counters. Two readings taken one
//!   sampling interval apart give precise utilisation over that interval.
//! - `/sys/devices/system/cpu/online`: online core count.
//! - `/proc/loadavg`: 1-minute load average, used as a utilisation proxy
//!   for the very first sample when no previous tick reading exists.

use crate::procfs::read_trimmed;
use crate::MonitorError;
use std::path::Path;

const PROC_STAT_PATH: &str = "/proc/stat";
const LOADAVG_PATH: &str = "/proc/loadavg";
const CPU_ONLINE_PATH: &str = "/sys/devices/system/cpu/online";

/// Aggregate CPU tick counters from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CpuTimes {
    /// Ticks spent idle (idle + iowait).
    pub idle: u64,
    /// All ticks (user through steal).
    pub total: u64,
}

impl CpuTimes {
    /// Reads the current aggregate tick counters.
    pub fn read() -> Result<Self, MonitorError> {
        let path = Path::new(PROC_STAT_PATH);
        let content = read_trimmed(path)?;
        Self::parse(&content, path)
    }

    /// Parses the aggregate `cpu` line of a `/proc/stat`-formatted string.
    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, MonitorError> {
        let line = content
            .lines()
            .find(|l| l.starts_with("cpu "))
            .ok_or_else(|| MonitorError::ParseError {
                path: source_path.display().to_string(),
                detail: "aggregate 'cpu' line not found".to_string(),
            })?;

        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| {
                f.parse::<u64>().map_err(|_| MonitorError::ParseError {
                    path: source_path.display().to_string(),
                    detail: format!("expected integer tick count, got '{f}'"),
                })
            })
            .collect::<Result<_, _>>()?;

        if fields.len() < 4 {
            return Err(MonitorError::ParseError {
                path: source_path.display().to_string(),
                detail: format!("expected at least 4 tick fields, got {}", fields.len()),
            });
        }

        // user nice system idle iowait irq softirq steal
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total = fields.iter().sum();
        Ok(Self { idle, total })
    }

    /// Percentage of CPU time that was idle between `earlier` and `self`.
    ///
    /// Returns `None` when no ticks elapsed (counters did not advance).
    pub fn available_pct_since(&self, earlier: &CpuTimes) -> Option<f64> {
        let total = self.total.checked_sub(earlier.total)?;
        let idle = self.idle.checked_sub(earlier.idle)?;
        if total == 0 {
            return None;
        }
        Some((idle as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
    }
}

/// Load averages from `/proc/loadavg`, used before tick deltas exist.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
    pub online_cores: u32,
}

impl LoadAverage {
    pub fn read() -> Result<Self, MonitorError> {
        let path = Path::new(LOADAVG_PATH);
        let content = read_trimmed(path)?;
        Self::parse(&content, online_cores(), path)
    }

    /// Parses `"0.35 0.28 0.22 1/234 5678"`.
    pub(crate) fn parse(
        content: &str,
        online_cores: u32,
        origin: &Path,
    ) -> Result<Self, MonitorError> {
        let mut loads = content.split_whitespace().map(str::parse::<f64>);
        let mut next = |which: &str| match loads.next() {
            Some(Ok(v)) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(MonitorError::ParseError {
                path: origin.display().to_string(),
                detail: format!("no {which} load average in '{content}'"),
            }),
        };
        Ok(Self {
            one: next("1-minute")?,
            five: next("5-minute")?,
            fifteen: next("15-minute")?,
            online_cores: online_cores.max(1),
        })
    }

    /// Capacity not claimed by the 1-minute load, percent.
    pub fn available_pct(&self) -> f64 {
        let per_core = self.one / f64::from(self.online_cores.max(1));
        ((1.0 - per_core) * 100.0).clamp(0.0, 100.0)
    }
}

/// Online cores from the sysfs range list (`"0-3,6"`), or the scheduler's
/// view of available parallelism when sysfs is unreadable.
fn online_cores() -> u32 {
    read_trimmed(Path::new(CPU_ONLINE_PATH))
        .ok()
        .and_then(|list| count_cpu_list(&list))
        .or_else(|| {
            std::thread::available_parallelism()
                .ok()
                .map(|n| n.get() as u32)
        })
        .unwrap_or(1)
}

/// Counts the CPUs in a kernel cpu list such as `"0-3,6"`.
fn count_cpu_list(list: &str) -> Option<u32> {
    list.split(',')
        .map(|span| match span.trim().split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.parse().ok()?;
                let hi: u32 = hi.parse().ok()?;
                hi.checked_sub(lo).map(|d| d + 1)
            }
            None => span.trim().parse::<u32>().ok().map(|_| 1),
        })
        .sum::<Option<u32>>()
        .filter(|&n| n > 0)
}
