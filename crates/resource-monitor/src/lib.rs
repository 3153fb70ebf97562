// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # resource-monitor
//!
//! Samples system resource availability and exposes smoothed readings to
//! the stage schedulers.
//!
//! # Monitored Resources
//! - **CPU**: idle share from `/proc/stat` tick deltas.
//! - **Memory**: `MemAvailable` from `/proc/meminfo`.
//! - **Swap**: `SwapFree` from `/proc/meminfo` (pressure signal only).
//! - **GPU / VRAM**: best-effort via NVML; omitted when absent.
//!
//! All readings are percent *available* in `[0, 100]`.
//!
//! # Graceful Degradation
//! A failing probe never surfaces as an error to callers: the monitor
//! substitutes a conservative low-but-nonzero reading so schedulers
//! shrink their plans instead of crashing.
//!
//! # Example
//! ```no_run
//! use resource_monitor::{MonitorConfig, Resource, ResourceMonitor};
//!
//! let monitor = ResourceMonitor::system(MonitorConfig::default());
//! let snap = monitor.get_resources();
//! println!("{}", snap.summary());
//! if monitor.get_trend(Resource::Memory) < -0.2 {
//!     println!("memory pressure building");
//! }
//! ```

mod cpu;
mod error;
mod gpu;
mod memory;
mod monitor;
mod probe;
mod procfs;
mod snapshot;
mod window;

pub use cpu::{CpuTimes, LoadAverage};
pub use error::MonitorError;
pub use gpu::{DeviceReading, GpuCollector, GpuInfo};
pub use memory::MemoryInfo;
pub use monitor::{MonitorConfig, ResourceMonitor};
pub use probe::{FixedProbe, ResourceProbe, SystemProbe};
pub use snapshot::{Resource, ResourceSnapshot};
pub use window::SampleWindow;

/// Takes a single unsmoothed reading of the live system.
///
/// Convenience wrapper around [`SystemProbe::sample`].
pub fn snapshot() -> Result<ResourceSnapshot, MonitorError> {
    SystemProbe::default().sample()
}
