// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod analyze;
pub mod generate;
pub mod schedule;
pub mod status;

use pipeline_runtime::RuntimeConfig;
use resource_monitor::{FixedProbe, Resource, ResourceMonitor, ResourceSnapshot};
use stage_model::PipelineState;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over the verbosity count.
pub fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads and validates the config file, or the defaults without one.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Percent-available overrides. When any is given, the live probe is
/// replaced by a fixed reading holding only the given resources.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ResourceOverrides {
    /// CPU available, percent.
    #[arg(long)]
    pub cpu: Option<f64>,

    /// Memory available, percent.
    #[arg(long)]
    pub memory: Option<f64>,

    /// GPU available, percent.
    #[arg(long)]
    pub gpu: Option<f64>,

    /// VRAM available, percent.
    #[arg(long)]
    pub vram: Option<f64>,

    /// Swap available, percent.
    #[arg(long)]
    pub swap: Option<f64>,
}

impl ResourceOverrides {
    pub fn snapshot(&self) -> Option<ResourceSnapshot> {
        let values: Vec<(Resource, f64)> = [
            (Resource::Cpu, self.cpu),
            (Resource::Memory, self.memory),
            (Resource::Gpu, self.gpu),
            (Resource::Vram, self.vram),
            (Resource::Swap, self.swap),
        ]
        .into_iter()
        .filter_map(|(r, v)| v.map(|v| (r, v)))
        .collect();
        (!values.is_empty()).then(|| ResourceSnapshot::from_percentages(values))
    }

    /// A monitor over the overrides, or over the live system.
    pub fn monitor(&self, config: &RuntimeConfig) -> Arc<ResourceMonitor> {
        let monitor = match self.snapshot() {
            Some(snapshot) => {
                ResourceMonitor::new(Box::new(FixedProbe::new(snapshot)), config.monitor.clone())
            }
            None => ResourceMonitor::system(config.monitor.clone()),
        };
        Arc::new(monitor)
    }
}

pub fn build_states(prompts: &[String], priority: f64) -> Vec<PipelineState> {
    prompts
        .iter()
        .map(|p| PipelineState::new(p.as_str(), None, priority))
        .collect()
}

/// Creates a visual availability bar (0-100 scale).
pub fn availability_bar(pct: f64) -> String {
    let filled = ((pct / 100.0) * 20.0).round().clamp(0.0, 20.0) as usize;
    let symbol = if pct < 10.0 {
        "#"
    } else if pct < 20.0 {
        "="
    } else {
        "-"
    };
    format!("[{}{}]", symbol.repeat(filled), ".".repeat(20 - filled))
}
