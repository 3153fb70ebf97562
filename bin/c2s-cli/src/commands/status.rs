// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `c2s status` command: breaker state, resource averages and level.
//!
//! A fresh process has no samples yet, so the monitor is sampled twice
//! (CPU load needs two readings) before the read-only report is taken.

use pipeline_runtime::{CommandExecutor, Components, Orchestrator, RuntimeConfig};
use resource_monitor::{Resource, ResourceMonitor};
use std::sync::Arc;
use std::time::Duration;

pub async fn execute(config: RuntimeConfig, json: bool) -> anyhow::Result<()> {
    let monitor = Arc::new(ResourceMonitor::system(config.monitor.clone()));
    let warm = Arc::clone(&monitor);
    tokio::task::spawn_blocking(move || {
        warm.refresh();
        std::thread::sleep(Duration::from_millis(250));
        warm.refresh();
    })
    .await?;

    let executor = Arc::new(CommandExecutor::from_config(&config.executor)?);
    let mut components = Components::from_config(&config, executor);
    components.monitor = monitor;
    let orchestrator = Orchestrator::new(config, components)?;
    let report = orchestrator.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              c2s · Scheduler Status                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    println!("  Optimizer breaker");
    println!("   State:        {}", report.breaker.state);
    println!(
        "   Failures:     {}/{}",
        report.breaker.consecutive_failures, report.breaker.failure_threshold
    );
    println!("   Cooldown:     {:.0}s", report.breaker.reset_timeout_secs);
    println!();

    println!("  Resources (percent available)");
    for resource in Resource::ALL {
        match report.resources.get(resource) {
            Some(pct) => {
                let trend = report.trends.get(&resource).copied().unwrap_or(0.0);
                println!(
                    "   {:<12}  {:>5.1}%  {}  trend {trend:+.2}",
                    resource.as_str(),
                    pct,
                    super::availability_bar(pct)
                );
            }
            None => println!("   {:<12}  not detected", resource.as_str()),
        }
    }
    println!();

    println!("  Assessment");
    println!("   Level:        {}", report.level);
    println!(
        "   Solver:       {}",
        report.solver.as_deref().unwrap_or("unavailable (greedy only)")
    );
    if report.probe_failures > 0 {
        println!(
            "   WARNING: {} of {} probe samples failed; conservative defaults in use",
            report.probe_failures, report.samples_taken
        );
    }
    Ok(())
}
