// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `c2s analyze` command: sensitivity report, recommendations and what-if
//! re-solves for one exactly scheduled batch.

use super::ResourceOverrides;
use pipeline_runtime::{CommandExecutor, Components, Orchestrator, RuntimeConfig};
use std::sync::Arc;

pub async fn execute(
    config: RuntimeConfig,
    prompts: Vec<String>,
    priority: f64,
    resources: ResourceOverrides,
    what_if: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let executor = Arc::new(CommandExecutor::from_config(&config.executor)?);
    let mut components = Components::from_config(&config, executor);
    components.monitor = resources.monitor(&config);
    let orchestrator = Orchestrator::new(config, components)?;

    let mut states = super::build_states(&prompts, priority);
    let batch = orchestrator.schedule_batch(&mut states).await?;
    if let Some(reason) = &batch.fallback_reason {
        anyhow::bail!("the exact solver was not used ({reason}); nothing to analyse");
    }

    let outcome = orchestrator.analyze_last_solve()?;
    let scenario = if what_if.is_empty() {
        None
    } else {
        Some(orchestrator.what_if_last_solve(&what_if)?)
    };

    if json {
        let value = serde_json::json!({
            "schedule": batch.schedule,
            "report": outcome.report,
            "recommendations": outcome.recommendations,
            "what_if": scenario,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", batch.schedule.summary());
    println!();
    println!("{}", outcome.report.summary());
    println!();
    println!("Recommendations:");
    for rec in &outcome.recommendations {
        println!("  - {rec}");
    }
    if let Some(scenario) = scenario {
        println!();
        println!("What-if: {}", scenario.summary());
    }
    Ok(())
}
