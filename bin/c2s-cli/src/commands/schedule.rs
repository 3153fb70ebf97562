// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `c2s schedule` command: exact and greedy schedules side by side.

use super::ResourceOverrides;
use pipeline_runtime::RuntimeConfig;
use stage_scheduler::{ExactScheduler, GreedyFallback, ScheduleStrategy};
use std::sync::Arc;
use std::time::Instant;

pub async fn execute(
    config: RuntimeConfig,
    prompts: Vec<String>,
    priority: f64,
    resources: ResourceOverrides,
    greedy_only: bool,
) -> anyhow::Result<()> {
    let monitor = resources.monitor(&config);
    let sampler = Arc::clone(&monitor);
    let snapshot = tokio::task::spawn_blocking(move || sampler.get_resources()).await?;
    let states = super::build_states(&prompts, priority);

    println!("Resources: {}", snapshot.summary());
    println!("Level:     {}", config.scheduler.bands.classify(&snapshot));
    println!();

    let mut strategies: Vec<Box<dyn ScheduleStrategy>> = Vec::new();
    if !greedy_only {
        strategies.push(Box::new(ExactScheduler::from_config(config.scheduler.clone())));
    }
    strategies.push(Box::new(GreedyFallback::from_config(&config.scheduler)));

    for strategy in &strategies {
        let start = Instant::now();
        match strategy.schedule(&states, &snapshot) {
            Ok(schedule) => {
                println!(
                    "{} ({:.2}ms)",
                    schedule.summary(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                for (a, state) in schedule.assignments.iter().zip(&states) {
                    println!("      [{}] = '{}'", a.request, state.target_name);
                }
            }
            Err(e) => println!("{}: FAILED ({e})", strategy.name()),
        }
        println!();
    }
    Ok(())
}
