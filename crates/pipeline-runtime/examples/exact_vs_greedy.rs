// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: Compare exact and greedy scheduling under shrinking resources,
//! then run a batch through the orchestrator.
//!
//! ```bash
//! cargo run -p pipeline-runtime --example exact_vs_greedy
//! ```

use async_trait::async_trait;
use pipeline_runtime::{
    Components, GenerationRequest, MemoryCache, MetricsRecorder, Orchestrator, RuntimeConfig,
    StageExecutor, StageFailure, StageRequest,
};
use resource_monitor::{FixedProbe, Resource, ResourceMonitor, ResourceSnapshot};
use stage_model::{PipelineState, StageArtifact};
use stage_scheduler::{ExactScheduler, GreedyFallback, ScheduleStrategy, SchedulerConfig};
use std::sync::Arc;

/// Draws a labelled rectangle per stage.
struct SketchExecutor;

#[async_trait]
impl StageExecutor for SketchExecutor {
    fn name(&self) -> &str {
        "sketch"
    }

    async fn execute(&self, request: StageRequest) -> Result<StageArtifact, StageFailure> {
        Ok(StageArtifact::new(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><title>{} ({})</title></svg>",
            request.target_name, request.stage
        )))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let requests: Vec<PipelineState> = [
        ("a lighthouse at dusk", 0.9),
        ("minimal fox logo", 0.6),
        ("an intricate botanical illustration of ferns and moss", 0.4),
        ("pixel art robot", 0.2),
    ]
    .iter()
    .map(|(prompt, priority)| PipelineState::new(*prompt, None, *priority))
    .collect();

    let config = SchedulerConfig::default();
    let strategies: Vec<Box<dyn ScheduleStrategy>> = vec![
        Box::new(ExactScheduler::from_config(config.clone())),
        Box::new(GreedyFallback::from_config(&config)),
    ];

    println!(
        "{:<10} {:>6} {:>8} {:>8} {:>10}",
        "Strategy", "Avail", "Level", "Stages", "Objective"
    );
    println!("{}", "-".repeat(46));

    for avail in [1.0, 0.6, 0.3, 0.12] {
        let snapshot = ResourceSnapshot::from_fractions([
            (Resource::Cpu, avail),
            (Resource::Memory, avail),
            (Resource::Gpu, avail),
            (Resource::Vram, avail),
        ]);
        for strategy in &strategies {
            match strategy.schedule(&requests, &snapshot) {
                Ok(schedule) => println!(
                    "{:<10} {:>5.0}% {:>8} {:>8} {:>10.4}",
                    strategy.name(),
                    avail * 100.0,
                    schedule.level,
                    schedule.total_stages(),
                    schedule.objective
                ),
                Err(e) => println!("{:<10} {:>5.0}% FAIL: {e}", strategy.name(), avail * 100.0),
            }
        }
    }

    println!("\n--- Orchestrating the batch at 60% availability ---\n");
    let runtime_config = RuntimeConfig::default();
    let metrics = Arc::new(MetricsRecorder::new());
    let snapshot = ResourceSnapshot::from_fractions([
        (Resource::Cpu, 0.6),
        (Resource::Memory, 0.6),
        (Resource::Gpu, 0.6),
    ]);
    let components = Components {
        monitor: Arc::new(ResourceMonitor::new(
            Box::new(FixedProbe::new(snapshot)),
            runtime_config.monitor.clone(),
        )),
        breaker: Arc::new(runtime_config.create_breaker()),
        solver: runtime_config.scheduler.create_solver().ok(),
        cache: Arc::new(MemoryCache::new(runtime_config.cache.max_entries)),
        executor: Arc::new(SketchExecutor),
        metrics: metrics.clone(),
    };
    let orchestrator = Orchestrator::new(runtime_config, components)?;

    let batch = requests
        .iter()
        .map(|s| GenerationRequest::new(s.prompt.clone(), None, s.priority))
        .collect();
    let rt = tokio::runtime::Runtime::new()?;
    for result in rt.block_on(orchestrator.generate_batch(batch)) {
        match result {
            Ok(r) => println!("{}", r.metrics.summary()),
            Err(e) => println!("error: {e}"),
        }
    }

    let analysis = orchestrator.analyze_last_solve()?;
    println!("\n{}", analysis.report.summary());
    for rec in &analysis.recommendations {
        println!("  - {rec}");
    }
    println!("\n{}", orchestrator.status().summary());
    println!("Metrics: {:?}", metrics.snapshot().counters);

    Ok(())
}
