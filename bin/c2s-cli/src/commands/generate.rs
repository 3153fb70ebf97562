// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `c2s generate` command: one request through the full pipeline.
//!
//! Prints the result, or the error response, as JSON on stdout.

use pipeline_runtime::{CommandExecutor, Orchestrator, RuntimeConfig};
use std::sync::Arc;

pub async fn execute(
    config: RuntimeConfig,
    prompt: String,
    style: Option<String>,
    priority: f64,
) -> anyhow::Result<()> {
    let executor = CommandExecutor::from_config(&config.executor)?;
    if executor.configured_stages().is_empty() {
        tracing::warn!("no stage commands configured under [executor.stages]; every stage will fail");
    }
    let orchestrator = Orchestrator::from_config(config, Arc::new(executor))?;

    match orchestrator.generate_request(prompt, style, priority).await {
        Ok(result) => {
            eprintln!("{}", result.metrics.summary());
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            anyhow::bail!("generation failed: {}", response.message)
        }
    }
}
