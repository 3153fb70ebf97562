// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pipeline-runtime
//!
//! Orchestration for staged SVG generation.
//!
//! The [`Orchestrator`] takes requests, samples resources, asks the exact
//! scheduler (behind the optimizer circuit breaker) or the greedy fallback
//! which stages each request can afford, runs those stages through a
//! [`StageExecutor`], and caches finished artifacts.
//!
//! External collaborators sit behind traits:
//!
//! | Seam | Trait | Bundled implementation |
//! |---|---|---|
//! | Stage execution | [`StageExecutor`] | [`CommandExecutor`] |
//! | Result cache | [`CacheStore`] | [`MemoryCache`] |
//! | Metrics | [`MetricsSink`] | [`TracingMetrics`], [`MetricsRecorder`] |
//!
//! # Example
//! ```no_run
//! use pipeline_runtime::{CommandExecutor, Orchestrator, RuntimeConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RuntimeConfig::from_file("c2s.toml".as_ref())?;
//! let executor = Arc::new(CommandExecutor::from_config(&config.executor)?);
//! let orchestrator = Orchestrator::from_config(config, executor)?;
//! match orchestrator.generate_request("a lighthouse at dusk", None, 0.7).await {
//!     Ok(result) => println!("{}", result.artifact.content),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod error;
mod executor;
mod metrics;
mod orchestrator;

pub use cache::{cache_key, CacheStore, MemoryCache};
pub use config::{CacheConfig, CommandSpec, ExecutorConfig, RequestConfig, RuntimeConfig};
pub use error::{ErrorCode, ErrorResponse, RuntimeError};
pub use executor::{CommandExecutor, FailureKind, StageExecutor, StageFailure, StageRequest};
pub use metrics::{MetricsRecorder, MetricsSink, MetricsSnapshot, RequestMetrics, TracingMetrics};
pub use orchestrator::{
    placeholder_artifact, AnalysisOutcome, BatchSchedule, Components, GenerationRequest,
    GenerationResult, LastSolve, Orchestrator, StatusReport,
};
