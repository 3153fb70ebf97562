// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The orchestration entrypoint.
//!
//! [`Orchestrator`] wires resource sampling, the optimizer breaker, the
//! exact scheduler and its greedy fallback, stage execution and the
//! result cache. Every collaborator is injected; nothing is global.
//!
//! Per request:
//!
//! ```text
//! cache hit ──────────────────────────────────────────────► COMPLETED
//! breaker closed ─► EXACT_SOLVE_ATTEMPTED ─► SCHEDULED ─────────┐
//!                        └─► EXACT_SOLVE_FAILED ─► FALLBACK ────┤
//! breaker open ─────────────────────────────► FALLBACK ─────────┤
//!                                          STAGES_EXECUTING ◄───┘
//!                                          ├─► COMPLETED
//!                                          └─► STAGE_FAILED
//! ```

use crate::{
    cache_key, CacheStore, ErrorCode, ErrorResponse, FailureKind, MemoryCache, MetricsSink,
    RequestMetrics, RuntimeConfig, RuntimeError, StageExecutor, StageFailure, StageRequest,
    TracingMetrics,
};
use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitState};
use lp_solver::{SolveStatus, Solver};
use resource_monitor::{Resource, ResourceMonitor, ResourceSnapshot};
use stage_model::{PipelineState, RequestPhase, ResourceLevel, Stage, StageArtifact};
use stage_scheduler::sensitivity::{parse_assignment, WhatIfResult};
use stage_scheduler::{
    ExactScheduler, GreedyFallback, Schedule, ScheduleError, ScheduleStrategy,
    SensitivityAnalyzer, SensitivityReport, SolvedModel,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Collaborators the orchestrator depends on.
#[derive(Clone)]
pub struct Components {
    pub monitor: Arc<ResourceMonitor>,
    pub breaker: Arc<CircuitBreaker>,
    /// Exact solver backend; `None` routes every batch to the fallback.
    pub solver: Option<Arc<dyn Solver>>,
    pub cache: Arc<dyn CacheStore>,
    pub executor: Arc<dyn StageExecutor>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl Components {
    /// Live system monitor, configured breaker and solver, in-memory cache
    /// and tracing metrics around the given executor.
    pub fn from_config(config: &RuntimeConfig, executor: Arc<dyn StageExecutor>) -> Self {
        let solver = match config.scheduler.create_solver() {
            Ok(solver) => Some(solver),
            Err(e) => {
                tracing::debug!("no exact solver: {e}");
                None
            }
        };
        Self {
            monitor: Arc::new(ResourceMonitor::system(config.monitor.clone())),
            breaker: Arc::new(config.create_breaker()),
            solver,
            cache: Arc::new(MemoryCache::new(config.cache.max_entries)),
            executor,
            metrics: Arc::new(TracingMetrics),
        }
    }
}

/// One request to the generation entrypoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: f64,
}

fn default_priority() -> f64 {
    stage_model::DEFAULT_PRIORITY
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, style: Option<String>, priority: f64) -> Self {
        Self {
            prompt: prompt.into(),
            style,
            priority,
        }
    }
}

/// A finished request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GenerationResult {
    pub target_name: String,
    pub artifact: StageArtifact,
    pub stages_run: Vec<Stage>,
    pub level: Option<ResourceLevel>,
    pub cache_hit: bool,
    pub fallback_used: bool,
    /// The artifact is a stand-in because no stage produced output.
    pub placeholder: bool,
    /// First stage failure, when the artifact is partial or a placeholder.
    pub error: Option<String>,
    pub metrics: RequestMetrics,
}

/// What the cache stores for a completed request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct CachedArtifact {
    artifact: StageArtifact,
    stages_run: Vec<Stage>,
    level: Option<ResourceLevel>,
}

/// Outcome of scheduling one batch.
#[derive(Debug, Clone)]
pub struct BatchSchedule {
    pub schedule: Schedule,
    /// The greedy fallback produced the schedule.
    pub fallback_used: bool,
    /// Why the exact path was not used, when it was not.
    pub fallback_reason: Option<String>,
    pub snapshot: ResourceSnapshot,
    /// Breaker state after this batch's bookkeeping.
    pub breaker_state: CircuitState,
    pub duration: Duration,
}

/// The most recent successful exact solve, in brief.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LastSolve {
    pub model: String,
    pub solver: String,
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub requests: usize,
    pub solve_time_ms: f64,
}

/// Read-only operational view.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatusReport {
    pub breaker: BreakerStatus,
    pub resources: ResourceSnapshot,
    pub trends: BTreeMap<Resource, f64>,
    pub level: ResourceLevel,
    pub samples_taken: u64,
    pub probe_failures: u64,
    pub solver: Option<String>,
    pub last_solve: Option<LastSolve>,
}

impl StatusReport {
    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Breaker '{}': {} ({}/{} failures, opened {} times)\n",
            self.breaker.name,
            self.breaker.state,
            self.breaker.consecutive_failures,
            self.breaker.failure_threshold,
            self.breaker.times_opened,
        );
        s.push_str(&format!(
            "Resources ({} samples, {} probe failures, level {}): {}\n",
            self.samples_taken,
            self.probe_failures,
            self.level,
            self.resources.summary()
        ));
        let trends = self
            .trends
            .iter()
            .map(|(r, t)| format!("{r} {t:+.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        s.push_str(&format!(
            "Trends: {}\n",
            if trends.is_empty() { "n/a" } else { &trends }
        ));
        s.push_str(&format!(
            "Solver: {}",
            self.solver.as_deref().unwrap_or("unavailable (greedy only)")
        ));
        if let Some(last) = &self.last_solve {
            s.push_str(&format!(
                "\nLast solve: {} requests, {} in {:.2}ms, objective {}",
                last.requests,
                last.status,
                last.solve_time_ms,
                last.objective.map_or("n/a".to_string(), |o| format!("{o:.4}"))
            ));
        }
        s
    }
}

/// Sensitivity report of the last exact solve with its recommendations.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisOutcome {
    pub report: SensitivityReport,
    pub recommendations: Vec<String>,
}

/// The generation entrypoint.
pub struct Orchestrator {
    config: RuntimeConfig,
    monitor: Arc<ResourceMonitor>,
    breaker: Arc<CircuitBreaker>,
    exact: Arc<ExactScheduler>,
    greedy: GreedyFallback,
    analyzer: SensitivityAnalyzer,
    cache: Arc<dyn CacheStore>,
    executor: Arc<dyn StageExecutor>,
    metrics: Arc<dyn MetricsSink>,
    solver_unavailable_logged: AtomicBool,
    last_solve: Mutex<Option<SolvedModel>>,
}

impl Orchestrator {
    /// Validates `config` and assembles the orchestrator.
    pub fn new(config: RuntimeConfig, components: Components) -> Result<Self, RuntimeError> {
        config.validate()?;
        let exact = ExactScheduler::new(components.solver, config.scheduler.clone());
        let greedy = GreedyFallback::from_config(&config.scheduler);
        let analyzer = SensitivityAnalyzer::new(config.sensitivity.clone());
        tracing::info!(
            "orchestrator ready: solver {}, executor '{}', cache {}",
            exact.solver().map_or("none", |s| s.name()),
            components.executor.name(),
            if config.cache.enabled { "on" } else { "off" }
        );
        Ok(Self {
            monitor: components.monitor,
            breaker: components.breaker,
            exact: Arc::new(exact),
            greedy,
            analyzer,
            cache: components.cache,
            executor: components.executor,
            metrics: components.metrics,
            solver_unavailable_logged: AtomicBool::new(false),
            last_solve: Mutex::new(None),
            config,
        })
    }

    /// [`Orchestrator::new`] over [`Components::from_config`].
    pub fn from_config(
        config: RuntimeConfig,
        executor: Arc<dyn StageExecutor>,
    ) -> Result<Self, RuntimeError> {
        let components = Components::from_config(&config, executor);
        Self::new(config, components)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Chooses stages for every request in `states`.
    ///
    /// States must be freshly submitted. An exact-solve failure of any kind
    /// is recorded on the breaker and answered by the greedy fallback; only
    /// a model-construction error under `strict_model_errors` is returned.
    pub async fn schedule_batch(
        &self,
        states: &mut [PipelineState],
    ) -> Result<BatchSchedule, RuntimeError> {
        let start = Instant::now();
        let snapshot = self.sample_resources().await?;

        if states.is_empty() {
            let level = self.config.scheduler.bands.classify(&snapshot);
            return Ok(BatchSchedule {
                schedule: Schedule::empty(self.exact.name(), level),
                fallback_used: false,
                fallback_reason: None,
                snapshot,
                breaker_state: self.breaker.state(),
                duration: start.elapsed(),
            });
        }

        let (schedule, fallback_reason) = if self.breaker.allow_request() {
            for state in states.iter_mut() {
                state.advance(RequestPhase::ExactSolveAttempted)?;
            }
            match self.solve_exact(states, &snapshot).await {
                Ok((schedule, solved)) => {
                    self.breaker.record_success();
                    self.metrics.counter("solver.success", 1);
                    self.metrics.gauge("solver.duration_ms", solved.solve_time_ms);
                    *self.lock_last_solve() = Some(solved);
                    schedule.apply(states, false)?;
                    for state in states.iter_mut() {
                        state.advance(RequestPhase::Scheduled)?;
                    }
                    (schedule, None)
                }
                Err(RuntimeError::ScheduleError(ScheduleError::ModelConstruction(detail)))
                    if self.config.scheduler.strict_model_errors =>
                {
                    tracing::error!("schedule model construction failed: {detail}");
                    return Err(ScheduleError::ModelConstruction(detail).into());
                }
                Err(e) => {
                    self.breaker.record_failure();
                    self.metrics.counter("solver.failure", 1);
                    self.log_exact_failure(&e);
                    for state in states.iter_mut() {
                        state.advance(RequestPhase::ExactSolveFailed)?;
                    }
                    (self.schedule_fallback(states, &snapshot)?, Some(e.to_string()))
                }
            }
        } else {
            tracing::debug!(
                "optimizer circuit open; scheduling {} requests greedily",
                states.len()
            );
            (
                self.schedule_fallback(states, &snapshot)?,
                Some("optimizer circuit open".to_string()),
            )
        };

        let duration = start.elapsed();
        tracing::info!(
            "scheduled {} requests with {} in {:.2}ms ({} stages, level {})",
            states.len(),
            schedule.strategy_name,
            duration.as_secs_f64() * 1000.0,
            schedule.total_stages(),
            schedule.level
        );
        Ok(BatchSchedule {
            fallback_used: fallback_reason.is_some(),
            fallback_reason,
            schedule,
            snapshot,
            breaker_state: self.breaker.state(),
            duration,
        })
    }

    /// Runs one request end to end.
    ///
    /// Always returns within `request.timeout_secs`.
    pub async fn generate_request(
        &self,
        prompt: impl Into<String>,
        style: Option<String>,
        priority: f64,
    ) -> Result<GenerationResult, ErrorResponse> {
        self.generate_batch(vec![GenerationRequest::new(prompt, style, priority)])
            .await
            .pop()
            .unwrap_or_else(|| Err(ErrorResponse::new(ErrorCode::Internal, "no result produced")))
    }

    /// Runs a batch: cache lookups, one shared scheduling decision, then
    /// every request's stages concurrently.
    ///
    /// Results come back in input order. The whole batch is bounded by
    /// `request.timeout_secs`; on expiry in-flight stages are cancelled and
    /// every request reports a timeout.
    pub async fn generate_batch(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> Vec<Result<GenerationResult, ErrorResponse>> {
        let n = requests.len();
        let timeout = self.config.request.timeout();
        match tokio::time::timeout(timeout, self.run_batch(requests)).await {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!(
                    "batch of {n} requests exceeded {:.1}s; cancelled",
                    timeout.as_secs_f64()
                );
                let err = RuntimeError::Timeout {
                    timeout_secs: timeout.as_secs_f64(),
                };
                (0..n).map(|_| Err(ErrorResponse::from(&err))).collect()
            }
        }
    }

    /// Read-only view of breaker, resources and the last solve.
    ///
    /// Reports the monitor's current averages without sampling.
    pub fn status(&self) -> StatusReport {
        let resources = self.monitor.averages();
        let last_solve = self
            .lock_last_solve()
            .as_ref()
            .map(|solved| LastSolve {
                model: solved.model.problem.name.clone(),
                solver: solved.solver_name.clone(),
                status: solved.status(),
                objective: solved.solution.objective,
                requests: solved.model.num_requests(),
                solve_time_ms: solved.solve_time_ms,
            });
        StatusReport {
            breaker: self.breaker.status(),
            level: self.config.scheduler.bands.classify(&resources),
            resources,
            trends: self.monitor.trends(),
            samples_taken: self.monitor.sample_count(),
            probe_failures: self.monitor.failure_count(),
            solver: self.exact.solver().map(|s| s.name().to_string()),
            last_solve,
        }
    }

    /// A copy of the most recent successful exact solve.
    pub fn last_solved(&self) -> Option<SolvedModel> {
        self.lock_last_solve().clone()
    }

    /// The slot is only ever overwritten whole, so a poisoned lock still
    /// holds a complete solve or none.
    fn lock_last_solve(&self) -> MutexGuard<'_, Option<SolvedModel>> {
        self.last_solve.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sensitivity report and recommendations for the last exact solve.
    pub fn analyze_last_solve(&self) -> Result<AnalysisOutcome, RuntimeError> {
        let solved = self.last_solved().ok_or(RuntimeError::NoSolvedModel)?;
        let report = self.analyzer.analyze_model(&solved)?;
        let recommendations = self.analyzer.generate_recommendations(&report);
        Ok(AnalysisOutcome {
            report,
            recommendations,
        })
    }

    /// Re-solves the last exact model with `NAME=VALUE` changes applied.
    pub fn what_if_last_solve(&self, assignments: &[String]) -> Result<WhatIfResult, RuntimeError> {
        let solved = self.last_solved().ok_or(RuntimeError::NoSolvedModel)?;
        let solver = self.exact.solver().ok_or_else(|| {
            ScheduleError::SolverUnavailable("what-if analysis needs a solver".into())
        })?;
        let changes = assignments
            .iter()
            .map(|a| parse_assignment(&solved.model.problem, a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .analyzer
            .what_if_scenario(&solved, &changes, solver.as_ref())?)
    }

    async fn sample_resources(&self) -> Result<ResourceSnapshot, RuntimeError> {
        let monitor = Arc::clone(&self.monitor);
        let snapshot = tokio::task::spawn_blocking(move || monitor.get_resources())
            .await
            .map_err(|e| RuntimeError::Internal(format!("resource sampling task failed: {e}")))?;
        for (resource, pct) in snapshot.iter() {
            self.metrics
                .gauge(&format!("resource.{resource}.available_pct"), pct);
        }
        Ok(snapshot)
    }

    /// Builds the model here, solves it on the blocking pool under the
    /// external timeout, then extracts and validates the schedule.
    async fn solve_exact(
        &self,
        states: &[PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<(Schedule, SolvedModel), RuntimeError> {
        let model = self.exact.build_model(states, snapshot)?;
        let exact = Arc::clone(&self.exact);
        let task = tokio::task::spawn_blocking(move || exact.solve_model(model));
        let timeout = self.config.request.solve_timeout();
        let solved = match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| RuntimeError::Internal(format!("solver task failed: {e}")))??,
            Err(_) => {
                return Err(RuntimeError::SolveTimeout {
                    timeout_ms: self.config.request.solve_timeout_ms,
                })
            }
        };
        let schedule = self.exact.extract(&solved)?;
        schedule.validate(states, snapshot, &self.config.scheduler.cost)?;
        Ok((schedule, solved))
    }

    fn schedule_fallback(
        &self,
        states: &mut [PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<Schedule, RuntimeError> {
        let schedule = self.greedy.optimize(states, snapshot);
        schedule.apply(states, true)?;
        for state in states.iter_mut() {
            state.advance(RequestPhase::FallbackScheduled)?;
        }
        self.metrics.counter("schedule.fallback", 1);
        Ok(schedule)
    }

    fn log_exact_failure(&self, err: &RuntimeError) {
        match err {
            RuntimeError::ScheduleError(ScheduleError::SolverUnavailable(reason)) => {
                if !self.solver_unavailable_logged.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "exact solver unavailable ({reason}); scheduling falls back to greedy"
                    );
                } else {
                    tracing::debug!("exact solver still unavailable; using greedy fallback");
                }
            }
            RuntimeError::ScheduleError(ScheduleError::Infeasible { status }) => {
                tracing::warn!(
                    "exact solve ended with status {status}; check resource constraints \
                     and require_template. Using greedy fallback"
                );
            }
            other => tracing::warn!("exact solve failed: {other}; using greedy fallback"),
        }
    }

    async fn run_batch(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> Vec<Result<GenerationResult, ErrorResponse>> {
        let start = Instant::now();
        let mut results: Vec<Option<Result<GenerationResult, ErrorResponse>>> =
            (0..requests.len()).map(|_| None).collect();
        let mut indices = Vec::new();
        let mut states = Vec::new();
        let mut keys = Vec::new();

        for (i, req) in requests.into_iter().enumerate() {
            if req.prompt.trim().is_empty() {
                results[i] = Some(Err(ErrorResponse::from(RuntimeError::InvalidRequest(
                    "prompt is empty".into(),
                ))));
                continue;
            }
            let mut state = PipelineState::new(req.prompt, req.style, req.priority);
            let key = self
                .config
                .cache
                .enabled
                .then(|| cache_key(&state.prompt, state.style.as_deref()));
            if let Some(key) = &key {
                if let Some(hit) = self.cache_lookup(key, &mut state, start).await {
                    results[i] = Some(hit);
                    continue;
                }
            }
            indices.push(i);
            states.push(state);
            keys.push(key);
        }

        if !states.is_empty() {
            match self.schedule_batch(&mut states).await {
                Ok(batch) => {
                    let runs = states.into_iter().map(|state| self.run_stages(state));
                    let finished = futures::future::join_all(runs).await;
                    for ((i, key), outcome) in indices.into_iter().zip(keys).zip(finished) {
                        let result = match outcome {
                            Ok(state) => self.finish(state, key, batch.duration, start).await,
                            Err(e) => Err(ErrorResponse::from(&e)),
                        };
                        results[i] = Some(result);
                    }
                }
                Err(e) => {
                    tracing::error!("scheduling failed for {} requests: {e}", indices.len());
                    let response = ErrorResponse::from(&e);
                    for i in indices {
                        results[i] = Some(Err(response.clone()));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    Err(ErrorResponse::new(ErrorCode::Internal, "request produced no result"))
                })
            })
            .collect()
    }

    async fn cache_lookup(
        &self,
        key: &str,
        state: &mut PipelineState,
        start: Instant,
    ) -> Option<Result<GenerationResult, ErrorResponse>> {
        let Some(raw) = self.cache.get(key).await else {
            self.metrics.counter("cache.miss", 1);
            return None;
        };
        let cached: CachedArtifact = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("ignoring unreadable cache entry for '{}': {e}", state.target_name);
                self.metrics.counter("cache.miss", 1);
                return None;
            }
        };
        self.metrics.counter("cache.hit", 1);
        if let Err(e) = state.advance(RequestPhase::Completed) {
            return Some(Err(ErrorResponse::from(RuntimeError::from(e))));
        }
        tracing::debug!("cache hit for '{}'", state.target_name);
        let mut metrics = RequestMetrics::new(&state.target_name);
        metrics.cache_hit = true;
        metrics.total_duration = start.elapsed();
        Some(Ok(GenerationResult {
            target_name: state.target_name.clone(),
            artifact: cached.artifact,
            stages_run: cached.stages_run,
            level: cached.level,
            cache_hit: true,
            fallback_used: false,
            placeholder: false,
            error: None,
            metrics,
        }))
    }

    /// Runs the scheduled stages of one request in order, stopping at the
    /// first failure.
    async fn run_stages(&self, mut state: PipelineState) -> Result<PipelineState, RuntimeError> {
        state.advance(RequestPhase::StagesExecuting)?;
        let timeout = self.config.executor.stage_timeout();
        for stage in state.stages_to_run().to_vec() {
            let request = StageRequest {
                prompt: state.prompt.clone(),
                style: state.style.clone(),
                target_name: state.target_name.clone(),
                stage,
                level: state.resource_level,
                previous: stage.predecessor().and_then(|p| state.output(p).cloned()),
                timeout,
            };
            let started = Instant::now();
            let outcome = self.executor.execute(request).await.and_then(|artifact| {
                if artifact.is_empty() {
                    Err(StageFailure::new(
                        FailureKind::EmptyOutput,
                        format!("stage '{stage}' produced no content"),
                    ))
                } else {
                    Ok(artifact)
                }
            });
            match outcome {
                Ok(artifact) => {
                    let elapsed = started.elapsed();
                    self.metrics.gauge(
                        &format!("stage.{stage}.duration_ms"),
                        elapsed.as_secs_f64() * 1000.0,
                    );
                    state.record_stage_output(stage, artifact, elapsed)?;
                }
                Err(failure) => {
                    tracing::warn!(
                        "stage '{stage}' failed for '{}': {}",
                        state.target_name,
                        failure.reason
                    );
                    self.metrics
                        .counter(&format!("errors.{stage}.{}", failure.kind.as_str()), 1);
                    state.record_error(format!("{stage}: {}", failure.reason), failure.detail.as_deref());
                    break;
                }
            }
        }
        let next = if state.error().is_some() {
            RequestPhase::StageFailed
        } else {
            RequestPhase::Completed
        };
        state.advance(next)?;
        Ok(state)
    }

    async fn finish(
        &self,
        state: PipelineState,
        key: Option<String>,
        schedule_duration: Duration,
        start: Instant,
    ) -> Result<GenerationResult, ErrorResponse> {
        let mut metrics = RequestMetrics::new(&state.target_name);
        metrics.schedule_duration = schedule_duration;
        metrics.stages_scheduled = state.stages_to_run().len();
        metrics.fallback_used = state.fallback_used;
        for (stage, secs) in &state.stage_durations {
            metrics.record_stage(*stage, Duration::from_secs_f64(*secs));
        }
        metrics.total_duration = start.elapsed();

        let complete = state.phase() == RequestPhase::Completed && !state.stages_run().is_empty();
        let (artifact, placeholder) = match state.final_output() {
            Some(artifact) => (artifact.clone(), false),
            None if self.config.request.placeholder_on_failure => {
                tracing::warn!(
                    "no stage output for '{}' ({}); returning placeholder",
                    state.target_name,
                    state.error().unwrap_or("no stages scheduled")
                );
                (placeholder_artifact(&state.target_name), true)
            }
            None => {
                let message = state
                    .error()
                    .unwrap_or("no stages could be scheduled under current resources");
                return Err(ErrorResponse::new(ErrorCode::StageFailed, message));
            }
        };

        if complete {
            if let Some(key) = key {
                self.store(&key, &state, &artifact).await;
            }
        }

        tracing::info!("{}", metrics.summary());
        let error = match (state.error(), placeholder) {
            (Some(e), _) => Some(e.to_string()),
            (None, true) => Some("no stages could be scheduled under current resources".into()),
            (None, false) => None,
        };
        Ok(GenerationResult {
            target_name: state.target_name.clone(),
            artifact,
            stages_run: state.stages_run().to_vec(),
            level: state.resource_level,
            cache_hit: false,
            fallback_used: state.fallback_used,
            placeholder,
            error,
            metrics,
        })
    }

    async fn store(&self, key: &str, state: &PipelineState, artifact: &StageArtifact) {
        let cached = CachedArtifact {
            artifact: artifact.clone(),
            stages_run: state.stages_run().to_vec(),
            level: state.resource_level,
        };
        match serde_json::to_string(&cached) {
            Ok(value) => self.cache.set(key, value, self.config.cache.ttl()).await,
            Err(e) => tracing::warn!("cannot cache result for '{}': {e}", state.target_name),
        }
    }
}

/// Neutral stand-in returned when no stage produced output.
pub fn placeholder_artifact(target_name: &str) -> StageArtifact {
    StageArtifact::new(format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"256\" height=\"256\" viewBox=\"0 0 256 256\">\
         <rect width=\"256\" height=\"256\" fill=\"#eeeeee\"/>\
         <text x=\"128\" y=\"128\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"14\" \
         fill=\"#666666\">{target_name}</text></svg>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resource_monitor::{FixedProbe, MonitorConfig};

    struct EchoExecutor;

    #[async_trait]
    impl StageExecutor for EchoExecutor {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, request: StageRequest) -> Result<StageArtifact, StageFailure> {
            Ok(StageArtifact::new(format!("<svg><!-- {} --></svg>", request.stage)))
        }
    }

    fn orchestrator(config: RuntimeConfig) -> Orchestrator {
        let snapshot = ResourceSnapshot::from_fractions([
            (Resource::Cpu, 1.0),
            (Resource::Memory, 1.0),
        ]);
        let components = Components {
            monitor: Arc::new(ResourceMonitor::new(
                Box::new(FixedProbe::new(snapshot)),
                MonitorConfig::default(),
            )),
            breaker: Arc::new(config.create_breaker()),
            solver: config.scheduler.create_solver().ok(),
            cache: Arc::new(MemoryCache::new(8)),
            executor: Arc::new(EchoExecutor),
            metrics: Arc::new(TracingMetrics),
        };
        Orchestrator::new(config, components).unwrap()
    }

    #[test]
    fn test_placeholder_is_svg() {
        let p = placeholder_artifact("red_fox");
        assert!(p.content.starts_with("<svg"));
        assert!(p.content.contains("red_fox"));
        assert!(!p.is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = RuntimeConfig::default();
        config.request.solve_timeout_ms = 0;
        let components = Components::from_config(&config, Arc::new(EchoExecutor));
        assert!(Orchestrator::new(config, components).is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_breaker() {
        let orch = orchestrator(RuntimeConfig::default());
        let batch = orch.schedule_batch(&mut []).await.unwrap();
        assert!(batch.schedule.is_empty());
        assert!(!batch.fallback_used);
        assert_eq!(orch.breaker().status().total_successes, 0);
    }

    #[tokio::test]
    async fn test_generate_runs_all_stages() {
        let orch = orchestrator(RuntimeConfig::default());
        let result = orch.generate_request("a red fox", None, 0.5).await.unwrap();
        assert_eq!(result.stages_run, Stage::ALL.to_vec());
        assert!(result.artifact.content.contains("optimize"));
        assert!(!result.fallback_used);
        assert!(!result.placeholder);
        assert_eq!(result.level, Some(ResourceLevel::High));
        assert!(orch.status().last_solve.is_some());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_invalid() {
        let orch = orchestrator(RuntimeConfig::default());
        let err = orch.generate_request("   ", None, 0.5).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_analyze_without_solve() {
        let orch = orchestrator(RuntimeConfig::default());
        assert!(matches!(
            orch.analyze_last_solve(),
            Err(RuntimeError::NoSolvedModel)
        ));
    }

    #[tokio::test]
    async fn test_status_survives_poisoned_last_solve() {
        let orch = Arc::new(orchestrator(RuntimeConfig::default()));
        orch.generate_request("a red fox", None, 0.5).await.unwrap();

        let holder = Arc::clone(&orch);
        let joined = std::thread::spawn(move || {
            let _guard = holder.last_solve.lock().unwrap();
            panic!("poison the last-solve lock");
        })
        .join();
        assert!(joined.is_err());

        assert!(orch.status().last_solve.is_some());
        assert!(orch.last_solved().is_some());
    }
}
