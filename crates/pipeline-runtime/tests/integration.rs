// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end orchestration.
//!
//! These tests drive the orchestrator with a fixed resource probe, a
//! solver that counts its invocations and a scripted stage executor, and
//! check the scheduling path, breaker bookkeeping, caching, failure
//! handling and time bounds together.

use async_trait::async_trait;
use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use lp_solver::{BranchAndBound, Problem, Solution, Solver, SolverError};
use pipeline_runtime::{
    Components, ErrorCode, FailureKind, GenerationRequest, MemoryCache, MetricsRecorder,
    Orchestrator, RuntimeConfig, RuntimeError, StageExecutor, StageFailure, StageRequest,
};
use resource_monitor::{FixedProbe, MonitorConfig, Resource, ResourceMonitor, ResourceSnapshot};
use stage_model::{PipelineState, RequestPhase, Stage, StageArtifact};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ── Fakes ──────────────────────────────────────────────────────

/// Branch-and-bound that counts calls.
#[derive(Default)]
struct CountingSolver {
    inner: BranchAndBound,
    calls: AtomicUsize,
}

impl Solver for CountingSolver {
    fn name(&self) -> &str {
        "counting"
    }

    fn solve(&self, problem: &Problem) -> Result<Solution, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.solve(problem)
    }
}

/// A backend that cannot be used.
#[derive(Default)]
struct BrokenSolver {
    calls: AtomicUsize,
}

impl Solver for BrokenSolver {
    fn name(&self) -> &str {
        "broken"
    }

    fn solve(&self, _problem: &Problem) -> Result<Solution, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SolverError::Unavailable("broken".into()))
    }
}

/// A backend that takes far longer than the orchestrator allows.
struct SlowSolver;

impl Solver for SlowSolver {
    fn name(&self) -> &str {
        "slow"
    }

    fn solve(&self, problem: &Problem) -> Result<Solution, SolverError> {
        std::thread::sleep(Duration::from_millis(300));
        BranchAndBound::default().solve(problem)
    }
}

/// Returns markup per stage, optionally failing one stage or sleeping.
#[derive(Default)]
struct ScriptedExecutor {
    fail_stage: Option<Stage>,
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, request: StageRequest) -> Result<StageArtifact, StageFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_stage == Some(request.stage) {
            return Err(StageFailure::new(FailureKind::ExitStatus, "renderer crashed")
                .with_detail("Traceback: out of memory"));
        }
        if let Some(prev) = request.stage.predecessor() {
            assert!(request.previous.is_some(), "{prev} output not passed on");
        }
        Ok(StageArtifact::new(format!(
            "<svg data-stage=\"{}\" data-target=\"{}\"/>",
            request.stage, request.target_name
        )))
    }
}

// ── Helpers ────────────────────────────────────────────────────

struct Harness {
    orchestrator: Orchestrator,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<MetricsRecorder>,
}

fn snapshot(values: &[(Resource, f64)]) -> ResourceSnapshot {
    ResourceSnapshot::from_fractions(values.iter().copied())
}

fn harness(
    config: RuntimeConfig,
    resources: &[(Resource, f64)],
    solver: Option<Arc<dyn Solver>>,
    executor: Arc<dyn StageExecutor>,
) -> Harness {
    let breaker = Arc::new(config.create_breaker());
    let metrics = Arc::new(MetricsRecorder::new());
    let components = Components {
        monitor: Arc::new(ResourceMonitor::new(
            Box::new(FixedProbe::new(snapshot(resources))),
            MonitorConfig::default(),
        )),
        breaker: Arc::clone(&breaker),
        solver,
        cache: Arc::new(MemoryCache::new(16)),
        executor,
        metrics: metrics.clone(),
    };
    Harness {
        orchestrator: Orchestrator::new(config, components).unwrap(),
        breaker,
        metrics,
    }
}

fn ample() -> Vec<(Resource, f64)> {
    vec![(Resource::Cpu, 1.0), (Resource::Memory, 1.0)]
}

fn batch(n: usize) -> Vec<PipelineState> {
    (0..n)
        .map(|i| PipelineState::new(format!("request number {i}"), None, 0.5))
        .collect()
}

// ── Scheduling path ────────────────────────────────────────────

#[tokio::test]
async fn test_exact_solve_success_records_once() {
    let solver = Arc::new(CountingSolver::default());
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(solver.clone()),
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(2);
    let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();

    assert!(!result.fallback_used);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.breaker.status().total_successes, 1);
    assert_eq!(h.breaker.status().total_failures, 0);
    for (i, state) in states.iter().enumerate() {
        assert_eq!(result.schedule.assignments[i].request, i);
        assert!(state.stages_to_run().starts_with(&[Stage::Template]));
        assert_eq!(state.phase(), RequestPhase::Scheduled);
        assert!(!state.fallback_used);
    }
    assert_eq!(h.metrics.snapshot().counter("solver.success"), 1);
    assert_eq!(
        h.metrics.snapshot().gauge("resource.cpu.available_pct"),
        Some(100.0)
    );
}

#[tokio::test]
async fn test_resource_exhaustion_partial_schedule() {
    let h = harness(
        RuntimeConfig::default(),
        &[(Resource::Cpu, 0.05), (Resource::Memory, 0.05)],
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(3);
    let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();
    for state in &states {
        assert!(!state.stages_to_run().contains(&Stage::Detail));
        assert!(!state.stages_to_run().contains(&Stage::Optimize));
    }
    // At the minimal level a template costs 0.06 cpu, more than is left.
    assert_eq!(result.schedule.total_stages(), 0);
    assert!(!result.fallback_used);
}

#[tokio::test]
async fn test_open_breaker_skips_solver() {
    let solver = Arc::new(CountingSolver::default());
    let mut config = RuntimeConfig::default();
    config.optimizer_breaker = BreakerConfig::new(3, 3600.0);
    let h = harness(
        config,
        &ample(),
        Some(solver.clone()),
        Arc::new(ScriptedExecutor::default()),
    );
    h.breaker.trip();

    let mut states = batch(3);
    let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();

    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    assert!(result.fallback_used);
    assert_eq!(result.schedule.strategy_name, "greedy");
    assert_eq!(result.breaker_state, CircuitState::Open);
    for state in &states {
        assert!(state.fallback_used);
        assert_eq!(state.phase(), RequestPhase::FallbackScheduled);
    }
}

#[tokio::test]
async fn test_infeasible_records_one_failure() {
    let solver = Arc::new(CountingSolver::default());
    let mut config = RuntimeConfig::default();
    config.scheduler.require_template = true;
    let h = harness(
        config,
        &[(Resource::Cpu, 0.0), (Resource::Memory, 1.0)],
        Some(solver.clone()),
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(2);
    let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();

    assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.breaker.status().total_failures, 1);
    assert!(result.fallback_used);
    assert!(result.fallback_reason.unwrap().contains("INFEASIBLE"));
    for state in &states {
        assert!(state.stages_to_run().is_empty());
        assert!(state.fallback_used);
    }
    assert_eq!(h.metrics.snapshot().counter("solver.failure"), 1);
}

#[tokio::test]
async fn test_empty_batch_never_solves() {
    let solver = Arc::new(CountingSolver::default());
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(solver.clone()),
        Arc::new(ScriptedExecutor::default()),
    );
    let result = h.orchestrator.schedule_batch(&mut []).await.unwrap();
    assert!(result.schedule.is_empty());
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unavailable_solver_opens_breaker() {
    let solver = Arc::new(BrokenSolver::default());
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(solver.clone()),
        Arc::new(ScriptedExecutor::default()),
    );
    for _ in 0..3 {
        let mut states = batch(1);
        let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();
        assert!(result.fallback_used);
        assert_eq!(states[0].stages_to_run(), Stage::ALL);
    }
    assert_eq!(h.breaker.state(), CircuitState::Open);

    let mut states = batch(1);
    h.orchestrator.schedule_batch(&mut states).await.unwrap();
    assert_eq!(solver.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_solver_falls_back() {
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        None,
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(2);
    let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();
    assert!(result.fallback_used);
    assert!(states.iter().all(|s| s.fallback_used));
    assert_eq!(h.breaker.status().total_failures, 1);
}

#[tokio::test]
async fn test_solve_timeout_falls_back() {
    let mut config = RuntimeConfig::default();
    config.request.solve_timeout_ms = 50;
    let h = harness(
        config,
        &ample(),
        Some(Arc::new(SlowSolver)),
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(1);
    let start = Instant::now();
    let result = h.orchestrator.schedule_batch(&mut states).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(250));
    assert!(result.fallback_used);
    assert!(result.fallback_reason.unwrap().contains("50 ms"));
    assert_eq!(h.breaker.status().total_failures, 1);
}

#[tokio::test]
async fn test_model_errors_strict_and_lenient() {
    let mut states = batch(1);
    states[0].priority = f64::NAN;
    let lenient = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor::default()),
    );
    let result = lenient.orchestrator.schedule_batch(&mut states).await.unwrap();
    assert!(result.fallback_used);

    let mut config = RuntimeConfig::default();
    config.scheduler.strict_model_errors = true;
    let strict = harness(
        config,
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(1);
    states[0].priority = f64::NAN;
    let err = strict.orchestrator.schedule_batch(&mut states).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ScheduleError(_)));
}

// ── Generation path ────────────────────────────────────────────

#[tokio::test]
async fn test_generate_then_cache_hit() {
    let executor = Arc::new(ScriptedExecutor::default());
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        executor.clone(),
    );
    let first = h
        .orchestrator
        .generate_request("a red fox", Some("flat".into()), 0.5)
        .await
        .unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.stages_run, Stage::ALL.to_vec());
    assert!(first.artifact.content.contains("optimize"));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);

    let second = h
        .orchestrator
        .generate_request("a red fox", Some("flat".into()), 0.5)
        .await
        .unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.artifact, first.artifact);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);

    // A different style is a different key.
    let third = h
        .orchestrator
        .generate_request("a red fox", None, 0.5)
        .await
        .unwrap();
    assert!(!third.cache_hit);
    assert_eq!(h.metrics.snapshot().counter("cache.hit"), 1);
}

#[tokio::test]
async fn test_stage_failure_keeps_partial_output() {
    let executor = Arc::new(ScriptedExecutor {
        fail_stage: Some(Stage::Detail),
        ..Default::default()
    });
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        executor.clone(),
    );
    let result = h
        .orchestrator
        .generate_request("a red fox", None, 0.5)
        .await
        .unwrap();
    assert_eq!(result.stages_run, vec![Stage::Template]);
    assert!(result.artifact.content.contains("template"));
    assert!(result.error.unwrap().contains("renderer crashed"));
    assert!(!result.placeholder);
    assert_eq!(h.metrics.snapshot().counter("errors.detail.exit_status"), 1);

    // Partial results are not cached.
    let again = h
        .orchestrator
        .generate_request("a red fox", None, 0.5)
        .await
        .unwrap();
    assert!(!again.cache_hit);
}

#[tokio::test]
async fn test_total_failure_placeholder_or_error() {
    let failing = || {
        Arc::new(ScriptedExecutor {
            fail_stage: Some(Stage::Template),
            ..Default::default()
        })
    };
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        failing(),
    );
    let result = h
        .orchestrator
        .generate_request("a red fox", None, 0.5)
        .await
        .unwrap();
    assert!(result.placeholder);
    assert!(result.artifact.content.contains("a_red_fox"));
    assert!(result.stages_run.is_empty());

    let mut config = RuntimeConfig::default();
    config.request.placeholder_on_failure = false;
    let h = harness(
        config,
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        failing(),
    );
    let err = h
        .orchestrator
        .generate_request("a red fox", None, 0.5)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::StageFailed);
    assert!(err.message.contains("renderer crashed"));
}

#[tokio::test]
async fn test_batch_runs_concurrently_in_order() {
    let executor = Arc::new(ScriptedExecutor {
        delay: Duration::from_millis(100),
        ..Default::default()
    });
    let h = harness(
        RuntimeConfig::default(),
        &[(Resource::Cpu, 1.0), (Resource::Memory, 1.0), (Resource::Gpu, 1.0)],
        Some(Arc::new(CountingSolver::default())),
        executor,
    );
    let requests: Vec<_> = ["first cat", "second dog", "third owl"]
        .iter()
        .map(|p| GenerationRequest::new(*p, None, 0.5))
        .collect();
    let start = Instant::now();
    let results = h.orchestrator.generate_batch(requests).await;
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 3);
    let names: Vec<_> = results
        .iter()
        .map(|r| r.as_ref().unwrap().target_name.clone())
        .collect();
    assert_eq!(names, vec!["first_cat", "second_dog", "third_owl"]);
    let total_stages: usize = results
        .iter()
        .map(|r| r.as_ref().unwrap().stages_run.len())
        .sum();
    // Sequential execution would take total_stages × 100 ms.
    assert!(elapsed < Duration::from_millis(100 * total_stages as u64));
}

#[tokio::test]
async fn test_request_timeout_is_bounded() {
    let mut config = RuntimeConfig::default();
    config.request.timeout_secs = 0.2;
    let h = harness(
        config,
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor {
            delay: Duration::from_secs(5),
            ..Default::default()
        }),
    );
    let start = Instant::now();
    let err = h
        .orchestrator
        .generate_request("a red fox", None, 0.5)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_invalid_request_in_batch() {
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor::default()),
    );
    let results = h
        .orchestrator
        .generate_batch(vec![
            GenerationRequest::new("", None, 0.5),
            GenerationRequest::new("a blue whale", None, 0.5),
        ])
        .await;
    assert_eq!(results[0].as_ref().unwrap_err().code, ErrorCode::InvalidRequest);
    assert!(results[1].is_ok());
}

// ── Introspection and analysis ─────────────────────────────────

#[tokio::test]
async fn test_status_is_read_only() {
    let h = harness(
        RuntimeConfig::default(),
        &ample(),
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor::default()),
    );
    let before = h.orchestrator.status();
    assert_eq!(before.samples_taken, 0);
    assert_eq!(before.breaker.state, CircuitState::Closed);
    assert!(before.last_solve.is_none());

    h.orchestrator.schedule_batch(&mut batch(1)).await.unwrap();
    let after = h.orchestrator.status();
    assert_eq!(after.samples_taken, 1);
    assert_eq!(h.orchestrator.status().samples_taken, 1);
    assert_eq!(after.resources.get(Resource::Cpu), Some(100.0));
    assert_eq!(after.last_solve.as_ref().unwrap().solver, "counting");
    assert!(after.summary().contains("CLOSED"));
    let json = serde_json::to_value(&after).unwrap();
    assert_eq!(json["breaker"]["state"], "CLOSED");
}

#[tokio::test]
async fn test_analysis_and_what_if_after_solve() {
    let h = harness(
        RuntimeConfig::default(),
        &[(Resource::Cpu, 0.5), (Resource::Memory, 1.0)],
        Some(Arc::new(CountingSolver::default())),
        Arc::new(ScriptedExecutor::default()),
    );
    let mut states = batch(1);
    h.orchestrator.schedule_batch(&mut states).await.unwrap();
    assert_eq!(states[0].stages_to_run(), &[Stage::Template, Stage::Detail]);

    let outcome = h.orchestrator.analyze_last_solve().unwrap();
    assert!((outcome.report.objective - 0.4).abs() < 1e-6);
    assert!(!outcome.recommendations.is_empty());

    let what_if = h
        .orchestrator
        .what_if_last_solve(&["resource_cpu=1.0".to_string()])
        .unwrap();
    assert!((what_if.objective_delta.unwrap() - 0.1).abs() < 1e-6);
    assert_eq!(what_if.changed_requests, vec![0]);

    let err = h
        .orchestrator
        .what_if_last_solve(&["resource_bandwidth=1".to_string()])
        .unwrap_err();
    assert!(matches!(err, RuntimeError::AnalysisError(_)));
}

#[tokio::test]
async fn test_concurrent_batches_share_breaker() {
    let solver = Arc::new(BrokenSolver::default());
    let mut config = RuntimeConfig::default();
    config.optimizer_breaker = BreakerConfig::new(100, 60.0);
    let h = Arc::new(harness(
        config,
        &ample(),
        Some(solver.clone()),
        Arc::new(ScriptedExecutor::default()),
    ));
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                let mut states = batch(2);
                h.orchestrator.schedule_batch(&mut states).await.unwrap();
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(h.breaker.consecutive_failures(), 8);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 8);
}
