// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exact scheduling via integer programming.
//!
//! Builds a [`ScheduleModel`] and hands it to a [`Solver`]. Only an
//! optimal or feasible status is turned into a schedule; any other
//! outcome is an error so the caller can fall back rather than act on a
//! guessed assignment.

use crate::model::{ScheduleModel, SolvedModel};
use crate::strategy::ScheduleStrategy;
use crate::{Assignment, Schedule, SchedulerConfig, ScheduleError};
use lp_solver::{Solver, SolverError};
use resource_monitor::ResourceSnapshot;
use stage_model::PipelineState;
use std::sync::Arc;
use std::time::Instant;

/// Solver-backed scheduler.
#[derive(Clone)]
pub struct ExactScheduler {
    solver: Option<Arc<dyn Solver>>,
    config: SchedulerConfig,
}

impl ExactScheduler {
    /// Creates a scheduler over an explicit solver. `None` models a
    /// missing backend: every solve then fails with
    /// [`ScheduleError::SolverUnavailable`].
    pub fn new(solver: Option<Arc<dyn Solver>>, config: SchedulerConfig) -> Self {
        Self { solver, config }
    }

    /// Creates the solver named in `config`.
    pub fn from_config(config: SchedulerConfig) -> Self {
        let solver = match config.create_solver() {
            Ok(solver) => Some(solver),
            Err(e) => {
                tracing::debug!("exact scheduler built without a solver: {e}");
                None
            }
        };
        Self::new(solver, config)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn solver(&self) -> Option<&Arc<dyn Solver>> {
        self.solver.as_ref()
    }

    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// Formulates the program without solving it.
    pub fn build_model(
        &self,
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<ScheduleModel, ScheduleError> {
        ScheduleModel::build(requests, snapshot, &self.config)
    }

    /// Solves a built model. The returned model may carry any status;
    /// use [`ExactScheduler::extract`] to turn it into a schedule.
    pub fn solve_model(&self, model: ScheduleModel) -> Result<SolvedModel, ScheduleError> {
        let solver = self.solver.as_ref().ok_or_else(|| {
            ScheduleError::SolverUnavailable(format!(
                "no solver backend (configured: '{}')",
                self.config.solver
            ))
        })?;

        let start = Instant::now();
        let solution = solver.solve(&model.problem).map_err(|e| match e {
            SolverError::Unavailable(reason) => ScheduleError::SolverUnavailable(reason),
            other => ScheduleError::Solver(other),
        })?;
        let solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        tracing::debug!(
            "{} requests solved by {} in {solve_time_ms:.2} ms: {}",
            model.num_requests(),
            solver.name(),
            solution.summary()
        );

        Ok(SolvedModel {
            model,
            solution,
            solver_name: solver.name().to_string(),
            solve_time_ms,
        })
    }

    /// Converts a solved model into a schedule.
    ///
    /// # Errors
    /// [`ScheduleError::Infeasible`] unless the status is optimal or feasible.
    pub fn extract(&self, solved: &SolvedModel) -> Result<Schedule, ScheduleError> {
        let status = solved.status();
        if !status.has_solution() {
            return Err(ScheduleError::Infeasible { status });
        }
        let assignments = solved
            .stages_per_request()
            .into_iter()
            .enumerate()
            .map(|(request, stages)| Assignment { request, stages })
            .collect();
        Ok(Schedule {
            strategy_name: self.name().to_string(),
            level: solved.model.index.level,
            objective: solved.solution.objective.unwrap_or(0.0),
            assignments,
        })
    }

    /// Builds, solves and extracts in one call, also returning the solved
    /// model for later analysis. Empty batches never reach the solver.
    pub fn schedule_with_model(
        &self,
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<(Schedule, Option<SolvedModel>), ScheduleError> {
        if requests.is_empty() {
            let level = self.config.bands.classify(snapshot);
            return Ok((Schedule::empty(self.name(), level), None));
        }
        let model = self.build_model(requests, snapshot)?;
        let solved = self.solve_model(model)?;
        let schedule = self.extract(&solved)?;
        Ok((schedule, Some(solved)))
    }
}

impl ScheduleStrategy for ExactScheduler {
    fn name(&self) -> &str {
        "exact"
    }

    fn schedule(
        &self,
        requests: &[PipelineState],
        snapshot: &ResourceSnapshot,
    ) -> Result<Schedule, ScheduleError> {
        self.schedule_with_model(requests, snapshot)
            .map(|(schedule, _)| schedule)
    }
}

impl std::fmt::Debug for ExactScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactScheduler")
            .field("solver", &self.solver.as_ref().map(|s| s.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_solver::{Problem, Solution, SolveStatus, SolverError};
    use resource_monitor::Resource;
    use stage_model::Stage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSolver {
        inner: lp_solver::BranchAndBound,
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

    struct FixedStatus(SolveStatus);

    impl Solver for FixedStatus {
        fn name(&self) -> &str {
            "fixed"
        }

        fn solve(&self, _problem: &Problem) -> Result<Solution, SolverError> {
            Ok(Solution::empty(self.0, 1, 0))
        }
    }

    fn batch(priorities: &[f64]) -> Vec<PipelineState> {
        priorities
            .iter()
            .enumerate()
            .map(|(i, p)| PipelineState::new(format!("request {i}"), None, *p))
            .collect()
    }

    fn counting() -> Arc<CountingSolver> {
        Arc::new(CountingSolver {
            inner: lp_solver::BranchAndBound::default(),
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_two_requests_full_resources() {
        let solver = counting();
        let exact = ExactScheduler::new(Some(solver.clone() as Arc<dyn Solver>), SchedulerConfig::default());
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0), (Resource::Memory, 1.0)]);
        let reqs = batch(&[0.5, 0.5]);

        let schedule = exact.schedule(&reqs, &snap).unwrap();
        assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(schedule.len(), 2);
        for a in &schedule.assignments {
            assert!(a.stages.contains(&Stage::Template));
        }
        // Both requests at template + detail (0.5 · 0.8 each) beats one full
        // request plus one template (0.5 · 1.0 + 0.5 · 0.5).
        assert!((schedule.objective - 0.8).abs() < 1e-9);
        schedule
            .validate(&reqs, &snap, &exact.config().cost)
            .unwrap();
    }

    #[test]
    fn test_empty_batch_skips_solver() {
        let solver = counting();
        let exact = ExactScheduler::new(Some(solver.clone() as Arc<dyn Solver>), SchedulerConfig::default());
        let schedule = exact
            .schedule(&[], &ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0)]))
            .unwrap();
        assert!(schedule.is_empty());
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_exhausted_resources_schedule_nothing() {
        let exact = ExactScheduler::from_config(SchedulerConfig::default());
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 0.05), (Resource::Memory, 0.05)]);
        let schedule = exact.schedule(&batch(&[0.5, 0.9]), &snap).unwrap();
        assert!(schedule.assignments.iter().all(|a| a.stages.is_empty()));
    }

    #[test]
    fn test_no_gpu_still_runs_detail() {
        let exact = ExactScheduler::from_config(SchedulerConfig::default());
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0), (Resource::Memory, 1.0)]);
        let schedule = exact.schedule(&batch(&[1.0]), &snap).unwrap();
        assert_eq!(schedule.assignments[0].stages, Stage::ALL.to_vec());
    }

    #[test]
    fn test_gpu_limits_detail() {
        let exact = ExactScheduler::from_config(SchedulerConfig::default());
        // 30% GPU classifies as medium; detail then needs 0.5 · 0.8 = 0.4.
        let snap = ResourceSnapshot::from_fractions([
            (Resource::Cpu, 1.0),
            (Resource::Memory, 1.0),
            (Resource::Gpu, 0.3),
        ]);
        let schedule = exact.schedule(&batch(&[1.0]), &snap).unwrap();
        assert_eq!(schedule.assignments[0].stages, vec![Stage::Template]);
    }

    #[test]
    fn test_order_preserved() {
        let exact = ExactScheduler::from_config(SchedulerConfig::default());
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 0.55), (Resource::Memory, 1.0)]);
        // Only the high-priority request (last) should get detail.
        let schedule = exact.schedule(&batch(&[0.1, 0.1, 1.0]), &snap).unwrap();
        let indices: Vec<usize> = schedule.assignments.iter().map(|a| a.request).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(schedule.assignments[2].stages.len() >= 2);
    }

    #[test]
    fn test_missing_solver() {
        let exact = ExactScheduler::new(None, SchedulerConfig::default());
        let err = exact
            .schedule(&batch(&[0.5]), &ResourceSnapshot::new())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::SolverUnavailable(_)));
    }

    #[test]
    fn test_bad_status_is_infeasible_error() {
        for status in [SolveStatus::Infeasible, SolveStatus::Unbounded, SolveStatus::NotSolved] {
            let exact = ExactScheduler::new(
                Some(Arc::new(FixedStatus(status)) as Arc<dyn Solver>),
                SchedulerConfig::default(),
            );
            let err = exact
                .schedule(&batch(&[0.5]), &ResourceSnapshot::new())
                .unwrap_err();
            assert!(matches!(err, ScheduleError::Infeasible { status: s } if s == status));
        }
    }

    #[test]
    fn test_required_template_without_cpu_is_infeasible() {
        let config = SchedulerConfig {
            require_template: true,
            ..Default::default()
        };
        let exact = ExactScheduler::from_config(config);
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 0.0), (Resource::Memory, 1.0)]);
        let err = exact.schedule(&batch(&[0.5, 0.5]), &snap).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Infeasible {
                status: SolveStatus::Infeasible
            }
        ));
    }

    #[test]
    fn test_schedule_with_model_keeps_solution() {
        let exact = ExactScheduler::from_config(SchedulerConfig::default());
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 1.0)]);
        let (schedule, solved) = exact.schedule_with_model(&batch(&[0.5]), &snap).unwrap();
        let solved = solved.unwrap();
        assert_eq!(solved.status(), SolveStatus::Optimal);
        assert_eq!(solved.stages_per_request()[0], schedule.assignments[0].stages);
    }
}
