// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The breaker state machine.
//!
//! ```text
//!            failures ≥ threshold
//!   CLOSED ─────────────────────────► OPEN
//!     ▲                                │ allow_request() after cooldown
//!     │ record_success()               ▼
//!     └──────────────────────────── HALF_OPEN
//!                                      │ record_failure()
//!                                      └──────────► OPEN
//! ```

use crate::BreakerConfig;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// The cooldown elapsed; probe calls are let through.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, for status reporting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub reset_timeout_secs: f64,
    pub secs_since_last_failure: Option<f64>,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Number of CLOSED/HALF_OPEN → OPEN transitions.
    pub times_opened: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    total_successes: u64,
    total_failures: u64,
    times_opened: u64,
}

/// Consecutive-failure circuit breaker.
///
/// All state lives behind one mutex, so concurrent callers never lose a
/// failure increment or observe a half-applied transition. Share it with
/// an `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                total_successes: 0,
                total_failures: 0,
                times_opened: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Every transition completes before the guard drops, so a poisoned
    /// lock still holds consistent counters.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, without applying the cooldown transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Whether a call may proceed.
    ///
    /// An open breaker whose cooldown has strictly elapsed since the last
    /// failure moves to half-open and admits the call.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = inner
                    .last_failure
                    .map_or(true, |t| t.elapsed() > self.config.reset_timeout());
                if cooled {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!("circuit '{}' OPEN → HALF_OPEN, probing", self.name);
                }
                cooled
            }
        }
    }

    /// Resets the failure count and closes the breaker.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        inner.total_successes += 1;
        if inner.state != CircuitState::Closed {
            tracing::info!("circuit '{}' {} → CLOSED", self.name, inner.state);
            inner.state = CircuitState::Closed;
        }
    }

    /// Counts a failure, opening the breaker at the threshold or on a
    /// failed probe.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.total_failures += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                inner.times_opened += 1;
                tracing::warn!(
                    "circuit '{}' CLOSED → OPEN after {} consecutive failures; retry in {:.0}s",
                    self.name,
                    inner.consecutive_failures,
                    self.config.reset_timeout_secs
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.times_opened += 1;
                tracing::warn!("circuit '{}' HALF_OPEN → OPEN, probe failed", self.name);
            }
            _ => {}
        }
    }

    /// Forces the breaker open as if it had just failed.
    pub fn trip(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            inner.times_opened += 1;
        }
        inner.state = CircuitState::Open;
        inner.last_failure = Some(Instant::now());
        tracing::warn!("circuit '{}' forced OPEN", self.name);
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.lock();
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_secs: self.config.reset_timeout_secs,
            secs_since_last_failure: inner.last_failure.map(|t| t.elapsed().as_secs_f64()),
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            times_opened: inner.times_opened,
        }
    }
}
