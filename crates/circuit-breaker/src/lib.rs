// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # circuit-breaker
//!
//! Stops calling an unreliable subsystem after repeated consecutive
//! failures, then periodically lets a probe through to detect recovery.
//!
//! Thresholds are configuration. [`BreakerConfig`] ships presets for the
//! services a generation pipeline protects:
//!
//! | Preset | Failures | Cooldown |
//! |---|---|---|
//! | [`BreakerConfig::cloud_api`] | 3 | 60 s |
//! | [`BreakerConfig::local_compute`] | 5 | 300 s |
//! | [`BreakerConfig::optimizer`] | 3 | 30 s |
//!
//! # Example
//! ```
//! use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
//!
//! let breaker = CircuitBreaker::new("optimizer", BreakerConfig::optimizer());
//! for _ in 0..3 {
//!     breaker.record_failure();
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.allow_request());
//! ```

mod breaker;
mod config;
mod error;

pub use breaker::{BreakerStatus, CircuitBreaker, CircuitState};
pub use config::BreakerConfig;
pub use error::BreakerError;
