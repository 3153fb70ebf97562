// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the circuit breaker.

/// Errors from breaker configuration.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError {
    /// The failure threshold must allow at least one failure.
    #[error("breaker '{name}': failure threshold must be at least 1")]
    ZeroThreshold { name: String },

    /// The reset timeout is negative or not a number.
    #[error("breaker '{name}': reset timeout must be a finite, non-negative number of seconds, got {secs}")]
    InvalidTimeout { name: String, secs: f64 },
}
