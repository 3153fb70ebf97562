// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for resource monitoring.

/// Errors that can occur when reading system resources.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Failed to read a procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse a numeric value from a system file or tool output.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },

    /// The expected procfs path or tool does not exist on this host.
    #[error("resource source not available: {path}")]
    NotAvailable { path: String },
}
