// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stage execution.
//!
//! The orchestrator only decides which stages run; producing the artwork
//! belongs to a [`StageExecutor`]. Each stage is invoked on its own, with
//! the previous stage's artifact as input, and must answer within the
//! timeout carried by the [`StageRequest`].
//!
//! [`CommandExecutor`] runs one external program per stage: the request is
//! written to stdin as JSON, and stdout is either a JSON
//! [`StageArtifact`] or raw SVG markup.

use crate::{CommandSpec, ExecutorConfig, RuntimeError};
use async_trait::async_trait;
use stage_model::{ResourceLevel, Stage, StageArtifact};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Default upper bound on captured stdout or stderr per stage.
const MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

/// Read size while draining a stage's pipes.
const READ_CHUNK: usize = 8 * 1024;

/// Characters of stderr kept in a failure reason.
const MAX_STDERR_CHARS: usize = 2000;

/// Input to one stage invocation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageRequest {
    pub prompt: String,
    pub style: Option<String>,
    pub target_name: String,
    pub stage: Stage,
    pub level: Option<ResourceLevel>,
    /// Output of the preceding stage; `None` for the template stage.
    pub previous: Option<StageArtifact>,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

/// Why a stage produced no artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No executor is configured for the stage.
    NotConfigured,
    /// The stage could not be started.
    Spawn,
    /// The stage ran past its timeout and was killed.
    Timeout,
    /// The stage exited unsuccessfully.
    ExitStatus,
    /// The stage succeeded but returned no content.
    EmptyOutput,
    /// The stage wrote more than the capture limit to stdout.
    OutputTooLarge,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Spawn => "spawn",
            Self::Timeout => "timeout",
            Self::ExitStatus => "exit_status",
            Self::EmptyOutput => "empty_output",
            Self::OutputTooLarge => "output_too_large",
        }
    }
}

/// Failure signal from a stage, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, thiserror::Error)]
#[error("{kind:?}: {reason}")]
pub struct StageFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// Raw diagnostic output, if the stage produced any.
    pub detail: Option<String>,
}

impl StageFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Runs a single stage for a single request.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Human-readable name of this executor.
    fn name(&self) -> &str;

    /// Produces the stage's artifact or reports why it could not.
    async fn execute(&self, request: StageRequest) -> Result<StageArtifact, StageFailure>;
}

/// Runs a configured external command per stage.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    commands: BTreeMap<Stage, CommandSpec>,
    max_output_bytes: usize,
}

impl CommandExecutor {
    pub fn new(commands: BTreeMap<Stage, CommandSpec>) -> Self {
        Self {
            commands,
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }

    /// Caps how much of each stream is kept. Output past the cap is still
    /// drained so the stage never blocks on a full pipe.
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self, RuntimeError> {
        Ok(Self::new(config.commands()?))
    }

    /// Stages that have a command configured.
    pub fn configured_stages(&self) -> Vec<Stage> {
        self.commands.keys().copied().collect()
    }
}

#[async_trait]
impl StageExecutor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(&self, request: StageRequest) -> Result<StageArtifact, StageFailure> {
        let spec = self.commands.get(&request.stage).ok_or_else(|| {
            StageFailure::new(
                FailureKind::NotConfigured,
                format!("no command configured for stage '{}'", request.stage),
            )
        })?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            StageFailure::new(FailureKind::Spawn, format!("cannot start '{}': {e}", spec.program))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&request).map_err(|e| {
                StageFailure::new(FailureKind::Spawn, format!("cannot encode request: {e}"))
            })?;
            // The stage may close stdin early; its exit status decides the outcome.
            let _ = stdin.write_all(&payload).await;
            drop(stdin);
        }

        let cap = self.max_output_bytes;
        let stdout_task = tokio::spawn(read_stream(child.stdout.take(), cap));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take(), cap));

        // On timeout `child` is dropped here and killed.
        let status = match tokio::time::timeout(request.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(StageFailure::new(
                    FailureKind::Spawn,
                    format!("waiting for '{}' failed: {e}", spec.program),
                ))
            }
            Err(_) => {
                return Err(StageFailure::new(
                    FailureKind::Timeout,
                    format!(
                        "stage '{}' exceeded {:.1}s",
                        request.stage,
                        request.timeout.as_secs_f64()
                    ),
                ))
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr.bytes).into_owned();
        tracing::debug!(
            "stage '{}' for '{}' exited with {status} after {:.0}ms",
            request.stage,
            request.target_name,
            start.elapsed().as_secs_f64() * 1000.0
        );

        if !status.success() {
            let mut failure = StageFailure::new(
                FailureKind::ExitStatus,
                format!("stage '{}' exited with {status}", request.stage),
            );
            if !stderr.trim().is_empty() {
                failure = failure.with_detail(stderr.trim().chars().take(MAX_STDERR_CHARS).collect::<String>());
            }
            return Err(failure);
        }

        if stdout.overflowed {
            return Err(StageFailure::new(
                FailureKind::OutputTooLarge,
                format!(
                    "stage '{}' wrote more than {} bytes to stdout",
                    request.stage, self.max_output_bytes
                ),
            ));
        }

        let artifact = parse_output(&String::from_utf8_lossy(&stdout.bytes));
        if artifact.is_empty() {
            return Err(StageFailure::new(
                FailureKind::EmptyOutput,
                format!("stage '{}' produced no content", request.stage),
            ));
        }
        Ok(artifact)
    }
}

/// A JSON artifact if stdout is one, otherwise the trimmed text as markup.
fn parse_output(stdout: &str) -> StageArtifact {
    let trimmed = stdout.trim();
    if trimmed.starts_with('{') {
        if let Ok(artifact) = serde_json::from_str::<StageArtifact>(trimmed) {
            return artifact;
        }
    }
    StageArtifact::new(trimmed)
}

/// Bytes kept from one stream, and whether more were discarded.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// Reads the stream to EOF, keeping at most `cap` bytes.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, cap: usize) -> Captured {
    let mut captured = Captured::default();
    let Some(mut h) = handle else {
        return captured;
    };
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let room = cap.saturating_sub(captured.bytes.len());
        if n > room {
            captured.overflowed = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
    captured
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !(secs.is_finite() && secs >= 0.0) {
            return Err(serde::de::Error::custom(format!("invalid timeout {secs}")));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
