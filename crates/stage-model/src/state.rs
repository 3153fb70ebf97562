// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-request pipeline state.
//!
//! A [`PipelineState`] is owned by the orchestrator for the lifetime of one
//! request. Schedulers write the chosen stage list into it; the stage
//! executor fills in outputs as stages complete.

use crate::{is_canonical_prefix, RequestPhase, Stage, StateError};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Maximum number of characters kept in [`PipelineState::error_detail`].
pub const MAX_ERROR_DETAIL_CHARS: usize = 1000;

/// Maximum length of a derived target name.
pub const MAX_TARGET_NAME_CHARS: usize = 64;

/// Default priority for requests that do not specify one.
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// Quality level derived from system pressure at scheduling time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceLevel {
    High,
    Medium,
    Low,
    Minimal,
}

impl ResourceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
        }
    }

    /// One band lower, saturating at `Minimal`.
    pub fn downgraded(&self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium => Self::Low,
            Self::Low | Self::Minimal => Self::Minimal,
        }
    }
}

impl fmt::Display for ResourceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one stage: vector markup plus optional raster preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageArtifact {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster: Option<Vec<u8>>,
}

impl StageArtifact {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            raster: None,
        }
    }

    pub fn with_raster(mut self, raster: Vec<u8>) -> Self {
        self.raster = Some(raster);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// One generation request and everything recorded about it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineState {
    pub prompt: String,
    pub style: Option<String>,
    /// Filesystem/log-safe identifier derived from the prompt.
    pub target_name: String,

    template_output: Option<StageArtifact>,
    enhanced_output: Option<StageArtifact>,
    optimized_output: Option<StageArtifact>,

    pub resource_level: Option<ResourceLevel>,
    stages_to_run: Vec<Stage>,
    stages_run: Vec<Stage>,
    pub stage_durations: BTreeMap<Stage, f64>,

    error: Option<String>,
    error_detail: Option<String>,

    pub priority: f64,
    pub fallback_used: bool,
    phase: RequestPhase,
}

impl PipelineState {
    /// Creates a fresh request. `priority` is clamped to `[0, 1]`;
    /// non-finite values fall back to [`DEFAULT_PRIORITY`].
    pub fn new(prompt: impl Into<String>, style: Option<String>, priority: f64) -> Self {
        let prompt = prompt.into();
        let priority = if priority.is_finite() {
            priority.clamp(0.0, 1.0)
        } else {
            DEFAULT_PRIORITY
        };
        Self {
            target_name: derive_target_name(&prompt),
            prompt,
            style,
            template_output: None,
            enhanced_output: None,
            optimized_output: None,
            resource_level: None,
            stages_to_run: Vec::new(),
            stages_run: Vec::new(),
            stage_durations: BTreeMap::new(),
            error: None,
            error_detail: None,
            priority,
            fallback_used: false,
            phase: RequestPhase::Submitted,
        }
    }

    /// Whitespace-separated word count of the prompt.
    pub fn word_count(&self) -> usize {
        self.prompt.split_whitespace().count()
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// Moves the request to `next`, rejecting transitions the lifecycle
    /// does not allow.
    pub fn advance(&mut self, next: RequestPhase) -> Result<(), StateError> {
        if !self.phase.can_transition_to(next) {
            return Err(StateError::IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("request '{}': {} → {}", self.target_name, self.phase, next);
        self.phase = next;
        Ok(())
    }

    pub fn stages_to_run(&self) -> &[Stage] {
        &self.stages_to_run
    }

    pub fn stages_run(&self) -> &[Stage] {
        &self.stages_run
    }

    /// Records a scheduling decision.
    pub fn set_schedule(
        &mut self,
        level: ResourceLevel,
        stages: Vec<Stage>,
        fallback_used: bool,
    ) -> Result<(), StateError> {
        if !is_canonical_prefix(&stages) {
            return Err(StateError::NotAPrefix(stages));
        }
        self.resource_level = Some(level);
        self.stages_to_run = stages;
        self.fallback_used = fallback_used;
        Ok(())
    }

    /// The recorded output of `stage`, if any.
    pub fn output(&self, stage: Stage) -> Option<&StageArtifact> {
        match stage {
            Stage::Template => self.template_output.as_ref(),
            Stage::Detail => self.enhanced_output.as_ref(),
            Stage::Optimize => self.optimized_output.as_ref(),
        }
    }

    fn output_slot(&mut self, stage: Stage) -> &mut Option<StageArtifact> {
        match stage {
            Stage::Template => &mut self.template_output,
            Stage::Detail => &mut self.enhanced_output,
            Stage::Optimize => &mut self.optimized_output,
        }
    }

    /// Stores a completed stage's output.
    ///
    /// The predecessor stage must already hold a non-empty output, so
    /// outputs always fill in as a prefix of the canonical order.
    pub fn record_stage_output(
        &mut self,
        stage: Stage,
        artifact: StageArtifact,
        elapsed: Duration,
    ) -> Result<(), StateError> {
        if let Some(prev) = stage.predecessor() {
            if self.output(prev).map_or(true, StageArtifact::is_empty) {
                return Err(StateError::MissingPredecessor {
                    stage,
                    missing: prev,
                });
            }
        }
        let slot = self.output_slot(stage);
        if slot.is_some() {
            return Err(StateError::StageAlreadyRecorded(stage));
        }
        *slot = Some(artifact);
        self.stages_run.push(stage);
        self.stage_durations.insert(stage, elapsed.as_secs_f64());
        Ok(())
    }

    /// Output of the last stage that produced non-empty content.
    pub fn final_output(&self) -> Option<&StageArtifact> {
        Stage::ALL
            .iter()
            .rev()
            .filter_map(|s| self.output(*s))
            .find(|a| !a.is_empty())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Records a failure. The first error wins; later ones are logged and
    /// dropped. Returns `true` if this error was stored.
    pub fn record_error(&mut self, message: impl Into<String>, detail: Option<&str>) -> bool {
        let message = message.into();
        if let Some(existing) = &self.error {
            tracing::warn!(
                "request '{}' already failed with '{}'; not overwriting with '{}'",
                self.target_name,
                existing,
                message
            );
            return false;
        }
        self.error = Some(message);
        self.error_detail = detail.map(|d| truncate_chars(d, MAX_ERROR_DETAIL_CHARS));
        true
    }

    /// Clears outputs and bookkeeping so the request can be scheduled again.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.prompt), self.style.take(), self.priority);
    }
}

/// Lowercase alphanumerics joined by single underscores, at most
/// [`MAX_TARGET_NAME_CHARS`] long, `"untitled"` when nothing survives.
pub fn derive_target_name(prompt: &str) -> String {
    let mut name = String::new();
    let mut pending_sep = false;
    for c in prompt.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !name.is_empty() {
                name.push('_');
            }
            pending_sep = false;
            name.push(c);
        } else {
            pending_sep = true;
        }
        if name.len() >= MAX_TARGET_NAME_CHARS {
            break;
        }
    }
    name.truncate(MAX_TARGET_NAME_CHARS);
    let trimmed = name.trim_end_matches('_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svg(tag: &str) -> StageArtifact {
        StageArtifact::new(format!("<svg><{tag}/></svg>"))
    }

    #[test]
    fn test_new_clamps_priority() {
        assert_eq!(PipelineState::new("a", None, 3.0).priority, 1.0);
        assert_eq!(PipelineState::new("a", None, -1.0).priority, 0.0);
        assert_eq!(PipelineState::new("a", None, f64::NAN).priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_target_name() {
        assert_eq!(derive_target_name("A Red  Fox!"), "a_red_fox");
        assert_eq!(derive_target_name("  ???  "), "untitled");
        assert_eq!(derive_target_name(&"x".repeat(200)).len(), MAX_TARGET_NAME_CHARS);
        assert!(!derive_target_name(&"ab ".repeat(40)).ends_with('_'));
    }

    #[test]
    fn test_word_count() {
        let s = PipelineState::new("a cat  sitting\ton a mat", None, 0.5);
        assert_eq!(s.word_count(), 6);
    }

    #[test]
    fn test_outputs_fill_as_prefix() {
        let mut s = PipelineState::new("cat", None, 0.5);
        let err = s
            .record_stage_output(Stage::Detail, svg("d"), Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::MissingPredecessor {
                missing: Stage::Template,
                ..
            }
        ));

        s.record_stage_output(Stage::Template, svg("t"), Duration::from_millis(10))
            .unwrap();
        s.record_stage_output(Stage::Detail, svg("d"), Duration::from_millis(20))
            .unwrap();
        assert_eq!(s.stages_run(), &[Stage::Template, Stage::Detail]);
        assert!((s.stage_durations[&Stage::Detail] - 0.02).abs() < 1e-9);
        assert_eq!(s.final_output(), Some(&svg("d")));
    }

    #[test]
    fn test_empty_predecessor_blocks_successor() {
        let mut s = PipelineState::new("cat", None, 0.5);
        s.record_stage_output(Stage::Template, StageArtifact::new("  "), Duration::ZERO)
            .unwrap();
        assert!(s
            .record_stage_output(Stage::Detail, svg("d"), Duration::ZERO)
            .is_err());
        assert!(s.final_output().is_none());
    }

    #[test]
    fn test_stage_recorded_twice() {
        let mut s = PipelineState::new("cat", None, 0.5);
        s.record_stage_output(Stage::Template, svg("t"), Duration::ZERO)
            .unwrap();
        assert!(matches!(
            s.record_stage_output(Stage::Template, svg("t2"), Duration::ZERO),
            Err(StateError::StageAlreadyRecorded(Stage::Template))
        ));
    }

    #[test]
    fn test_first_error_wins() {
        let mut s = PipelineState::new("cat", None, 0.5);
        assert!(s.record_error("template failed", Some("boom")));
        assert!(!s.record_error("detail failed", None));
        assert_eq!(s.error(), Some("template failed"));
        assert_eq!(s.error_detail(), Some("boom"));
    }

    #[test]
    fn test_error_detail_is_bounded() {
        let mut s = PipelineState::new("cat", None, 0.5);
        let long = "é".repeat(5000);
        s.record_error("oops", Some(&long));
        assert_eq!(s.error_detail().unwrap().chars().count(), MAX_ERROR_DETAIL_CHARS);
    }

    #[test]
    fn test_set_schedule_rejects_non_prefix() {
        let mut s = PipelineState::new("cat", None, 0.5);
        assert!(s
            .set_schedule(ResourceLevel::High, vec![Stage::Detail], false)
            .is_err());
        s.set_schedule(ResourceLevel::Low, vec![Stage::Template], true)
            .unwrap();
        assert_eq!(s.stages_to_run(), &[Stage::Template]);
        assert_eq!(s.resource_level, Some(ResourceLevel::Low));
        assert!(s.fallback_used);
    }

    #[test]
    fn test_advance_validates() {
        let mut s = PipelineState::new("cat", None, 0.5);
        assert!(s.advance(RequestPhase::Scheduled).is_err());
        s.advance(RequestPhase::FallbackScheduled).unwrap();
        s.advance(RequestPhase::StagesExecuting).unwrap();
        assert_eq!(s.phase(), RequestPhase::StagesExecuting);
    }

    #[test]
    fn test_reset_keeps_inputs() {
        let mut s = PipelineState::new("a cat", Some("flat".into()), 0.9);
        s.record_error("x", None);
        s.advance(RequestPhase::FallbackScheduled).unwrap();
        s.reset();
        assert_eq!(s.prompt, "a cat");
        assert_eq!(s.style.as_deref(), Some("flat"));
        assert_eq!(s.priority, 0.9);
        assert!(s.error().is_none());
        assert_eq!(s.phase(), RequestPhase::Submitted);
    }

    #[test]
    fn test_level_downgrade() {
        assert_eq!(ResourceLevel::High.downgraded(), ResourceLevel::Medium);
        assert_eq!(ResourceLevel::Minimal.downgraded(), ResourceLevel::Minimal);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut s = PipelineState::new("cat", None, 0.5);
        s.record_stage_output(Stage::Template, svg("t"), Duration::from_millis(500))
            .unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: PipelineState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
