// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stage-model
//!
//! Data types shared by the schedulers and the orchestrator.
//!
//! - [`Stage`]: the three canonical generation stages and their order.
//! - [`ResourceVector`]: per-stage resource demand along cpu, memory,
//!   gpu and vram, with the default requirement and quality tables.
//! - [`PipelineState`]: one request's inputs, chosen stages, outputs and
//!   error bookkeeping.
//! - [`RequestPhase`]: the request lifecycle state machine.
//!
//! # Invariants
//! - Any stage list stored on a request is a prefix of
//!   `template → detail → optimize`.
//! - A later stage output is only accepted once every earlier stage has
//!   produced non-empty output.
//! - The first recorded error is never silently replaced.

mod error;
mod phase;
mod requirements;
mod stage;
mod state;

pub use error::StateError;
pub use phase::RequestPhase;
pub use requirements::{
    default_quality_weights, default_requirements, total_requirement, ResourceVector,
};
pub use stage::{is_canonical_prefix, Stage, StageTable};
pub use state::{
    derive_target_name, PipelineState, ResourceLevel, StageArtifact, DEFAULT_PRIORITY,
    MAX_ERROR_DETAIL_CHARS, MAX_TARGET_NAME_CHARS,
};
