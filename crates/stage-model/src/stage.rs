// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The three canonical generation stages and their precedence order.
//!
//! ```text
//! template ──► detail ──► optimize
//! ```
//!
//! A request may only run a stage if every earlier stage also runs, so the
//! set of stages chosen for a request is always a prefix of [`Stage::ALL`].

use std::fmt;

/// One ordered phase of generating a request's output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial layout from the prompt. Required for any output at all.
    Template,
    /// Adds visual detail to the template.
    Detail,
    /// Refines the detailed output.
    Optimize,
}

impl Stage {
    /// All stages in canonical precedence order.
    pub const ALL: [Stage; 3] = [Stage::Template, Stage::Detail, Stage::Optimize];

    /// Position in the canonical order (0-based).
    pub fn index(&self) -> usize {
        match self {
            Self::Template => 0,
            Self::Detail => 1,
            Self::Optimize => 2,
        }
    }

    /// The stage that must run before this one, if any.
    pub fn predecessor(&self) -> Option<Stage> {
        match self {
            Self::Template => None,
            Self::Detail => Some(Self::Template),
            Self::Optimize => Some(Self::Detail),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Detail => "detail",
            Self::Optimize => "optimize",
        }
    }

    /// Parses a stage name, accepting common aliases.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "template" | "layout" => Some(Self::Template),
            "detail" | "enhance" | "enhanced" => Some(Self::Detail),
            "optimize" | "optimise" | "optimized" => Some(Self::Optimize),
            _ => None,
        }
    }

    /// The first `len` stages of the canonical order.
    pub fn prefix(len: usize) -> Vec<Stage> {
        Self::ALL.iter().take(len).copied().collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` if `stages` equals the first `stages.len()` canonical stages.
///
/// The empty list is a valid prefix.
pub fn is_canonical_prefix(stages: &[Stage]) -> bool {
    stages.len() <= Stage::ALL.len() && stages.iter().zip(Stage::ALL.iter()).all(|(a, b)| a == b)
}

/// A fixed-size table with one entry per stage.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageTable<T> {
    pub template: T,
    pub detail: T,
    pub optimize: T,
}

impl<T> StageTable<T> {
    pub fn get(&self, stage: Stage) -> &T {
        match stage {
            Stage::Template => &self.template,
            Stage::Detail => &self.detail,
            Stage::Optimize => &self.optimize,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut T {
        match stage {
            Stage::Template => &mut self.template,
            Stage::Detail => &mut self.detail,
            Stage::Optimize => &mut self.optimize,
        }
    }

    /// Applies `f` to every entry, keeping stage alignment.
    pub fn map<U>(&self, mut f: impl FnMut(Stage, &T) -> U) -> StageTable<U> {
        StageTable {
            template: f(Stage::Template, &self.template),
            detail: f(Stage::Detail, &self.detail),
            optimize: f(Stage::Optimize, &self.optimize),
        }
    }

    /// Iterates `(stage, entry)` in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &T)> {
        Stage::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}
