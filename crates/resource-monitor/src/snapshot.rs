// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Point-in-time view of resource availability.
//!
//! A [`ResourceSnapshot`] maps each detected [`Resource`] to the percentage
//! of it that is currently available. It is the only type the schedulers
//! consume from this crate. Resources that were not detected are simply
//! absent: consumers must skip them rather than read them as zero.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A monitored system resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
    Swap,
    Gpu,
    Vram,
}

impl Resource {
    /// Every resource, in reporting order.
    pub const ALL: [Resource; 5] = [
        Resource::Cpu,
        Resource::Memory,
        Resource::Swap,
        Resource::Gpu,
        Resource::Vram,
    ];

    /// Resources that stages consume and schedulers constrain.
    ///
    /// Swap only feeds level classification.
    pub const SCHEDULABLE: [Resource; 4] =
        [Resource::Cpu, Resource::Memory, Resource::Gpu, Resource::Vram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Swap => "swap",
            Self::Gpu => "gpu",
            Self::Vram => "vram",
        }
    }

    /// Parses a resource name, accepting a few common aliases.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Some(Self::Cpu),
            "memory" | "mem" | "ram" => Some(Self::Memory),
            "swap" => Some(Self::Swap),
            "gpu" => Some(Self::Gpu),
            "vram" | "gpu_memory" => Some(Self::Vram),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percent-available readings for the detected resources.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceSnapshot {
    values: BTreeMap<Resource, f64>,
    /// Unix timestamp in milliseconds when the snapshot was produced.
    pub taken_at_ms: u64,
}

impl ResourceSnapshot {
    /// Creates an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            taken_at_ms: now_ms(),
        }
    }

    /// Builds a snapshot from percent-available values in `[0, 100]`.
    pub fn from_percentages<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (Resource, f64)>,
    {
        let mut snap = Self::new();
        for (resource, pct) in values {
            snap.insert(resource, pct);
        }
        snap
    }

    /// Builds a snapshot from available fractions in `[0, 1]`.
    ///
    /// `(Resource::Cpu, 0.25)` is stored as 25% available.
    pub fn from_fractions<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (Resource, f64)>,
    {
        Self::from_percentages(values.into_iter().map(|(r, f)| (r, f * 100.0)))
    }

    /// Records a reading. Values are clamped to `[0, 100]`; non-finite
    /// readings are dropped so they cannot poison downstream arithmetic.
    pub fn insert(&mut self, resource: Resource, available_pct: f64) {
        if available_pct.is_finite() {
            self.values.insert(resource, available_pct.clamp(0.0, 100.0));
        }
    }

    /// Removes a resource from the snapshot.
    pub fn remove(&mut self, resource: Resource) -> Option<f64> {
        self.values.remove(&resource)
    }

    /// Percent available, or `None` when the resource was not detected.
    pub fn get(&self, resource: Resource) -> Option<f64> {
        self.values.get(&resource).copied()
    }

    /// Available fraction in `[0, 1]`, or `None` when not detected.
    pub fn fraction(&self, resource: Resource) -> Option<f64> {
        self.get(resource).map(|pct| pct / 100.0)
    }

    pub fn contains(&self, resource: Resource) -> bool {
        self.values.contains_key(&resource)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(resource, percent available)` in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, f64)> + '_ {
        self.values.iter().map(|(r, v)| (*r, *v))
    }

    /// Returns a one-line summary suitable for logging or CLI display.
    ///
    /// # Example output
    /// ```text
    /// Resources available: cpu 72.0%, memory 41.5%, swap 100.0%
    /// ```
    pub fn summary(&self) -> String {
        if self.values.is_empty() {
            return "Resources available: none detected".to_string();
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(r, pct)| format!("{r} {pct:.1}%"))
            .collect();
        format!("Resources available: {}", parts.join(", "))
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
