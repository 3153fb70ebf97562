// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-stage resource requirement vectors and quality weights.
//!
//! Requirements are fractions of the whole machine in `[0, 1]` along the
//! four schedulable axes. They are static per stage and get scaled by the
//! scheduler according to the current [`crate::ResourceLevel`].

use crate::{Stage, StageTable};
use resource_monitor::{Resource, ResourceSnapshot};

/// Demand (or remaining capacity) along each schedulable resource axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceVector {
    pub cpu: f64,
    pub memory: f64,
    pub gpu: f64,
    pub vram: f64,
}

impl ResourceVector {
    pub const fn new(cpu: f64, memory: f64, gpu: f64, vram: f64) -> Self {
        Self {
            cpu,
            memory,
            gpu,
            vram,
        }
    }

    /// Remaining capacity as seen by a scheduler.
    ///
    /// Axes absent from the snapshot are unconstrained and read as
    /// infinite capacity, never as zero.
    pub fn available_in(snapshot: &ResourceSnapshot) -> Self {
        let axis = |r| snapshot.fraction(r).unwrap_or(f64::INFINITY);
        Self::new(
            axis(Resource::Cpu),
            axis(Resource::Memory),
            axis(Resource::Gpu),
            axis(Resource::Vram),
        )
    }

    /// Value along one axis. Swap is not a demand axis and reads as 0.
    pub fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Cpu => self.cpu,
            Resource::Memory => self.memory,
            Resource::Gpu => self.gpu,
            Resource::Vram => self.vram,
            Resource::Swap => 0.0,
        }
    }

    /// Multiplies every axis by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.cpu * factor,
            self.memory * factor,
            self.gpu * factor,
            self.vram * factor,
        )
    }

    /// `true` if every axis of `self` is covered by `capacity`, allowing
    /// `tolerance` of floating-point slack.
    pub fn fits_within(&self, capacity: &ResourceVector, tolerance: f64) -> bool {
        Resource::SCHEDULABLE
            .iter()
            .all(|&r| self.get(r) <= capacity.get(r) + tolerance)
    }

    /// Per-axis `self - other`, floored at zero.
    pub fn saturating_sub(&self, other: &ResourceVector) -> Self {
        Self::new(
            (self.cpu - other.cpu).max(0.0),
            (self.memory - other.memory).max(0.0),
            (self.gpu - other.gpu).max(0.0),
            (self.vram - other.vram).max(0.0),
        )
    }

    /// `true` if every component is finite and in `[0, 1]`.
    pub fn is_valid_fraction(&self) -> bool {
        Resource::SCHEDULABLE
            .iter()
            .all(|&r| (0.0..=1.0).contains(&self.get(r)))
    }
}

impl std::ops::Add for ResourceVector {
    type Output = ResourceVector;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.cpu + rhs.cpu,
            self.memory + rhs.memory,
            self.gpu + rhs.gpu,
            self.vram + rhs.vram,
        )
    }
}

/// Default requirement profile per stage.
///
/// | stage    | cpu | memory | gpu | vram |
/// |----------|-----|--------|-----|------|
/// | template | 0.1 | 0.1    | 0   | 0    |
/// | detail   | 0.3 | 0.4    | 0.5 | 0.4  |
/// | optimize | 0.4 | 0.3    | 0.3 | 0.3  |
pub fn default_requirements() -> StageTable<ResourceVector> {
    StageTable {
        template: ResourceVector::new(0.1, 0.1, 0.0, 0.0),
        detail: ResourceVector::new(0.3, 0.4, 0.5, 0.4),
        optimize: ResourceVector::new(0.4, 0.3, 0.3, 0.3),
    }
}

/// Default quality contribution per stage. Template dominates since no
/// output exists without it.
pub fn default_quality_weights() -> StageTable<f64> {
    StageTable {
        template: 0.5,
        detail: 0.3,
        optimize: 0.2,
    }
}

impl Default for StageTable<ResourceVector> {
    fn default() -> Self {
        default_requirements()
    }
}

impl Default for StageTable<f64> {
    fn default() -> Self {
        default_quality_weights()
    }
}

/// Total demand of running `stages` once.
pub fn total_requirement(table: &StageTable<ResourceVector>, stages: &[Stage]) -> ResourceVector {
    stages
        .iter()
        .fold(ResourceVector::default(), |acc, s| acc + *table.get(*s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_in_treats_absent_as_unbounded() {
        let snap = ResourceSnapshot::from_fractions([(Resource::Cpu, 0.5), (Resource::Memory, 0.25)]);
        let avail = ResourceVector::available_in(&snap);
        assert_eq!(avail.cpu, 0.5);
        assert_eq!(avail.memory, 0.25);
        assert!(avail.gpu.is_infinite());
        assert!(avail.vram.is_infinite());
    }

    #[test]
    fn test_fits_within() {
        let req = ResourceVector::new(0.3, 0.4, 0.5, 0.4);
        let enough = ResourceVector::new(0.3, 0.4, 1.0, 1.0);
        let short = ResourceVector::new(0.29, 1.0, 1.0, 1.0);
        assert!(req.fits_within(&enough, 1e-9));
        assert!(!req.fits_within(&short, 1e-9));
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = ResourceVector::new(0.2, 0.2, f64::INFINITY, 0.0);
        let b = ResourceVector::new(0.1, 0.3, 0.5, 0.1);
        let r = a.saturating_sub(&b);
        assert!((r.cpu - 0.1).abs() < 1e-12);
        assert_eq!(r.memory, 0.0);
        assert!(r.gpu.is_infinite());
        assert_eq!(r.vram, 0.0);
    }

    #[test]
    fn test_scaled() {
        let r = ResourceVector::new(0.1, 0.2, 0.0, 0.4).scaled(0.5);
        assert!((r.memory - 0.1).abs() < 1e-12);
        assert!((r.vram - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_defaults_are_valid() {
        let reqs = default_requirements();
        assert!(reqs.iter().all(|(_, v)| v.is_valid_fraction()));
        assert_eq!(reqs.template.gpu, 0.0);
        let weights = default_quality_weights();
        assert!(weights.template > weights.detail && weights.detail > weights.optimize);
    }

    #[test]
    fn test_total_requirement() {
        let total = total_requirement(&default_requirements(), &Stage::ALL);
        assert!((total.cpu - 0.8).abs() < 1e-12);
        assert!((total.gpu - 0.8).abs() < 1e-12);
    }
}
