// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Threshold-driven tuning advice.

use super::{AnalysisThresholds, SensitivityReport};

/// Returned alone when no rule fires.
pub const NO_FINDINGS: &str =
    "No significant findings: the schedule is stable under the configured thresholds.";

/// Turns a report into human-readable recommendations.
///
/// Rules, in output order:
/// - binding resources scoring at least `resource_alert_level` are bottlenecks
/// - slack resources used below `1 - resource_alert_level` are underutilized
/// - scheduled stages scoring below `impact_threshold` could become optional
/// - stages no request could afford are reported as starved
/// - a stability score below `1 - resource_alert_level` is flagged
/// - nonbasic variables with zero reduced cost indicate alternative optima
///
/// Never returns an empty list.
pub fn generate_recommendations(
    report: &SensitivityReport,
    thresholds: &AnalysisThresholds,
) -> Vec<String> {
    let mut out = Vec::new();
    let low_water = 1.0 - thresholds.resource_alert_level;

    for r in &report.resources {
        if r.binding && r.score >= thresholds.resource_alert_level {
            out.push(format!(
                "Resource '{}' is a bottleneck (sensitivity {:.2}, {:.0}% used): freeing capacity here raises schedule quality the most.",
                r.resource,
                r.score,
                r.utilization * 100.0
            ));
        } else if !r.binding && r.utilization < low_water {
            out.push(format!(
                "Resource '{}' is underutilized ({:.0}% used): stage requirements on it could be raised or more requests batched.",
                r.resource,
                r.utilization * 100.0
            ));
        }
    }

    let anything_scheduled = report.stage_impacts.iter().any(|s| s.scheduled > 0);
    for s in &report.stage_impacts {
        if s.scheduled > 0 && s.score < thresholds.impact_threshold {
            out.push(format!(
                "Stage '{}' contributes only {:.1}% of quality (impact {:.2}): candidate for making optional.",
                s.stage,
                s.share * 100.0,
                s.score
            ));
        } else if s.scheduled == 0 && anything_scheduled {
            out.push(format!(
                "Stage '{}' was not scheduled for any request: available resources do not cover it.",
                s.stage
            ));
        }
    }

    if report.stability.total_resources > 0 && report.stability.score < low_water {
        out.push(format!(
            "Solution is fragile: {}/{} resource constraints are binding, so small load changes will alter the schedule.",
            report.stability.binding_resources, report.stability.total_resources
        ));
    }

    if report.stability.alternative_optima > 0 {
        out.push(format!(
            "{} decision(s) have zero reduced cost: equally good alternative schedules exist.",
            report.stability.alternative_optima
        ));
    }

    if out.is_empty() {
        out.push(NO_FINDINGS.to_string());
    }
    out
}
