// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Physical memory and swap headroom from `/proc/meminfo`.
//!
//! Swap is not scheduled against, but sustained swap use is the earliest
//! sign of memory pressure, so the level classifier reads it.

use crate::procfs::read_trimmed;
use crate::MonitorError;
use std::path::Path;

const MEMINFO_PATH: &str = "/proc/meminfo";

/// The `/proc/meminfo` counters the monitor needs, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryInfo {
    pub mem_total_kb: u64,
    /// `MemAvailable`: free memory plus reclaimable cache and buffers.
    pub mem_available_kb: u64,
    /// 0 when the host has no swap configured.
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

impl MemoryInfo {
    pub fn read() -> Result<Self, MonitorError> {
        Self::read_from(Path::new(MEMINFO_PATH))
    }

    pub(crate) fn read_from(path: &Path) -> Result<Self, MonitorError> {
        let content = read_trimmed(path)?;
        Self::parse(&content, path)
    }

    /// Parses `meminfo`-formatted text. `MemTotal` and `MemAvailable` are
    /// required; missing swap lines read as "no swap".
    pub(crate) fn parse(content: &str, origin: &Path) -> Result<Self, MonitorError> {
        let field = |key: &str| -> Result<Option<u64>, MonitorError> {
            let Some(raw) = content.lines().find_map(|line| {
                let (name, rest) = line.split_once(':')?;
                (name.trim() == key).then(|| rest.trim().trim_end_matches("kB").trim())
            }) else {
                return Ok(None);
            };
            raw.parse::<u64>().map(Some).map_err(|_| MonitorError::ParseError {
                path: origin.display().to_string(),
                detail: format!("{key}: expected a kB count, got '{raw}'"),
            })
        };
        let required = |key: &str| -> Result<u64, MonitorError> {
            field(key)?.ok_or_else(|| MonitorError::ParseError {
                path: origin.display().to_string(),
                detail: format!("{key} missing"),
            })
        };

        let swap_total_kb = field("SwapTotal")?.unwrap_or(0);
        Ok(Self {
            mem_total_kb: required("MemTotal")?,
            mem_available_kb: required("MemAvailable")?,
            swap_total_kb,
            swap_free_kb: field("SwapFree")?.unwrap_or(0).min(swap_total_kb),
        })
    }

    /// Physical memory available, percent.
    pub fn available_pct(&self) -> f64 {
        percent_of(self.mem_available_kb, self.mem_total_kb).unwrap_or(0.0)
    }

    /// Swap still free, percent. A host without swap has no swap pressure
    /// and reports 100.
    pub fn swap_available_pct(&self) -> f64 {
        percent_of(self.swap_free_kb, self.swap_total_kb).unwrap_or(100.0)
    }

    pub fn available_mb(&self) -> u64 {
        self.mem_available_kb / 1024
    }
}

fn percent_of(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16000000 kB
MemFree:         1200000 kB
MemAvailable:    4000000 kB
Cached:          2500000 kB
SwapTotal:       2000000 kB
SwapFree:         500000 kB
Dirty:               128 kB
";

    fn parse(text: &str) -> Result<MemoryInfo, MonitorError> {
        MemoryInfo::parse(text, Path::new("meminfo"))
    }

    #[test]
    fn test_parse_fields() {
        let info = parse(MEMINFO).unwrap();
        assert_eq!(info.mem_total_kb, 16_000_000);
        assert_eq!(info.mem_available_kb, 4_000_000);
        assert_eq!(info.swap_total_kb, 2_000_000);
        assert_eq!(info.swap_free_kb, 500_000);
        assert_eq!(info.available_mb(), 3906);
    }

    #[test]
    fn test_percentages() {
        let info = parse(MEMINFO).unwrap();
        assert!((info.available_pct() - 25.0).abs() < 1e-9);
        assert!((info.swap_available_pct() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_swapless_host() {
        let info = parse("MemTotal: 1000 kB\nMemAvailable: 600 kB\n").unwrap();
        assert_eq!(info.swap_total_kb, 0);
        assert_eq!(info.swap_available_pct(), 100.0);
        assert!((info.available_pct() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_is_exhausted() {
        let info = parse("MemTotal: 0 kB\nMemAvailable: 0 kB\n").unwrap();
        assert_eq!(info.available_pct(), 0.0);
    }

    #[test]
    fn test_missing_required_field() {
        let err = parse("MemTotal: 1000 kB\nMemFree: 10 kB\n").unwrap_err();
        assert!(err.to_string().contains("MemAvailable missing"));
    }

    #[test]
    fn test_garbage_value() {
        let err = parse("MemTotal: lots kB\nMemAvailable: 1 kB\n").unwrap_err();
        assert!(matches!(err, MonitorError::ParseError { .. }));
    }

    #[test]
    fn test_read_from_file() {
        let path = std::env::temp_dir().join(format!("c2s_meminfo_{}", std::process::id()));
        std::fs::write(&path, MEMINFO).unwrap();
        let info = MemoryInfo::read_from(&path).unwrap();
        assert_eq!(info.mem_total_kb, 16_000_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_live_meminfo() {
        if Path::new(MEMINFO_PATH).exists() {
            let info = MemoryInfo::read().unwrap();
            assert!(info.mem_total_kb > 0);
            assert!((0.0..=100.0).contains(&info.available_pct()));
        }
    }
}
