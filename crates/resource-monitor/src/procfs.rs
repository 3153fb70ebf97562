// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared helpers for reading `/proc` and `/sys` files.

use crate::MonitorError;
use std::io::ErrorKind;
use std::path::Path;

/// Reads a procfs/sysfs file and returns its trimmed content. A missing
/// file is [`MonitorError::NotAvailable`], any other failure a read error.
pub(crate) fn read_trimmed(path: &Path) -> Result<String, MonitorError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().to_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(MonitorError::NotAvailable {
            path: path.display().to_string(),
        }),
        Err(source) => Err(MonitorError::ReadError {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let result = read_trimmed(Path::new("/nonexistent/proc/file"));
        assert!(matches!(result, Err(MonitorError::NotAvailable { .. })));
    }

    #[test]
    fn test_trims_content() {
        let path = std::env::temp_dir().join(format!("c2s_procfs_{}", std::process::id()));
        std::fs::write(&path, "  42\n").unwrap();
        assert_eq!(read_trimmed(&path).unwrap(), "42");
        let _ = std::fs::remove_file(&path);
    }
}
