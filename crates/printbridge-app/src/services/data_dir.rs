// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use printbridge_core::error::Result;

/// Overrides the data directory when set.
pub const DATA_DIR_ENV: &str = "PRINTBRIDGE_DATA_DIR";

/// Return the application data directory, creating it if needed.
///
/// An explicit directory (the `--data-dir` flag) wins, then
/// `$PRINTBRIDGE_DATA_DIR`, then `printbridge` under the XDG data home
/// (`~/.local/share` by default).
pub fn data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = match (explicit, std::env::var_os(DATA_DIR_ENV)) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(dir)) if !dir.is_empty() => PathBuf::from(dir),
        _ => base_dir().join("printbridge"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn base_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}
