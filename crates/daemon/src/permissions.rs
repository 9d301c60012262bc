// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Owner-only permissions for the runtime directory and the API socket

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Create `path` if needed and restrict it to 0700
pub fn ensure_private_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).context(format!("Failed to create {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .context(format!("Failed to set permissions on {}", path.display()))?;
    debug!("Set directory permissions to 700: {}", path.display());
    Ok(())
}

/// Restrict the API socket to its owner (0600)
pub fn set_socket_permissions(path: &Path) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .context(format!("Failed to set socket permissions on {}", path.display()))?;
    debug!("Set socket permissions to 600: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_directory_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run").join("shuttlecraft");

        ensure_private_directory(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
