// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - PID File Management
// Keeps a second supervisor from fighting over the same tunnels

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Removes the PID file on drop
#[derive(Debug)]
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    /// Claim the default PID file in the runtime directory
    pub fn create() -> Result<Self> {
        let path = shuttlecraft_common::runtime_dir()?.join("shuttlecraftd.pid");
        Self::create_at(&path)
    }

    /// Claim the PID file at `path`, failing if a live daemon already owns it
    pub fn create_at(path: &Path) -> Result<Self> {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    if let Ok(pid) = contents.trim().parse::<u32>() {
                        if is_process_running(pid) {
                            anyhow::bail!(
                                "Daemon is already running with PID {}. \
                                 Stop the existing daemon first or remove {} if it's stale.",
                                pid,
                                path.display()
                            );
                        }
                        warn!("Removing stale PID file for process {}", pid);
                    }
                    fs::remove_file(path).context("Failed to remove stale PID file")?;
                }
                Err(e) => {
                    warn!("Failed to read PID file {}: {}", path.display(), e);
                    let _ = fs::remove_file(path);
                }
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create runtime directory")?;
        }

        let pid = std::process::id();
        fs::write(path, pid.to_string()).context("Failed to write PID file")?;

        info!("Created PID file at {} with PID {}", path.display(), pid);

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

/// kill(pid, 0) checks for the process without signalling it
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
        return true;
    }
    // EPERM: it exists but belongs to someone else
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    warn!("Process existence check not implemented for this platform");
    true
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(_) => debug!("Removed PID file: {}", self.path.display()),
            Err(e) => warn!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}
