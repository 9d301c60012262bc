// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Daemon Config Module
// Listener mode, sshuttle location and alert settings

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::supervisor::SupervisorConfig;

/// Listener mode for the daemon
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerMode {
    /// Unix domain socket (local-only)
    #[default]
    UnixSocket,
    /// Plain HTTP, loopback addresses only
    TcpHttp,
}

/// Daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Listener mode (UnixSocket or TcpHttp)
    #[serde(default)]
    pub listener_mode: ListenerMode,

    /// Bind address for TcpHttp mode
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Socket path override for UnixSocket mode (empty = default location)
    #[serde(default)]
    pub socket_path: String,

    /// Location of the sshuttle executable
    #[serde(default = "default_sshuttle_path")]
    pub sshuttle_path: PathBuf,

    /// Command placed in front of sshuttle, e.g. `["sudo", "-n"]`
    #[serde(default)]
    pub launcher: Vec<String>,

    /// Show alerts as desktop notifications
    #[serde(default = "default_desktop_notifications")]
    pub desktop_notifications: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1:7878".to_string()
}

#[cfg(target_os = "macos")]
fn default_sshuttle_path() -> PathBuf {
    PathBuf::from("/opt/homebrew/bin/sshuttle")
}

#[cfg(not(target_os = "macos"))]
fn default_sshuttle_path() -> PathBuf {
    PathBuf::from("/usr/bin/sshuttle")
}

fn default_desktop_notifications() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listener_mode: ListenerMode::default(),
            bind_address: default_bind_address(),
            socket_path: String::new(),
            sshuttle_path: default_sshuttle_path(),
            launcher: Vec::new(),
            desktop_notifications: default_desktop_notifications(),
        }
    }
}

impl DaemonConfig {
    /// Validate the daemon configuration
    pub fn validate(&self) -> Result<()> {
        if self.listener_mode == ListenerMode::TcpHttp {
            let addr: SocketAddr = self
                .bind_address
                .parse()
                .context(format!("Invalid bind_address: {}", self.bind_address))?;

            if !addr.ip().is_loopback() {
                anyhow::bail!(
                    "Security violation: tcp-http mode has no authentication or encryption \
                     and may only bind to a loopback address (bind_address: {})",
                    self.bind_address
                );
            }
        }

        if self.sshuttle_path.as_os_str().is_empty() {
            anyhow::bail!("sshuttle_path cannot be empty");
        }

        if self.launcher.iter().any(|part| part.trim().is_empty()) {
            anyhow::bail!("launcher entries cannot be empty");
        }

        Ok(())
    }

    /// Settings the supervisor needs
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            sshuttle_path: self.sshuttle_path.clone(),
            launcher: self.launcher.clone(),
        }
    }

    /// Socket path for UnixSocket mode
    pub fn socket_path(&self) -> Result<PathBuf> {
        let candidate = self.socket_path.trim();
        if !candidate.is_empty() {
            return Ok(PathBuf::from(candidate));
        }
        shuttlecraft_common::default_socket_path()
    }

    /// Load daemon configuration from the default location, writing defaults on first run
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load daemon configuration from `config_path`
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("No daemon configuration found, using defaults");
            info!("Configuration will be saved to: {}", config_path.display());
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            fs::read_to_string(config_path).context("Failed to read daemon configuration")?;

        let config: Self =
            toml::from_str(&contents).context("Failed to parse daemon configuration")?;

        config
            .validate()
            .context("Configuration validation failed")?;

        info!("Loaded daemon configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Save daemon configuration to `config_path`
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }

        let contents =
            toml::to_string_pretty(self).context("Failed to serialize daemon configuration")?;

        fs::write(config_path, contents).context("Failed to write daemon configuration")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(config_path, permissions)
                .context("Failed to set config file permissions")?;
        }

        info!("Saved daemon configuration to: {}", config_path.display());
        Ok(())
    }

    /// Get the path to the daemon configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("shuttlecraft").join("daemon.toml"))
    }
}
