// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Daemon Client Module
// Shared daemon connection logic for the CLI

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{HostStatus, StatusResponse, Uuid};

/// Connection mode for client to daemon communication
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Unix domain socket (local-only)
    #[default]
    UnixSocket,
    /// HTTP on a loopback address
    Http,
}

/// Action the daemon can apply to a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Connect,
    Disconnect,
    Toggle,
}

impl HostAction {
    fn path_segment(self) -> &'static str {
        match self {
            HostAction::Connect => "connect",
            HostAction::Disconnect => "disconnect",
            HostAction::Toggle => "toggle",
        }
    }
}

/// Client configuration for connecting to the daemon
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonClientConfig {
    /// Connection mode (UnixSocket or Http)
    #[serde(default)]
    pub connection_mode: ConnectionMode,

    /// Daemon host for HTTP mode
    #[serde(default = "default_daemon_host")]
    pub daemon_host: String,

    /// Daemon port for HTTP mode
    #[serde(default = "default_daemon_port")]
    pub daemon_port: u16,

    /// Socket path override for UnixSocket mode (empty = default location)
    #[serde(default)]
    pub socket_path: String,
}

fn default_daemon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_daemon_port() -> u16 {
    7878
}

impl Default for DaemonClientConfig {
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::default(),
            daemon_host: default_daemon_host(),
            daemon_port: default_daemon_port(),
            socket_path: String::new(),
        }
    }
}

/// Directory for runtime state (socket, PID file)
///
/// Uses the XDG runtime directory where there is one, the cache directory otherwise (macOS).
pub fn runtime_dir() -> Result<PathBuf> {
    let base = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine runtime directory"))?;
    Ok(base.join("shuttlecraft"))
}

/// Default location of the daemon's Unix socket
pub fn default_socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("shuttlecraft.sock"))
}

impl DaemonClientConfig {
    /// Base URL for requests; Unix socket mode uses a placeholder host
    pub fn daemon_base_url(&self) -> String {
        match self.connection_mode {
            ConnectionMode::UnixSocket => "http://daemon".to_string(),
            ConnectionMode::Http => {
                format!("http://{}", format_host_port(&self.daemon_host, self.daemon_port))
            }
        }
    }

    /// Socket path to use in UnixSocket mode
    pub fn socket_path(&self) -> Result<PathBuf> {
        let candidate = self.socket_path.trim();
        if !candidate.is_empty() {
            return Ok(PathBuf::from(candidate));
        }
        default_socket_path()
    }
}

/// `host:port`, bracketing bare IPv6 literals
fn format_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Create an HTTP client configured to reach the daemon
pub fn create_daemon_client(config: &DaemonClientConfig) -> Result<Client> {
    #[allow(unused_mut)]
    let mut client_builder = Client::builder().connect_timeout(Duration::from_secs(5));

    if config.connection_mode == ConnectionMode::UnixSocket {
        #[cfg(unix)]
        {
            client_builder = client_builder.unix_socket(config.socket_path()?);
        }
        #[cfg(not(unix))]
        anyhow::bail!("Unix socket mode is not supported on this platform; use http");
    }

    client_builder
        .build()
        .context("Failed to build daemon client")
}

/// Error body returned by the daemon API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("Failed to parse daemon response");
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };

    if status == StatusCode::NOT_FOUND {
        anyhow::bail!("{}", message);
    }
    anyhow::bail!("Daemon returned {}: {}", status, message)
}

fn unreachable_hint(e: reqwest::Error) -> anyhow::Error {
    anyhow::anyhow!("Failed to reach the daemon (is shuttlecraftd running?): {}", e)
}

/// Fetch the status of every host
pub async fn fetch_status(client: &Client, config: &DaemonClientConfig) -> Result<StatusResponse> {
    let url = format!("{}/api/status", config.daemon_base_url());
    let response = client.get(&url).send().await.map_err(unreachable_hint)?;
    parse_response(response).await
}

/// Fetch the status of one host
pub async fn fetch_host_status(
    client: &Client,
    config: &DaemonClientConfig,
    id: Uuid,
) -> Result<HostStatus> {
    let url = format!("{}/api/hosts/{}", config.daemon_base_url(), id);
    let response = client.get(&url).send().await.map_err(unreachable_hint)?;
    parse_response(response).await
}

/// Apply an action to a host and return its resulting status
pub async fn host_action(
    client: &Client,
    config: &DaemonClientConfig,
    id: Uuid,
    action: HostAction,
) -> Result<HostStatus> {
    let url = format!(
        "{}/api/hosts/{}/{}",
        config.daemon_base_url(),
        id,
        action.path_segment()
    );
    let response = client.post(&url).send().await.map_err(unreachable_hint)?;
    parse_response(response).await
}

/// Ask the daemon to re-read the host store
pub async fn reload_hosts(client: &Client, config: &DaemonClientConfig) -> Result<StatusResponse> {
    let url = format!("{}/api/hosts/reload", config.daemon_base_url());
    let response = client.post(&url).send().await.map_err(unreachable_hint)?;
    parse_response(response).await
}
