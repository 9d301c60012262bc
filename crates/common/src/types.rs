// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Common types for Shuttlecraft

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection state of a single host
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected, // no process
    Connecting,   // process spawned, waiting for the tool to report the tunnel
    Connected,    // tunnel established
    Error,        // last attempt failed; toggling starts a fresh attempt
}

impl ConnectionState {
    /// Connecting or connected, i.e. a process is (or should be) running
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Which stream of the tunnel process a chunk came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Snapshot of one host as reported by the supervisor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostStatus {
    pub id: Uuid,
    pub name: String,
    pub remote_host: String,
    pub vpn_mode: bool,
    pub state: ConnectionState,
}

/// Aggregate indicator across all hosts (what a menu-bar icon would show)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Nothing connected
    Idle,
    /// At least one host connected
    Connected,
    /// At least one connected host routes all traffic
    VpnActive,
}

impl OverallStatus {
    pub fn from_hosts(hosts: &[HostStatus]) -> Self {
        let connected = || hosts.iter().filter(|h| h.state == ConnectionState::Connected);

        if connected().any(|h| h.vpn_mode) {
            OverallStatus::VpnActive
        } else if connected().next().is_some() {
            OverallStatus::Connected
        } else {
            OverallStatus::Idle
        }
    }
}

/// Response body of `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub overall: OverallStatus,
    pub hosts: Vec<HostStatus>,
}

/// Events emitted by the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A host moved to a new connection state
    StateChanged {
        id: Uuid,
        name: String,
        state: ConnectionState,
        timestamp: DateTime<Utc>,
    },

    /// Something the user should see (launch failure, fatal output, early exit)
    Alert {
        id: Uuid,
        title: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Decoded output chunk from the tunnel process
    Output {
        id: Uuid,
        stream: OutputStream,
        text: String,
    },

    /// Keep-alive on the SSE stream
    Heartbeat { timestamp: DateTime<Utc> },
}

impl HostEvent {
    /// Host the event refers to, if any
    pub fn host_id(&self) -> Option<Uuid> {
        match self {
            HostEvent::StateChanged { id, .. }
            | HostEvent::Alert { id, .. }
            | HostEvent::Output { id, .. } => Some(*id),
            HostEvent::Heartbeat { .. } => None,
        }
    }
}
