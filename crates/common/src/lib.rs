// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Common Library
// Host model, sshuttle argument building, output classification and shared types

pub mod args;
pub mod classifier;
pub mod config;
pub mod daemon_client;
pub mod error;
pub mod host_store;
pub mod sse;
pub mod types;

pub use args::{build_args, ALL_IPV4, ALL_IPV6};
pub use classifier::{classify, decode_chunk, Transition, MAX_EXCERPT_CHARS};
pub use config::{parse_subnet_list, HostConfig, CATCH_ALL_SUBNET};
pub use daemon_client::{
    create_daemon_client, default_socket_path, fetch_host_status, fetch_status, host_action,
    reload_hosts, runtime_dir, ConnectionMode, DaemonClientConfig, HostAction,
};
pub use error::{Error, Result};
pub use host_store::{
    delete_host, find_host, hosts_dir, load_all_hosts, load_all_hosts_from, load_host,
    load_host_by_key, save_host, save_host_to,
};
pub use sse::EventListener;
pub use types::{
    ConnectionState, HostEvent, HostStatus, OutputStream, OverallStatus, StatusResponse,
};

// Re-export commonly used external types
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
