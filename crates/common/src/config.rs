// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Host configuration for Shuttlecraft

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::ConnectionState;

/// Subnet that forwards everything (sshuttle's IPv4 catch-all)
pub const CATCH_ALL_SUBNET: &str = "0/0";

/// One tunnel definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// Unique host identifier
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Remote endpoint passed to sshuttle, usually `user@host`
    pub remote_host: String,
    /// Subnets to route through the tunnel
    #[serde(default = "default_subnets")]
    pub subnets: Vec<String>,
    /// Forward DNS requests to the remote side
    #[serde(default)]
    pub forward_dns: bool,
    /// Let sshuttle discover remote hostnames
    #[serde(default)]
    pub auto_add_hostnames: bool,
    /// Comma-separated subnets to exclude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_subnets: Option<String>,
    /// Replacement for the ssh command sshuttle runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_ssh_command: Option<String>,
    /// Route all IPv4/IPv6 traffic and DNS, ignoring `subnets` and `forward_dns`
    #[serde(default)]
    pub vpn_mode: bool,
    /// Written by the supervisor only
    #[serde(default)]
    pub status: ConnectionState,
}

fn default_subnets() -> Vec<String> {
    vec![CATCH_ALL_SUBNET.to_string()]
}

/// Split a comma-separated subnet string, trimming each entry and dropping blanks
pub fn parse_subnet_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl HostConfig {
    /// Create a host that forwards everything, with all options off
    pub fn new(name: impl Into<String>, remote_host: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            remote_host: remote_host.into(),
            subnets: default_subnets(),
            forward_dns: false,
            auto_add_hostnames: false,
            excluded_subnets: None,
            custom_ssh_command: None,
            vpn_mode: false,
            status: ConnectionState::Disconnected,
        }
    }

    /// Clean up user input before the record is stored or handed to the supervisor.
    ///
    /// Subnet entries are re-split on commas and trimmed; an empty list becomes
    /// the catch-all subnet. Blank optional strings become `None`.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.remote_host = self.remote_host.trim().to_string();
        self.subnets = parse_subnet_list(&self.subnets.join(","));
        if self.subnets.is_empty() {
            self.subnets = default_subnets();
        }
        self.excluded_subnets = non_blank(self.excluded_subnets.take());
        self.custom_ssh_command = non_blank(self.custom_ssh_command.take());
        self
    }

    /// Excluded subnets in input order, trimmed, blanks dropped
    pub fn excluded_subnet_list(&self) -> Vec<String> {
        self.excluded_subnets
            .as_deref()
            .map(parse_subnet_list)
            .unwrap_or_default()
    }

    /// Validate the host configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("Name cannot be empty".to_string()));
        }
        if self.remote_host.trim().is_empty() {
            return Err(Error::Config("Remote host cannot be empty".to_string()));
        }
        if self.subnets.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::Config(
                "At least one subnet must be forwarded".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of this host's file inside `dir`
    pub fn file_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.toml", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_host_defaults() {
        let host = HostConfig::new("Dev", "dev@dev.internal");
        assert_eq!(host.subnets, vec!["0/0".to_string()]);
        assert!(!host.forward_dns);
        assert!(!host.vpn_mode);
        assert_eq!(host.status, ConnectionState::Disconnected);
        assert!(host.validate().is_ok());
    }

    #[test]
    fn test_normalized_fills_catch_all() {
        let mut host = HostConfig::new("  Dev ", " dev@dev.internal ");
        host.subnets = vec![" ".to_string(), "".to_string()];
        host.excluded_subnets = Some("   ".to_string());
        host.custom_ssh_command = Some(" ssh -i ~/.ssh/work ".to_string());

        let host = host.normalized();
        assert_eq!(host.name, "Dev");
        assert_eq!(host.remote_host, "dev@dev.internal");
        assert_eq!(host.subnets, vec!["0/0".to_string()]);
        assert_eq!(host.excluded_subnets, None);
        assert_eq!(host.custom_ssh_command.as_deref(), Some("ssh -i ~/.ssh/work"));
    }

    #[test]
    fn test_normalized_splits_joined_entries() {
        let mut host = HostConfig::new("Dev", "dev@dev.internal");
        host.subnets = vec!["10.0.0.0/8, 192.168.0.0/16".to_string(), "172.16.0.0/12".to_string()];

        let host = host.normalized();
        assert_eq!(
            host.subnets,
            vec!["10.0.0.0/8", "192.168.0.0/16", "172.16.0.0/12"]
        );
    }

    #[test]
    fn test_excluded_subnet_list() {
        let mut host = HostConfig::new("Dev", "dev@dev.internal");
        host.excluded_subnets = Some(" 1.1.1.1 , 10.0.5.0/24 ,".to_string());
        assert_eq!(host.excluded_subnet_list(), vec!["1.1.1.1", "10.0.5.0/24"]);

        host.excluded_subnets = None;
        assert!(host.excluded_subnet_list().is_empty());
    }

    #[test]
    fn test_invalid_host_empty_remote() {
        let host = HostConfig::new("Dev", "  ");
        assert!(host.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut host = HostConfig::new("Work VPN", "workuser@work.example.com");
        host.forward_dns = true;
        host.vpn_mode = true;
        host.auto_add_hostnames = true;
        host.excluded_subnets = Some("10.0.5.0/24".to_string());
        host.custom_ssh_command = Some("ssh -p 2222".to_string());
        host.status = ConnectionState::Error;

        let text = toml::to_string_pretty(&host).unwrap();
        let parsed: HostConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, host);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let text = format!(
            "id = \"{}\"\nname = \"Dev\"\nremote_host = \"dev@dev\"\n",
            Uuid::new_v4()
        );
        let parsed: HostConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.subnets, vec!["0/0".to_string()]);
        assert_eq!(parsed.status, ConnectionState::Disconnected);
        assert!(parsed.excluded_subnets.is_none());
    }
}
