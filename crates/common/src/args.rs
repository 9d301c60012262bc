// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

//! sshuttle command-line construction.
//!
//! sshuttle parses its flags positionally, so the order below is fixed:
//! ssh command override, remote, DNS and subnets, hostname discovery,
//! exclusions, verbosity.

use crate::config::HostConfig;

/// All IPv4 traffic
pub const ALL_IPV4: &str = "0/0";
/// All IPv6 traffic
pub const ALL_IPV6: &str = "::/0";

const FLAG_SSH_CMD: &str = "--ssh-cmd";
const FLAG_REMOTE: &str = "-r";
const FLAG_DNS: &str = "--dns";
const FLAG_AUTO_HOSTS: &str = "-N";
const FLAG_EXCLUDE: &str = "-x";
const FLAG_VERBOSE: &str = "-v";

/// Build the sshuttle argument vector for a host
pub fn build_args(host: &HostConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(cmd) = host.custom_ssh_command.as_deref().filter(|c| !c.is_empty()) {
        args.push(FLAG_SSH_CMD.to_string());
        args.push(cmd.to_string());
    }

    args.push(FLAG_REMOTE.to_string());
    args.push(host.remote_host.clone());

    if host.vpn_mode {
        args.push(FLAG_DNS.to_string());
        args.push(ALL_IPV4.to_string());
        args.push(ALL_IPV6.to_string());
    } else {
        if host.forward_dns {
            args.push(FLAG_DNS.to_string());
        }
        args.extend(host.subnets.iter().cloned());
    }

    // VPN mode already routes everything
    if host.auto_add_hostnames && !host.vpn_mode {
        args.push(FLAG_AUTO_HOSTS.to_string());
    }

    for subnet in host.excluded_subnet_list() {
        args.push(FLAG_EXCLUDE.to_string());
        args.push(subnet);
    }

    args.push(FLAG_VERBOSE.to_string());
    args
}
