// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - CLI Client
// Manages host definitions and drives the daemon's tunnels

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use dialoguer::{Confirm, Input};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use shuttlecraft_common::{
    build_args, create_daemon_client, delete_host, fetch_host_status, fetch_status, host_action,
    load_all_hosts, load_host_by_key, reload_hosts, save_host, ConnectionState, EventListener,
    HostAction, HostConfig, HostEvent, HostStatus, OutputStream, OverallStatus, Uuid,
};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "shuttle")]
#[command(about = "Shuttlecraft CLI - sshuttle connection manager", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new host
    Add {
        /// Host name
        name: String,

        /// Remote endpoint for sshuttle (user@host)
        #[arg(short = 'H', long)]
        remote_host: Option<String>,

        /// Comma-separated subnets to forward (default: 0/0)
        #[arg(short, long)]
        subnets: Option<String>,

        /// Forward DNS requests
        #[arg(long)]
        dns: bool,

        /// Let sshuttle discover remote hostnames
        #[arg(short = 'N', long)]
        auto_hosts: bool,

        /// Comma-separated subnets to exclude
        #[arg(short = 'x', long)]
        exclude: Option<String>,

        /// Custom ssh command (e.g. "ssh -i ~/.ssh/work")
        #[arg(long)]
        ssh_cmd: Option<String>,

        /// Route all traffic and DNS through the host
        #[arg(long)]
        vpn: bool,

        /// Skip interactive prompts (use provided args only)
        #[arg(short = 'y', long)]
        non_interactive: bool,
    },

    /// Edit an existing host
    Edit {
        /// Host name or ID
        host: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// Remote endpoint for sshuttle (user@host)
        #[arg(short = 'H', long)]
        remote_host: Option<String>,

        /// Comma-separated subnets to forward
        #[arg(short, long)]
        subnets: Option<String>,

        /// Forward DNS requests
        #[arg(long)]
        dns: Option<bool>,

        /// Let sshuttle discover remote hostnames
        #[arg(long)]
        auto_hosts: Option<bool>,

        /// Comma-separated subnets to exclude (empty to clear)
        #[arg(short = 'x', long)]
        exclude: Option<String>,

        /// Custom ssh command (empty to clear)
        #[arg(long)]
        ssh_cmd: Option<String>,

        /// Route all traffic and DNS through the host
        #[arg(long)]
        vpn: Option<bool>,
    },

    /// List all hosts
    List {
        /// Output as JSON for scripting
        #[arg(short, long)]
        json: bool,
    },

    /// Show detailed information about a host
    Info {
        /// Host name or ID
        host: String,
    },

    /// Delete a host
    Delete {
        /// Host name or ID
        host: String,

        /// Don't ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Start a host's tunnel
    Connect {
        /// Host name or ID
        host: String,
    },

    /// Stop a host's tunnel
    Disconnect {
        /// Host name or ID
        host: String,
    },

    /// Start the tunnel if it is down, stop it otherwise
    Toggle {
        /// Host name or ID
        host: String,
    },

    /// Show connection status
    Status {
        /// Host name or ID (optional, shows all if not specified)
        host: Option<String>,
    },

    /// Follow state changes and alerts from the daemon
    Watch {
        /// Optional host name or ID to filter by
        host: Option<String>,

        /// Also print sshuttle output
        #[arg(long)]
        output: bool,
    },
}

/// Field changes for a host; `None` keeps the current value
#[derive(Debug, Default)]
struct HostEdits {
    name: Option<String>,
    remote_host: Option<String>,
    subnets: Option<String>,
    forward_dns: Option<bool>,
    auto_add_hostnames: Option<bool>,
    excluded_subnets: Option<String>,
    custom_ssh_command: Option<String>,
    vpn_mode: Option<bool>,
}

impl HostEdits {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.remote_host.is_none()
            && self.subnets.is_none()
            && self.forward_dns.is_none()
            && self.auto_add_hostnames.is_none()
            && self.excluded_subnets.is_none()
            && self.custom_ssh_command.is_none()
            && self.vpn_mode.is_none()
    }

    /// Apply to `host`. Blank exclusions or ssh command clear the field.
    fn apply(self, mut host: HostConfig) -> HostConfig {
        if let Some(name) = self.name {
            host.name = name;
        }
        if let Some(remote_host) = self.remote_host {
            host.remote_host = remote_host;
        }
        if let Some(subnets) = self.subnets {
            host.subnets = shuttlecraft_common::parse_subnet_list(&subnets);
        }
        if let Some(forward_dns) = self.forward_dns {
            host.forward_dns = forward_dns;
        }
        if let Some(auto_add_hostnames) = self.auto_add_hostnames {
            host.auto_add_hostnames = auto_add_hostnames;
        }
        if let Some(excluded) = self.excluded_subnets {
            host.excluded_subnets = Some(excluded);
        }
        if let Some(command) = self.custom_ssh_command {
            host.custom_ssh_command = Some(command);
        }
        if let Some(vpn_mode) = self.vpn_mode {
            host.vpn_mode = vpn_mode;
        }
        host.normalized()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            name,
            remote_host,
            subnets,
            dns,
            auto_hosts,
            exclude,
            ssh_cmd,
            vpn,
            non_interactive,
        } => {
            let edits = HostEdits {
                name: None,
                remote_host,
                subnets,
                forward_dns: Some(dns),
                auto_add_hostnames: Some(auto_hosts),
                excluded_subnets: exclude,
                custom_ssh_command: ssh_cmd,
                vpn_mode: Some(vpn),
            };
            add_host(name, edits, non_interactive).await?;
        }
        Commands::Edit {
            host,
            name,
            remote_host,
            subnets,
            dns,
            auto_hosts,
            exclude,
            ssh_cmd,
            vpn,
        } => {
            let edits = HostEdits {
                name,
                remote_host,
                subnets,
                forward_dns: dns,
                auto_add_hostnames: auto_hosts,
                excluded_subnets: exclude,
                custom_ssh_command: ssh_cmd,
                vpn_mode: vpn,
            };
            edit_host(host, edits).await?;
        }
        Commands::List { json } => {
            list_hosts(json)?;
        }
        Commands::Info { host } => {
            show_host_info(host)?;
        }
        Commands::Delete { host, yes } => {
            delete_host_cmd(host, yes).await?;
        }
        Commands::Connect { host } => {
            run_action(host, HostAction::Connect).await?;
        }
        Commands::Disconnect { host } => {
            run_action(host, HostAction::Disconnect).await?;
        }
        Commands::Toggle { host } => {
            run_action(host, HostAction::Toggle).await?;
        }
        Commands::Status { host } => {
            show_status(host).await?;
        }
        Commands::Watch { host, output } => {
            watch_events(host, output).await?;
        }
    }

    Ok(())
}

async fn add_host(name: String, mut edits: HostEdits, non_interactive: bool) -> Result<()> {
    println!("{}", "Creating new host".bold().green());
    println!();

    if edits.remote_host.is_none() {
        if non_interactive {
            anyhow::bail!("Remote host is required in non-interactive mode");
        }
        let remote: String = Input::new()
            .with_prompt("Remote endpoint (user@host)")
            .interact_text()?;
        edits.remote_host = Some(remote);
    }

    if !non_interactive {
        prompt_options(&mut edits)?;
    }

    let host = edits.apply(HostConfig::new(name, ""));
    let path = save_host(&host, false)?;

    println!();
    println!("{}", "✓ Host created successfully!".green().bold());
    println!("  Saved to: {}", path.display().to_string().dimmed());
    println!();
    print_host_summary(&host);
    println!();

    reload_daemon().await;
    println!(
        "Connect with: {}",
        format!("shuttle connect {}", host.name).cyan()
    );

    Ok(())
}

/// Ask for the options that have no value yet
fn prompt_options(edits: &mut HostEdits) -> Result<()> {
    let vpn = Confirm::new()
        .with_prompt("VPN mode (route all traffic and DNS)?")
        .default(edits.vpn_mode.unwrap_or(false))
        .interact()?;
    edits.vpn_mode = Some(vpn);

    if !vpn {
        if edits.subnets.is_none() {
            let subnets: String = Input::new()
                .with_prompt("Subnets to forward (comma-separated)")
                .default(shuttlecraft_common::CATCH_ALL_SUBNET.to_string())
                .interact_text()?;
            edits.subnets = Some(subnets);
        }

        let dns = Confirm::new()
            .with_prompt("Forward DNS requests?")
            .default(edits.forward_dns.unwrap_or(false))
            .interact()?;
        edits.forward_dns = Some(dns);

        let auto_hosts = Confirm::new()
            .with_prompt("Auto-discover remote hostnames?")
            .default(edits.auto_add_hostnames.unwrap_or(false))
            .interact()?;
        edits.auto_add_hostnames = Some(auto_hosts);
    }

    if edits.excluded_subnets.is_none() {
        let exclude: String = Input::new()
            .with_prompt("Subnets to exclude (comma-separated, Enter for none)")
            .allow_empty(true)
            .interact_text()?;
        edits.excluded_subnets = Some(exclude);
    }

    if edits.custom_ssh_command.is_none() {
        let ssh_cmd: String = Input::new()
            .with_prompt("Custom ssh command (Enter for default)")
            .allow_empty(true)
            .interact_text()?;
        edits.custom_ssh_command = Some(ssh_cmd);
    }

    Ok(())
}

async fn edit_host(key: String, mut edits: HostEdits) -> Result<()> {
    let current = load_host_by_key(&key)?;

    if edits.is_empty() {
        // No flags given: walk through every field with the current values as defaults
        let remote: String = Input::new()
            .with_prompt("Remote endpoint (user@host)")
            .default(current.remote_host.clone())
            .interact_text()?;
        edits.remote_host = Some(remote);
        edits.vpn_mode = Some(current.vpn_mode);
        edits.forward_dns = Some(current.forward_dns);
        edits.auto_add_hostnames = Some(current.auto_add_hostnames);

        let subnets: String = Input::new()
            .with_prompt("Subnets to forward (comma-separated)")
            .default(current.subnets.join(","))
            .interact_text()?;
        edits.subnets = Some(subnets);

        let exclude: String = Input::new()
            .with_prompt("Subnets to exclude (comma-separated)")
            .default(current.excluded_subnets.clone().unwrap_or_default())
            .allow_empty(true)
            .interact_text()?;
        edits.excluded_subnets = Some(exclude);

        let ssh_cmd: String = Input::new()
            .with_prompt("Custom ssh command")
            .default(current.custom_ssh_command.clone().unwrap_or_default())
            .allow_empty(true)
            .interact_text()?;
        edits.custom_ssh_command = Some(ssh_cmd);

        prompt_options(&mut edits)?;
    }

    let host = edits.apply(current);

    let others = load_all_hosts()?;
    if others
        .iter()
        .any(|h| h.id != host.id && h.name.eq_ignore_ascii_case(&host.name))
    {
        anyhow::bail!(
            "A host named '{}' already exists. Please choose a different name.",
            host.name.yellow()
        );
    }

    save_host(&host, true)?;

    println!();
    println!(
        "{}",
        format!("✓ Host '{}' updated", host.name).green().bold()
    );
    println!();
    print_host_summary(&host);
    println!();

    reload_daemon().await;
    Ok(())
}

/// Starter hosts suggested when the store is empty
const SAMPLE_HOSTS: &[&[&str]] = &[
    &[
        "shuttle", "add", "Work VPN", "-H", "workuser@work.example.com", "--dns", "-y",
    ],
    &[
        "shuttle", "add", "Dev Server", "-H", "devuser@dev.internal", "-s", "10.0.1.0/24", "-y",
    ],
];

fn render_command(args: &[&str]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains(' ') {
                format!("\"{}\"", arg)
            } else {
                arg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn list_hosts(json: bool) -> Result<()> {
    let hosts = load_all_hosts()?;

    if json {
        let json_output =
            serde_json::to_string_pretty(&hosts).context("Failed to serialize hosts")?;
        println!("{}", json_output);
        return Ok(());
    }

    if hosts.is_empty() {
        println!("{}", "No hosts found.".yellow());
        println!("Create one with: {}", "shuttle add <name>".cyan());
        println!();
        println!("For example:");
        for args in SAMPLE_HOSTS {
            println!("  {}", render_command(args).cyan());
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        header_cell("Name"),
        header_cell("Remote"),
        header_cell("Routes"),
        header_cell("Options"),
    ]);

    for host in &hosts {
        table.add_row(vec![
            Cell::new(&host.name).fg(Color::Green),
            Cell::new(&host.remote_host),
            Cell::new(routes_label(host)),
            Cell::new(options_label(host)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{}", table);
    println!();
    println!("{} host(s) found", hosts.len().to_string().cyan());
    println!();

    Ok(())
}

fn show_host_info(key: String) -> Result<()> {
    let host = load_host_by_key(&key)?;

    println!();
    println!("{}", format!("Host: {}", host.name).bold().green());
    println!("  ID: {}", host.id.to_string().dimmed());
    println!();
    print_host_summary(&host);
    println!();
    println!("{}", "  Command:".bold());
    println!("    sshuttle {}", build_args(&host).join(" "));
    println!();

    Ok(())
}

async fn delete_host_cmd(key: String, yes: bool) -> Result<()> {
    let host = load_host_by_key(&key)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete host '{}'?", host.name))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "Deletion cancelled".dimmed());
            return Ok(());
        }
    }

    let path = delete_host(&host.id)?;

    println!();
    println!(
        "{}",
        format!("Host '{}' deleted successfully", host.name).green()
    );
    println!("  Removed: {}", path.display().to_string().dimmed());
    println!();

    reload_daemon().await;
    Ok(())
}

async fn run_action(key: String, action: HostAction) -> Result<()> {
    let cli_config = CliConfig::load()?;
    let daemon_config = &cli_config.daemon_config;
    let client = create_daemon_client(daemon_config)?;

    let hosts = fetch_status(&client, daemon_config).await?.hosts;
    let target = resolve_host(&hosts, &key)?;

    let status = host_action(&client, daemon_config, target.id, action).await?;

    let verb = match action {
        HostAction::Connect => "Connect",
        HostAction::Disconnect => "Disconnect",
        HostAction::Toggle => "Toggle",
    };
    println!(
        "{} '{}': {}",
        verb,
        status.name,
        state_label(status.state)
    );

    match status.state {
        ConnectionState::Connecting => println!(
            "{}",
            format!("Follow progress with: shuttle watch {}", status.name).dimmed()
        ),
        ConnectionState::Error => {
            println!(
                "{}",
                "The last attempt failed; see 'shuttle watch' or the daemon log for details."
                    .yellow()
            );
        }
        _ => {}
    }

    Ok(())
}

async fn show_status(key: Option<String>) -> Result<()> {
    let cli_config = CliConfig::load()?;
    let daemon_config = &cli_config.daemon_config;
    let client = create_daemon_client(daemon_config)?;

    let status = fetch_status(&client, daemon_config).await?;

    if let Some(key) = key {
        let target = resolve_host(&status.hosts, &key)?;
        let host = fetch_host_status(&client, daemon_config, target.id).await?;
        println!();
        println!("{}", format!("Host: {}", host.name).bold().green());
        println!("  ID:     {}", host.id.to_string().dimmed());
        println!("  Remote: {}", host.remote_host);
        println!("  Mode:   {}", if host.vpn_mode { "VPN" } else { "Subnets" });
        println!("  State:  {}", state_label(host.state));
        println!();
        return Ok(());
    }

    println!();
    println!("Overall: {}", overall_label(status.overall));

    if status.hosts.is_empty() {
        println!();
        println!("{}", "No hosts configured.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        header_cell("Name"),
        header_cell("Remote"),
        header_cell("Mode"),
        header_cell("State"),
    ]);

    for host in &status.hosts {
        table.add_row(vec![
            Cell::new(&host.name).fg(Color::Green),
            Cell::new(&host.remote_host),
            Cell::new(if host.vpn_mode { "VPN" } else { "Subnets" }),
            Cell::new(host.state.to_string()).fg(state_color(host.state)),
        ]);
    }

    println!();
    println!("{}", table);
    println!();

    Ok(())
}

async fn watch_events(key: Option<String>, show_output: bool) -> Result<()> {
    let cli_config = CliConfig::load()?;
    let daemon_config = cli_config.daemon_config.clone();

    // Resolve the filter against the daemon's view of the hosts
    let client = create_daemon_client(&daemon_config)?;
    let hosts = fetch_status(&client, &daemon_config).await?.hosts;
    let filter_id: Option<Uuid> = match key {
        Some(key) => Some(resolve_host(&hosts, &key)?.id),
        None => None,
    };
    let name_of = |id: Uuid| {
        hosts
            .iter()
            .find(|h| h.id == id)
            .map(|h| h.name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    println!(
        "{}",
        "Watching daemon events (Ctrl+C to stop)...".bold()
    );

    let mut events = EventListener::new(daemon_config).listen();

    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        if let (Some(filter), Some(id)) = (filter_id, event.host_id()) {
            if filter != id {
                continue;
            }
        }

        match event {
            HostEvent::StateChanged {
                name,
                state,
                timestamp,
                ..
            } => {
                println!(
                    "{} {} {}",
                    timestamp.format("%H:%M:%S").to_string().dimmed(),
                    name.bold(),
                    state_label(state)
                );
            }
            HostEvent::Alert {
                title,
                message,
                timestamp,
                ..
            } => {
                eprintln!(
                    "{} {}",
                    timestamp.format("%H:%M:%S").to_string().dimmed(),
                    title.red().bold()
                );
                eprintln!("         {}", message.red());
            }
            HostEvent::Output { id, stream, text } if show_output => {
                let prefix = format!("[{}]", name_of(id));
                for line in text.lines() {
                    match stream {
                        OutputStream::Stdout => println!("{} {}", prefix.dimmed(), line),
                        OutputStream::Stderr => {
                            println!("{} {}", prefix.dimmed(), line.yellow())
                        }
                    }
                }
            }
            HostEvent::Output { .. } | HostEvent::Heartbeat { .. } => {}
        }
    }

    Ok(())
}

/// Ask the daemon to pick up store changes. Best effort: the daemon may not be running.
async fn reload_daemon() {
    let result = async {
        let cli_config = CliConfig::load()?;
        let client = create_daemon_client(&cli_config.daemon_config)?;
        reload_hosts(&client, &cli_config.daemon_config).await
    }
    .await;

    match result {
        Ok(_) => println!("{}", "Daemon reloaded hosts.".dimmed()),
        Err(e) => {
            debug!("Daemon reload failed: {:#}", e);
            println!(
                "{}",
                "Daemon not reachable; it will load the change when it starts.".dimmed()
            );
        }
    }
}

/// Find a host in the daemon's list by UUID or (case-insensitive) name
fn resolve_host<'a>(hosts: &'a [HostStatus], key: &str) -> Result<&'a HostStatus> {
    if let Ok(id) = key.parse::<Uuid>() {
        if let Some(host) = hosts.iter().find(|h| h.id == id) {
            return Ok(host);
        }
    }
    hosts
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(key.trim()))
        .ok_or_else(|| anyhow::anyhow!("Host '{}' not found", key))
}

fn print_host_summary(host: &HostConfig) {
    println!("{}", "  Connection:".bold());
    println!("    Remote:  {}", host.remote_host.cyan());
    println!("    Routes:  {}", routes_label(host));
    println!("    Options: {}", options_label(host));
    if let Some(excluded) = &host.excluded_subnets {
        println!("    Exclude: {}", excluded);
    }
    if let Some(command) = &host.custom_ssh_command {
        println!("    ssh:     {}", command);
    }
}

fn routes_label(host: &HostConfig) -> String {
    if host.vpn_mode {
        "all traffic (VPN)".to_string()
    } else {
        host.subnets.join(", ")
    }
}

fn options_label(host: &HostConfig) -> String {
    let mut options = Vec::new();
    if host.vpn_mode || host.forward_dns {
        options.push("dns");
    }
    if host.auto_add_hostnames && !host.vpn_mode {
        options.push("auto-hosts");
    }
    if host.custom_ssh_command.is_some() {
        options.push("ssh-cmd");
    }
    if options.is_empty() {
        "-".to_string()
    } else {
        options.join(", ")
    }
}

fn header_cell(title: &str) -> Cell {
    Cell::new(title)
        .add_attribute(Attribute::Bold)
        .fg(Color::Cyan)
}

fn state_label(state: ConnectionState) -> ColoredString {
    let label = state.to_string();
    match state {
        ConnectionState::Connected => label.green().bold(),
        ConnectionState::Connecting => label.yellow(),
        ConnectionState::Error => label.red().bold(),
        ConnectionState::Disconnected => label.dimmed(),
    }
}

fn state_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Error => Color::Red,
        ConnectionState::Disconnected => Color::DarkGrey,
    }
}

fn overall_label(overall: OverallStatus) -> ColoredString {
    match overall {
        OverallStatus::Idle => "idle".dimmed(),
        OverallStatus::Connected => "connected".green().bold(),
        OverallStatus::VpnActive => "VPN active".magenta().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str) -> HostStatus {
        HostStatus {
            id: Uuid::new_v4(),
            name: name.to_string(),
            remote_host: format!("me@{}.example.com", name.to_lowercase()),
            vpn_mode: false,
            state: ConnectionState::Disconnected,
        }
    }

    #[test]
    fn test_sample_hosts_parse() {
        let parsed: Vec<(String, Option<String>, Option<String>, bool)> = SAMPLE_HOSTS
            .iter()
            .map(|args| match Cli::try_parse_from(args.iter().copied()).unwrap().command {
                Commands::Add {
                    name,
                    remote_host,
                    subnets,
                    dns,
                    non_interactive,
                    ..
                } => {
                    assert!(non_interactive);
                    (name, remote_host, subnets, dns)
                }
                _ => panic!("expected add"),
            })
            .collect();

        assert_eq!(parsed[0].0, "Work VPN");
        assert_eq!(parsed[0].1.as_deref(), Some("workuser@work.example.com"));
        assert!(parsed[0].2.is_none());
        assert!(parsed[0].3);
        assert_eq!(parsed[1].0, "Dev Server");
        assert_eq!(parsed[1].2.as_deref(), Some("10.0.1.0/24"));
        assert!(!parsed[1].3);
    }

    #[test]
    fn test_render_command_quotes_spaces() {
        assert_eq!(
            render_command(SAMPLE_HOSTS[0]),
            "shuttle add \"Work VPN\" -H workuser@work.example.com --dns -y"
        );
    }

    #[test]
    fn test_resolve_host_by_name_or_id() {
        let hosts = vec![status("Work"), status("Dev")];

        assert_eq!(resolve_host(&hosts, "work").unwrap().id, hosts[0].id);
        assert_eq!(
            resolve_host(&hosts, &hosts[1].id.to_string()).unwrap().name,
            "Dev"
        );

        let err = resolve_host(&hosts, "staging").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_edits_apply_and_clear() {
        let mut host = HostConfig::new("Work", "me@work.example.com");
        host.custom_ssh_command = Some("ssh -i ~/.ssh/work".to_string());

        let edits = HostEdits {
            subnets: Some("10.0.0.0/8, 192.168.1.0/24".to_string()),
            forward_dns: Some(true),
            custom_ssh_command: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!edits.is_empty());

        let host = edits.apply(host);
        assert_eq!(host.subnets, vec!["10.0.0.0/8", "192.168.1.0/24"]);
        assert!(host.forward_dns);
        assert_eq!(host.custom_ssh_command, None);
        assert_eq!(host.name, "Work");
    }

    #[test]
    fn test_empty_subnets_fall_back_to_catch_all() {
        let edits = HostEdits {
            remote_host: Some("me@dev.internal".to_string()),
            subnets: Some(" , ".to_string()),
            ..Default::default()
        };
        let host = edits.apply(HostConfig::new("Dev", ""));
        assert_eq!(host.subnets, vec!["0/0"]);
        assert_eq!(host.remote_host, "me@dev.internal");
    }

    #[test]
    fn test_option_labels() {
        let mut host = HostConfig::new("Work", "me@work.example.com");
        assert_eq!(options_label(&host), "-");

        host.vpn_mode = true;
        host.auto_add_hostnames = true;
        assert_eq!(routes_label(&host), "all traffic (VPN)");
        assert_eq!(options_label(&host), "dns");
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["shuttle", "watch", "Work", "--output"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watch { host: Some(ref h), output: true } if h == "Work"
        ));

        let cli = Cli::try_parse_from(["shuttle", "edit", "Work", "--vpn", "true"]).unwrap();
        assert!(matches!(cli.command, Commands::Edit { vpn: Some(true), .. }));

        assert!(Cli::try_parse_from(["shuttle", "connect"]).is_err());
    }
}
