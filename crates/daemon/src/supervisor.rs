// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Supervisor Module
// Owns the host registry and the sshuttle processes. Requests and process
// callbacks are serialized through one queue consumed by a single task.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shuttlecraft_common::{
    build_args, ConnectionState, Error, HostConfig, HostEvent, HostStatus, OutputStream, Result,
    Transition, Utc,
};

use crate::process::{self, ExitReport, ProcessHandle};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How the supervisor starts sshuttle
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// sshuttle executable
    pub sshuttle_path: PathBuf,
    /// Optional command prefix (e.g. `sudo -n`); its first entry becomes the program
    pub launcher: Vec<String>,
}

impl SupervisorConfig {
    /// Program and arguments used to start a tunnel for `host`
    pub fn command_line(&self, host: &HostConfig) -> (PathBuf, Vec<String>) {
        let tool_args = build_args(host);

        match self.launcher.split_first() {
            Some((program, prefix)) => {
                let mut args = prefix.to_vec();
                args.push(self.sshuttle_path.to_string_lossy().into_owned());
                args.extend(tool_args);
                (PathBuf::from(program), args)
            }
            None => (self.sshuttle_path.clone(), tool_args),
        }
    }
}

/// Everything the supervisor task reacts to
#[derive(Debug)]
pub enum SupervisorMsg {
    Toggle {
        id: Uuid,
        reply: oneshot::Sender<Result<HostStatus>>,
    },
    Connect {
        id: Uuid,
        reply: oneshot::Sender<Result<HostStatus>>,
    },
    Disconnect {
        id: Uuid,
        reply: oneshot::Sender<Result<HostStatus>>,
    },
    Status {
        id: Uuid,
        reply: oneshot::Sender<Result<HostStatus>>,
    },
    List {
        reply: oneshot::Sender<Vec<HostStatus>>,
    },
    Sync {
        hosts: Vec<HostConfig>,
        reply: oneshot::Sender<Vec<HostStatus>>,
    },
    ShutdownAll {
        reply: oneshot::Sender<Vec<JoinHandle<()>>>,
    },
    /// Decoded chunk from a tunnel process, already classified
    Output {
        id: Uuid,
        generation: u64,
        stream: OutputStream,
        text: String,
        transition: Option<Transition>,
    },
    /// A tunnel process ended
    Exited {
        id: Uuid,
        generation: u64,
        report: ExitReport,
    },
}

/// Connection supervisor state. Only the supervisor task touches it.
pub struct Supervisor {
    config: SupervisorConfig,
    hosts: HashMap<Uuid, HostConfig>,
    processes: HashMap<Uuid, ProcessHandle>,
    next_generation: u64,
    msg_tx: mpsc::UnboundedSender<SupervisorMsg>,
    event_tx: broadcast::Sender<HostEvent>,
}

impl Supervisor {
    /// Build a supervisor over `hosts`. Persisted states are not trusted:
    /// every adopted host starts disconnected.
    pub fn new(
        config: SupervisorConfig,
        hosts: Vec<HostConfig>,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorMsg>) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut supervisor = Self {
            config,
            hosts: HashMap::new(),
            processes: HashMap::new(),
            next_generation: 0,
            msg_tx,
            event_tx,
        };
        for host in hosts {
            supervisor.upsert_host(host);
        }

        (supervisor, msg_rx)
    }

    /// Start the supervisor task and return a handle to it
    pub fn spawn(config: SupervisorConfig, hosts: Vec<HostConfig>) -> SupervisorHandle {
        let (supervisor, msg_rx) = Self::new(config, hosts);
        let handle = SupervisorHandle {
            msg_tx: supervisor.msg_tx.clone(),
            event_tx: supervisor.event_tx.clone(),
        };
        tokio::spawn(supervisor.run(msg_rx));
        handle
    }

    async fn run(mut self, mut msg_rx: mpsc::UnboundedReceiver<SupervisorMsg>) {
        info!("Supervisor started with {} host(s)", self.hosts.len());
        while let Some(msg) = msg_rx.recv().await {
            self.handle(msg);
        }
    }

    /// Apply one message
    pub fn handle(&mut self, msg: SupervisorMsg) {
        // A dropped reply receiver means the caller gave up; nothing to do
        match msg {
            SupervisorMsg::Toggle { id, reply } => {
                let _ = reply.send(self.toggle(id));
            }
            SupervisorMsg::Connect { id, reply } => {
                let _ = reply.send(self.connect(id));
            }
            SupervisorMsg::Disconnect { id, reply } => {
                let _ = reply.send(self.disconnect(id));
            }
            SupervisorMsg::Status { id, reply } => {
                let _ = reply.send(self.status(id));
            }
            SupervisorMsg::List { reply } => {
                let _ = reply.send(self.list());
            }
            SupervisorMsg::Sync { hosts, reply } => {
                let _ = reply.send(self.sync_hosts(hosts));
            }
            SupervisorMsg::ShutdownAll { reply } => {
                let _ = reply.send(self.shutdown_all());
            }
            SupervisorMsg::Output {
                id,
                generation,
                stream,
                text,
                transition,
            } => self.on_output(id, generation, stream, text, transition),
            SupervisorMsg::Exited {
                id,
                generation,
                report,
            } => self.on_exit(id, generation, report),
        }
    }

    /// All hosts, sorted by name
    pub fn list(&self) -> Vec<HostStatus> {
        let mut hosts: Vec<HostStatus> = self.hosts.values().map(snapshot).collect();
        hosts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        hosts
    }

    pub fn status(&self, id: Uuid) -> Result<HostStatus> {
        self.hosts
            .get(&id)
            .map(snapshot)
            .ok_or(Error::HostNotFound(id))
    }

    /// Flip a host: stop it when connecting/connected, start it when disconnected/error.
    /// Returns without waiting for the process to react.
    pub fn toggle(&mut self, id: Uuid) -> Result<HostStatus> {
        let state = self.status(id)?.state;

        if state.is_active() {
            self.stop_process(id);
        } else {
            self.start_process(id);
        }

        self.status(id)
    }

    /// Start a host unless it is already connecting or connected
    pub fn connect(&mut self, id: Uuid) -> Result<HostStatus> {
        let state = self.status(id)?.state;

        if state.is_active() {
            debug!("Host {} already {}", id, state);
        } else {
            self.start_process(id);
        }

        self.status(id)
    }

    /// Stop a host. An errored host is reset to disconnected.
    pub fn disconnect(&mut self, id: Uuid) -> Result<HostStatus> {
        let state = self.status(id)?.state;

        if state != ConnectionState::Disconnected {
            self.stop_process(id);
        }

        self.status(id)
    }

    /// Add a host or replace its configuration, keeping the live state of a known host
    pub fn upsert_host(&mut self, host: HostConfig) -> HostStatus {
        let host = host.normalized();
        let id = host.id;

        let status = match self.hosts.get(&id) {
            Some(existing) => {
                if existing.status.is_active() {
                    warn!(
                        "Host '{}' changed while {}; the change applies to the next connection",
                        host.name, existing.status
                    );
                }
                existing.status
            }
            None => {
                debug!("Adopted host '{}' ({})", host.name, id);
                ConnectionState::Disconnected
            }
        };

        let host = HostConfig { status, ..host };
        let current = snapshot(&host);
        self.hosts.insert(id, host);
        current
    }

    /// Forget a host, terminating its process if one is running.
    /// Observers see an active host go disconnected before it disappears.
    pub fn remove_host(&mut self, id: Uuid) -> Result<()> {
        if self.status(id)?.state.is_active() {
            self.stop_process(id);
        }

        let host = self.hosts.remove(&id).ok_or(Error::HostNotFound(id))?;

        info!("Removed host '{}' ({})", host.name, id);
        Ok(())
    }

    /// Make the registry match `hosts`: unknown ids are removed, the rest upserted
    pub fn sync_hosts(&mut self, hosts: Vec<HostConfig>) -> Vec<HostStatus> {
        let keep: HashSet<Uuid> = hosts.iter().map(|h| h.id).collect();
        let stale: Vec<Uuid> = self
            .hosts
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();

        for id in stale {
            if let Err(e) = self.remove_host(id) {
                warn!("Failed to remove host {}: {}", id, e);
            }
        }
        for host in hosts {
            self.upsert_host(host);
        }

        self.list()
    }

    /// Terminate every process and mark active hosts disconnected.
    /// Returns the exit waiters so the caller can wait for the tunnels to close.
    pub fn shutdown_all(&mut self) -> Vec<JoinHandle<()>> {
        let mut waiters = Vec::new();

        for (id, handle) in self.processes.drain() {
            let name = self.hosts.get(&id).map(|h| h.name.as_str()).unwrap_or("?");
            info!("Terminating process for: {}", name);
            waiters.extend(handle.terminate());
        }

        let active: Vec<Uuid> = self
            .hosts
            .values()
            .filter(|h| h.status.is_active())
            .map(|h| h.id)
            .collect();
        for id in active {
            self.set_state(id, ConnectionState::Disconnected);
        }

        waiters
    }

    /// Handle a classified output chunk. Only the tracked process of a
    /// connecting host can move it to connected or error.
    pub fn on_output(
        &mut self,
        id: Uuid,
        generation: u64,
        stream: OutputStream,
        text: String,
        transition: Option<Transition>,
    ) {
        if !self.is_current(id, generation) {
            debug!("Dropping output of stale process for {}", id);
            return;
        }
        let Some(host) = self.hosts.get(&id) else {
            return;
        };
        let name = host.name.clone();
        let state = host.status;

        debug!("[{}] {}: {}", name, stream, text);
        let _ = self.event_tx.send(HostEvent::Output { id, stream, text });

        if state != ConnectionState::Connecting {
            return;
        }

        match transition {
            None => {}
            Some(Transition::Connected) => {
                self.set_state(id, ConnectionState::Connected);
            }
            Some(Transition::Error(excerpt)) => {
                self.alert(
                    id,
                    format!("Connection Error: {}", name),
                    format!("Details: {}", excerpt),
                );
                self.set_state(id, ConnectionState::Error);
                if let Some(handle) = self.processes.remove(&id) {
                    handle.terminate();
                }
            }
        }
    }

    /// Handle the exit of a tunnel process. Exits of processes that are no
    /// longer tracked are ignored.
    pub fn on_exit(&mut self, id: Uuid, generation: u64, report: ExitReport) {
        if !self.is_current(id, generation) {
            debug!("Ignoring exit of stale process for {} ({})", id, report);
            return;
        }

        // Dropping the handle detaches the readers
        self.processes.remove(&id);

        let Some(host) = self.hosts.get(&id) else {
            return;
        };
        let name = host.name.clone();
        info!("Process for '{}' terminated ({})", name, report);

        match host.status {
            ConnectionState::Connecting => {
                self.alert(
                    id,
                    format!("Connection Failed: {}", name),
                    format!(
                        "Process terminated unexpectedly ({}). sshuttle output might contain more details.",
                        report
                    ),
                );
                self.set_state(id, ConnectionState::Error);
            }
            ConnectionState::Error => {}
            _ => self.set_state(id, ConnectionState::Disconnected),
        }
    }

    fn start_process(&mut self, id: Uuid) {
        let Some(host) = self.hosts.get(&id).cloned() else {
            return;
        };

        let (program, args) = self.config.command_line(&host);
        info!(
            "Connecting '{}': {} {}",
            host.name,
            program.display(),
            args.join(" ")
        );

        self.next_generation += 1;
        let generation = self.next_generation;

        match process::launch(&program, &args, id, generation, self.msg_tx.clone()) {
            Ok(handle) => {
                if let Some(previous) = self.processes.insert(id, handle) {
                    warn!("Replacing untracked process for '{}'", host.name);
                    previous.terminate();
                }
                self.set_state(id, ConnectionState::Connecting);
            }
            Err(e) => {
                error!("Failed to launch sshuttle for '{}': {}", host.name, e);
                self.alert(
                    id,
                    format!("Launch Error: {}", host.name),
                    format!("Failed to start sshuttle: {}", e),
                );
                self.set_state(id, ConnectionState::Error);
            }
        }
    }

    fn stop_process(&mut self, id: Uuid) {
        if let Some(handle) = self.processes.remove(&id) {
            info!("Terminating process for {}", id);
            handle.terminate();
        }
        self.set_state(id, ConnectionState::Disconnected);
    }

    fn is_current(&self, id: Uuid, generation: u64) -> bool {
        self.processes.get(&id).map(ProcessHandle::generation) == Some(generation)
    }

    fn set_state(&mut self, id: Uuid, state: ConnectionState) {
        let Some(host) = self.hosts.get_mut(&id) else {
            return;
        };
        if host.status == state {
            return;
        }

        info!("Host '{}': {} -> {}", host.name, host.status, state);
        host.status = state;

        let _ = self.event_tx.send(HostEvent::StateChanged {
            id,
            name: host.name.clone(),
            state,
            timestamp: Utc::now(),
        });
    }

    fn alert(&self, id: Uuid, title: String, message: String) {
        warn!("{}: {}", title, message);
        let _ = self.event_tx.send(HostEvent::Alert {
            id,
            title,
            message,
            timestamp: Utc::now(),
        });
    }
}

fn snapshot(host: &HostConfig) -> HostStatus {
    HostStatus {
        id: host.id,
        name: host.name.clone(),
        remote_host: host.remote_host.clone(),
        vpn_mode: host.vpn_mode,
        state: host.status,
    }
}

/// Cloneable front door to the supervisor task
#[derive(Clone)]
pub struct SupervisorHandle {
    msg_tx: mpsc::UnboundedSender<SupervisorMsg>,
    event_tx: broadcast::Sender<HostEvent>,
}

impl SupervisorHandle {
    /// Subscribe to state changes, alerts and output
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> SupervisorMsg) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.msg_tx
            .send(make(reply_tx))
            .map_err(|_| Error::Supervisor("supervisor task has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Supervisor("request was dropped".to_string()))
    }

    pub async fn toggle(&self, id: Uuid) -> Result<HostStatus> {
        self.request(|reply| SupervisorMsg::Toggle { id, reply })
            .await?
    }

    pub async fn connect(&self, id: Uuid) -> Result<HostStatus> {
        self.request(|reply| SupervisorMsg::Connect { id, reply })
            .await?
    }

    pub async fn disconnect(&self, id: Uuid) -> Result<HostStatus> {
        self.request(|reply| SupervisorMsg::Disconnect { id, reply })
            .await?
    }

    pub async fn status(&self, id: Uuid) -> Result<HostStatus> {
        self.request(|reply| SupervisorMsg::Status { id, reply })
            .await?
    }

    pub async fn list(&self) -> Result<Vec<HostStatus>> {
        self.request(|reply| SupervisorMsg::List { reply }).await
    }

    pub async fn sync_hosts(&self, hosts: Vec<HostConfig>) -> Result<Vec<HostStatus>> {
        self.request(|reply| SupervisorMsg::Sync { hosts, reply })
            .await
    }

    /// Terminate every tunnel, then wait up to `grace` for the processes to exit
    pub async fn shutdown_all(&self, grace: Duration) -> Result<()> {
        let waiters = self
            .request(|reply| SupervisorMsg::ShutdownAll { reply })
            .await?;

        if waiters.is_empty() {
            return Ok(());
        }

        info!("Waiting for {} tunnel process(es) to exit", waiters.len());
        if tokio::time::timeout(grace, futures::future::join_all(waiters))
            .await
            .is_err()
        {
            warn!("Tunnel processes did not exit within {:?}", grace);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_config(script: &str) -> SupervisorConfig {
        SupervisorConfig {
            sshuttle_path: PathBuf::from("sshuttle"),
            launcher: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
        }
    }

    fn missing_binary_config() -> SupervisorConfig {
        SupervisorConfig {
            sshuttle_path: PathBuf::from("/nonexistent/shuttlecraft/sshuttle"),
            launcher: Vec::new(),
        }
    }

    fn work_host() -> HostConfig {
        HostConfig::new("Work", "me@work.example.com")
    }

    /// Feed queued process messages into the supervisor until `done` holds
    async fn pump_until(
        supervisor: &mut Supervisor,
        rx: &mut mpsc::UnboundedReceiver<SupervisorMsg>,
        done: impl Fn(&Supervisor) -> bool,
    ) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !done(supervisor) {
            let msg = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("timed out waiting for supervisor messages")
                .expect("queue closed");
            supervisor.handle(msg);
        }
    }

    fn state_of(supervisor: &Supervisor, id: Uuid) -> ConnectionState {
        supervisor.status(id).unwrap().state
    }

    fn drain_alerts(events: &mut broadcast::Receiver<HostEvent>) -> Vec<(String, String)> {
        let mut alerts = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let HostEvent::Alert { title, message, .. } = event {
                alerts.push((title, message));
            }
        }
        alerts
    }

    #[test]
    fn test_command_line_without_launcher() {
        let config = SupervisorConfig {
            sshuttle_path: PathBuf::from("/opt/homebrew/bin/sshuttle"),
            launcher: Vec::new(),
        };
        let (program, args) = config.command_line(&work_host());
        assert_eq!(program, PathBuf::from("/opt/homebrew/bin/sshuttle"));
        assert_eq!(args, vec!["-r", "me@work.example.com", "0/0", "-v"]);
    }

    #[test]
    fn test_command_line_with_launcher() {
        let config = SupervisorConfig {
            sshuttle_path: PathBuf::from("/usr/local/bin/sshuttle"),
            launcher: vec!["sudo".to_string(), "-n".to_string()],
        };
        let (program, args) = config.command_line(&work_host());
        assert_eq!(program, PathBuf::from("sudo"));
        assert_eq!(
            args,
            vec![
                "-n",
                "/usr/local/bin/sshuttle",
                "-r",
                "me@work.example.com",
                "0/0",
                "-v"
            ]
        );
    }

    #[tokio::test]
    async fn test_adopted_hosts_start_disconnected() {
        let mut host = work_host();
        host.status = ConnectionState::Connected;
        let id = host.id;

        let (supervisor, _rx) = Supervisor::new(missing_binary_config(), vec![host]);
        assert_eq!(state_of(&supervisor, id), ConnectionState::Disconnected);
        assert_eq!(supervisor.list().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_found() {
        let (mut supervisor, _rx) = Supervisor::new(missing_binary_config(), Vec::new());
        let id = Uuid::new_v4();

        assert!(matches!(supervisor.toggle(id), Err(Error::HostNotFound(_))));
        assert!(matches!(supervisor.status(id), Err(Error::HostNotFound(_))));
        assert!(matches!(supervisor.remove_host(id), Err(Error::HostNotFound(_))));
    }

    #[tokio::test]
    async fn test_launch_failure_sets_error_and_alerts() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, _rx) = Supervisor::new(missing_binary_config(), vec![host]);
        let mut events = supervisor.event_tx.subscribe();

        let status = supervisor.toggle(id).unwrap();
        assert_eq!(status.state, ConnectionState::Error);
        assert!(supervisor.processes.is_empty());

        let alerts = drain_alerts(&mut events);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "Launch Error: Work");
        assert!(alerts[0].1.starts_with("Failed to start sshuttle: "));
    }

    #[tokio::test]
    async fn test_disconnect_clears_error() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, _rx) = Supervisor::new(missing_binary_config(), vec![host]);

        supervisor.toggle(id).unwrap();
        assert_eq!(state_of(&supervisor, id), ConnectionState::Error);

        let status = supervisor.disconnect(id).unwrap();
        assert_eq!(status.state, ConnectionState::Disconnected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_toggle_connects_and_disconnects() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) =
            Supervisor::new(shell_config("echo 'c : Connected to server.'; sleep 30"), vec![host]);
        let mut events = supervisor.event_tx.subscribe();

        let status = supervisor.toggle(id).unwrap();
        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(supervisor.processes.len(), 1);

        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Connected
        })
        .await;

        let status = supervisor.toggle(id).unwrap();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(supervisor.processes.is_empty());

        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let HostEvent::StateChanged { state, .. } = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_late_exit_after_disconnect_is_ignored() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) =
            Supervisor::new(shell_config("echo 'c : Connected to server.'; sleep 30"), vec![host]);

        supervisor.toggle(id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Connected
        })
        .await;
        supervisor.toggle(id).unwrap();

        // The terminated process still reports its exit
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let msg = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("no exit reported")
                .expect("queue closed");
            let is_exit = matches!(msg, SupervisorMsg::Exited { .. });
            supervisor.handle(msg);
            if is_exit {
                break;
            }
        }
        assert_eq!(state_of(&supervisor, id), ConnectionState::Disconnected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_after_connected_is_ignored() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) =
            Supervisor::new(shell_config("echo 'c : Connected to server.'; sleep 30"), vec![host]);

        supervisor.toggle(id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Connected
        })
        .await;

        let generation = supervisor.processes[&id].generation();
        supervisor.on_output(
            id,
            generation,
            OutputStream::Stderr,
            "fatal: server died".to_string(),
            Some(Transition::Error("fatal: server died".to_string())),
        );
        assert_eq!(state_of(&supervisor, id), ConnectionState::Connected);
        assert_eq!(supervisor.processes.len(), 1);

        supervisor.shutdown_all();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_error_output_terminates_and_alerts() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) = Supervisor::new(
            shell_config("echo 'ssh: connect to host work port 22: Connection refused' >&2; sleep 30"),
            vec![host],
        );
        let mut events = supervisor.event_tx.subscribe();

        supervisor.toggle(id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Error
        })
        .await;

        assert!(supervisor.processes.is_empty());
        let alerts = drain_alerts(&mut events);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "Connection Error: Work");
        assert_eq!(
            alerts[0].1,
            "Details: ssh: connect to host work port 22: Connection refused"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_while_connecting_is_failure() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) = Supervisor::new(shell_config("exit 0"), vec![host]);
        let mut events = supervisor.event_tx.subscribe();

        supervisor.toggle(id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Error
        })
        .await;

        assert!(supervisor.processes.is_empty());
        let alerts = drain_alerts(&mut events);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "Connection Failed: Work");
        assert_eq!(
            alerts[0].1,
            "Process terminated unexpectedly (exit code: 0). sshuttle output might contain more details."
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_after_connected_is_disconnect() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) = Supervisor::new(
            shell_config("echo 'c : Connected to server.'; sleep 1; exit 0"),
            vec![host],
        );
        let mut events = supervisor.event_tx.subscribe();

        supervisor.toggle(id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Connected
        })
        .await;
        pump_until(&mut supervisor, &mut rx, |s| s.processes.is_empty()).await;

        assert_eq!(state_of(&supervisor, id), ConnectionState::Disconnected);
        assert!(drain_alerts(&mut events).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_toggle_from_error_starts_new_attempt() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, mut rx) = Supervisor::new(shell_config("exit 1"), vec![host]);

        supervisor.toggle(id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, id) == ConnectionState::Error
        })
        .await;

        let status = supervisor.toggle(id).unwrap();
        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(supervisor.processes[&id].generation(), 2);

        supervisor.shutdown_all();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, _rx) = Supervisor::new(shell_config("sleep 30"), vec![host]);

        supervisor.toggle(id).unwrap();
        let generation = supervisor.processes[&id].generation();

        supervisor.on_exit(id, generation + 1, ExitReport::code(1));
        supervisor.on_output(
            id,
            generation + 1,
            OutputStream::Stdout,
            "c : Connected to server.".to_string(),
            Some(Transition::Connected),
        );
        assert_eq!(state_of(&supervisor, id), ConnectionState::Connecting);
        assert_eq!(supervisor.processes.len(), 1);

        supervisor.on_exit(id, generation, ExitReport::code(1));
        assert_eq!(state_of(&supervisor, id), ConnectionState::Error);
        assert!(supervisor.processes.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_all() {
        let first = work_host();
        let second = HostConfig::new("Dev", "me@dev.internal");
        let (first_id, second_id) = (first.id, second.id);
        let (mut supervisor, _rx) =
            Supervisor::new(shell_config("sleep 30"), vec![first, second]);

        supervisor.toggle(first_id).unwrap();
        supervisor.toggle(second_id).unwrap();
        assert_eq!(supervisor.processes.len(), 2);

        let waiters = supervisor.shutdown_all();
        assert_eq!(waiters.len(), 2);
        assert!(supervisor.processes.is_empty());
        assert_eq!(state_of(&supervisor, first_id), ConnectionState::Disconnected);
        assert_eq!(state_of(&supervisor, second_id), ConnectionState::Disconnected);

        tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(waiters))
            .await
            .expect("processes did not exit");
    }

    #[tokio::test]
    async fn test_upsert_keeps_state_and_sync_removes() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, _rx) = Supervisor::new(missing_binary_config(), vec![host.clone()]);

        supervisor.toggle(id).unwrap();
        assert_eq!(state_of(&supervisor, id), ConnectionState::Error);

        let mut renamed = host.clone();
        renamed.name = "Office".to_string();
        renamed.vpn_mode = true;
        let status = supervisor.upsert_host(renamed);
        assert_eq!(status.name, "Office");
        assert!(status.vpn_mode);
        assert_eq!(status.state, ConnectionState::Error);

        let dev = HostConfig::new("Dev", "me@dev.internal");
        let hosts = supervisor.sync_hosts(vec![dev.clone()]);
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].id, dev.id);
        assert!(matches!(supervisor.status(id), Err(Error::HostNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_one_host_failing_leaves_others_alone() {
        let good = work_host();
        let bad = HostConfig::new("Dev", "me@dev.internal");
        let (good_id, bad_id) = (good.id, bad.id);
        let (mut supervisor, mut rx) = Supervisor::new(
            shell_config(
                "case \"$2\" in \
                 me@work.example.com) echo 'c : Connected to server.'; sleep 30;; \
                 *) echo 'fatal: failed to establish ssh session' >&2; sleep 30;; \
                 esac",
            ),
            vec![good, bad],
        );

        supervisor.toggle(good_id).unwrap();
        supervisor.toggle(bad_id).unwrap();
        pump_until(&mut supervisor, &mut rx, |s| {
            state_of(s, good_id) == ConnectionState::Connected
                && state_of(s, bad_id) == ConnectionState::Error
        })
        .await;

        assert_eq!(supervisor.processes.len(), 1);
        assert!(supervisor.processes.contains_key(&good_id));

        let waiters = supervisor.shutdown_all();
        assert_eq!(waiters.len(), 1);
        assert_eq!(state_of(&supervisor, good_id), ConnectionState::Disconnected);
        assert_eq!(state_of(&supervisor, bad_id), ConnectionState::Error);

        tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(waiters))
            .await
            .expect("processes did not exit");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_removing_active_host_reports_disconnect() {
        let host = work_host();
        let id = host.id;
        let (mut supervisor, _rx) = Supervisor::new(shell_config("sleep 30"), vec![host]);
        let mut events = supervisor.event_tx.subscribe();

        supervisor.toggle(id).unwrap();
        assert_eq!(supervisor.processes.len(), 1);

        let hosts = supervisor.sync_hosts(Vec::new());
        assert!(hosts.is_empty());
        assert!(supervisor.processes.is_empty());

        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let HostEvent::StateChanged { id: event_id, state, .. } = event {
                assert_eq!(event_id, id);
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![ConnectionState::Connecting, ConnectionState::Disconnected]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handle_round_trip() {
        let host = work_host();
        let id = host.id;
        let handle = Supervisor::spawn(
            shell_config("echo 'c : Connected to server.'; sleep 30"),
            vec![host],
        );
        let mut events = handle.subscribe();

        let status = handle.toggle(id).await.unwrap();
        assert_eq!(status.state, ConnectionState::Connecting);

        let connected = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match events.recv().await {
                    Ok(HostEvent::StateChanged { state, .. })
                        if state == ConnectionState::Connected =>
                    {
                        break
                    }
                    Ok(_) => continue,
                    Err(e) => panic!("event stream failed: {}", e),
                }
            }
        })
        .await;
        assert!(connected.is_ok());

        assert_eq!(handle.list().await.unwrap().len(), 1);
        handle.shutdown_all(Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            handle.status(id).await.unwrap().state,
            ConnectionState::Disconnected
        );
    }
}
