// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Tunnel Process Module
// Spawns sshuttle, reads its output in chunks and reports its exit,
// posting everything into the supervisor queue

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, warn};
use uuid::Uuid;

use shuttlecraft_common::{classify, decode_chunk, OutputStream};

use crate::supervisor::SupervisorMsg;

/// How a tunnel process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitReport {
    #[cfg(test)]
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }
}

impl From<ExitStatus> for ExitReport {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code: {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => f.write_str("exit status unknown"),
        }
    }
}

/// Supervisor-owned handle to one running tunnel process.
///
/// Dropping the handle detaches the output readers and asks the process to terminate.
pub struct ProcessHandle {
    generation: u64,
    readers: Vec<JoinHandle<()>>,
    kill_tx: Option<oneshot::Sender<()>>,
    waiter: Option<JoinHandle<()>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("generation", &self.generation)
            .field("readers", &self.readers.len())
            .finish()
    }
}

impl ProcessHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop reading output and request termination without waiting.
    /// Returns the exit-waiter task so a caller may wait for the exit.
    pub fn terminate(mut self) -> Option<JoinHandle<()>> {
        self.release();
        self.waiter.take()
    }

    fn release(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        if let Some(kill_tx) = self.kill_tx.take() {
            // The waiter is gone if the process already exited
            let _ = kill_tx.send(());
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Spawn `program args...` and attach stdout/stderr readers and an exit waiter.
///
/// Every message posted for this process carries `generation` so the supervisor
/// can drop messages from a process it no longer tracks.
pub fn launch(
    program: &Path,
    args: &[String],
    id: Uuid,
    generation: u64,
    msg_tx: mpsc::UnboundedSender<SupervisorMsg>,
) -> std::io::Result<ProcessHandle> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    debug!("Spawned {} (pid {:?})", program.display(), child.id());

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(
            stdout,
            OutputStream::Stdout,
            id,
            generation,
            msg_tx.clone(),
        ));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(
            stderr,
            OutputStream::Stderr,
            id,
            generation,
            msg_tx.clone(),
        ));
    }

    let (kill_tx, kill_rx) = oneshot::channel();
    let waiter = tokio::spawn(wait_for_exit(child, kill_rx, id, generation, msg_tx));

    Ok(ProcessHandle {
        generation,
        readers,
        kill_tx: Some(kill_tx),
        waiter: Some(waiter),
    })
}

fn spawn_reader<R>(
    reader: R,
    stream: OutputStream,
    id: Uuid,
    generation: u64,
    msg_tx: mpsc::UnboundedSender<SupervisorMsg>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunks = FramedRead::new(reader, BytesCodec::new());

        while let Some(chunk) = chunks.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Stopped reading {} of {}: {}", stream, id, e);
                    break;
                }
            };

            // Undecodable or blank chunks carry nothing to classify
            let Some(text) = decode_chunk(&bytes) else {
                continue;
            };
            let transition = classify(&text);

            let msg = SupervisorMsg::Output {
                id,
                generation,
                stream,
                text,
                transition,
            };
            if msg_tx.send(msg).is_err() {
                break;
            }
        }
    })
}

async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    id: Uuid,
    generation: u64,
    msg_tx: mpsc::UnboundedSender<SupervisorMsg>,
) {
    // A dropped sender counts as a kill request too
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };

    let status = match exited {
        Some(status) => status,
        None => {
            request_termination(&mut child);
            child.wait().await
        }
    };

    let report = match status {
        Ok(status) => ExitReport::from(status),
        Err(e) => {
            warn!("Failed to wait for tunnel process of {}: {}", id, e);
            ExitReport::unknown()
        }
    };

    let _ = msg_tx.send(SupervisorMsg::Exited {
        id,
        generation,
        report,
    });
}

/// SIGTERM on unix so sshuttle can restore its firewall rules; hard kill elsewhere
fn request_termination(child: &mut Child) {
    #[cfg(unix)]
    {
        // id() is None once the child has been reaped, so a recycled pid is never hit
        if let Some(pid) = child.id() {
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                debug!(
                    "SIGTERM to pid {} failed: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.start_kill() {
            debug!("Failed to kill tunnel process: {}", e);
        }
    }
}
