//! One external command invocation: start, wait, exit status, signals.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use chainrun_core::{CommandSpec, Environment, KillSignal};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::error::{PoolError, Result};
use crate::output::{OutputSinks, Stream};
use crate::recorder::OutputRecorder;

const PUMP_BUFFER_SIZE: usize = 8 * 1024;

/// Where a process's output goes while it runs.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Straight to the sinks as it is produced
    Live(OutputSinks),
    /// Into the group's recorder, replayed later
    Recorded(Arc<OutputRecorder>),
}

impl Destination {
    fn write(&self, stream: Stream, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Destination::Live(sinks) => {
                sinks.write(stream, bytes)?;
                sinks.flush()
            }
            Destination::Recorded(recorder) => {
                recorder.write(stream, bytes);
                Ok(())
            }
        }
    }
}

enum HandleState {
    Created,
    Started { child: Child, pid: u32 },
    Exited(i32),
    Failed,
}

/// Wraps a single OS process from spawn to exit.
pub struct ProcessHandle {
    spec: CommandSpec,
    state: HandleState,
    /// Output copy tasks; empty when the child writes to inherited stdio
    pumps: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            state: HandleState::Created,
            pumps: Vec::new(),
        }
    }

    /// Spawn the process with `env` and start copying its output to
    /// `destination`. Returns the pid. Standard input is not attached.
    ///
    /// Live output to the process's own stdio is inherited by the child
    /// rather than piped, so nothing outlives the child on our side.
    pub fn start(&mut self, env: &Environment, destination: &Destination) -> Result<u32> {
        if !matches!(self.state, HandleState::Created) {
            return Err(PoolError::AlreadyStarted);
        }

        let inherit = matches!(destination, Destination::Live(sinks) if sinks.is_stdio());
        let output = || if inherit { Stdio::inherit() } else { Stdio::piped() };

        let spawned = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .env_clear()
            .envs(env.vars.iter().map(|(k, v)| (k, v)))
            .current_dir(&env.cwd)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.state = HandleState::Failed;
                return Err(PoolError::spawn_failed(&self.spec.program, e));
            }
        };

        let Some(pid) = child.id() else {
            self.state = HandleState::Failed;
            return Err(PoolError::UnreadableExitStatus(format!(
                "{} exited before its pid could be read",
                self.spec.program
            )));
        };

        if let Some(stdout) = child.stdout.take() {
            self.pumps
                .push(tokio::spawn(pump(stdout, Stream::Stdout, destination.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            self.pumps
                .push(tokio::spawn(pump(stderr, Stream::Stderr, destination.clone())));
        }

        debug!(pid, inherit, command = %self.spec.display(), "Process started");

        self.state = HandleState::Started { child, pid };
        Ok(pid)
    }

    /// Block until the process exits and both output streams are drained.
    ///
    /// A normal exit yields its code; death by signal yields `128 + signal`.
    pub async fn wait(&mut self) -> Result<i32> {
        let code = self.reap().await;
        for pump in std::mem::take(&mut self.pumps) {
            let _ = pump.await;
        }
        code
    }

    /// Wait for the direct child only. Its output may still be in flight;
    /// see [`drain_output`](Self::drain_output).
    pub async fn reap(&mut self) -> Result<i32> {
        let HandleState::Started { child, pid } = &mut self.state else {
            return Err(PoolError::NotStarted);
        };
        let pid = *pid;

        let code = match child.wait().await {
            Ok(status) => decode_status(status),
            Err(e) => Err(PoolError::Wait(e)),
        };

        match &code {
            Ok(code) => {
                debug!(pid, code, "Process exited");
                self.state = HandleState::Exited(*code);
            }
            Err(e) => {
                debug!(pid, error = %e, "Process wait failed");
                self.state = HandleState::Failed;
            }
        }

        code
    }

    /// Copy the remaining output until every writer closes the pipes, or
    /// abandon it as soon as `cancelled` turns true. A grandchild that keeps
    /// the pipes open therefore cannot hold up a terminated group.
    ///
    /// Returns false when the output was abandoned.
    pub async fn drain_output(&mut self, cancelled: &mut watch::Receiver<bool>) -> bool {
        let pumps = std::mem::take(&mut self.pumps);
        if pumps.is_empty() {
            return true;
        }

        let aborts: Vec<AbortHandle> = pumps.iter().map(JoinHandle::abort_handle).collect();
        let drained = async move {
            for pump in pumps {
                let _ = pump.await;
            }
        };

        tokio::select! {
            _ = drained => true,
            Ok(_) = cancelled.wait_for(|done| *done) => {
                for abort in &aborts {
                    abort.abort();
                }
                false
            }
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            HandleState::Started { pid, .. } => Some(*pid),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            HandleState::Exited(code) => Some(code),
            _ => None,
        }
    }
}

fn decode_status(status: ExitStatus) -> Result<i32> {
    if let Some(code) = status.code() {
        return Ok(code);
    }
    if let Some(signal) = status.signal() {
        return Ok(128 + signal);
    }
    Err(PoolError::UnreadableExitStatus(status.to_string()))
}

/// Outcome of signalling a process that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    Delivered,
    AlreadyExited,
}

/// Send `signal` to `pid`, treating a vanished process as already exited.
pub fn send_signal(pid: u32, signal: KillSignal) -> std::result::Result<SignalDelivery, Errno> {
    let Ok(raw) = i32::try_from(pid) else {
        return Err(Errno::EINVAL);
    };

    match kill(Pid::from_raw(raw), signal.signal()) {
        Ok(()) => Ok(SignalDelivery::Delivered),
        Err(Errno::ESRCH) => Ok(SignalDelivery::AlreadyExited),
        Err(e) => Err(e),
    }
}

/// Copy one output stream of a child into `destination` until EOF.
///
/// After a destination failure the stream keeps being drained so the child
/// never blocks on a full pipe.
async fn pump<R>(mut reader: R, stream: Stream, destination: Destination)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    let mut discarding = false;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = ?stream, error = %e, "Failed to read process output");
                break;
            }
        };

        if discarding {
            continue;
        }

        if let Err(e) = destination.write(stream, &buf[..n]) {
            warn!(stream = ?stream, error = %e, "Failed to write process output, discarding the rest");
            discarding = true;
        }
    }
}
