//! A chain of commands run strictly in order with AND semantics.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chainrun_core::{CommandSpec, Environment, KillSignal};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::error::Result;
use crate::process::{send_signal, Destination, ProcessHandle, SignalDelivery};

/// Lifecycle of one step of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    Started { pid: u32 },
    Finished,
}

#[derive(Debug)]
struct GroupState {
    steps: Vec<StepState>,
    cancelled: bool,
}

pub struct SequenceGroup {
    index: usize,
    commands: Vec<CommandSpec>,
    env: Arc<Environment>,
    destination: Destination,
    kill_signal: KillSignal,
    state: Mutex<GroupState>,
    /// Flipped by `terminate` so a step still draining output gives up
    cancel: watch::Sender<bool>,
}

impl SequenceGroup {
    pub fn new(
        index: usize,
        commands: Vec<CommandSpec>,
        env: Arc<Environment>,
        destination: Destination,
        kill_signal: KillSignal,
    ) -> Self {
        let steps = vec![StepState::NotStarted; commands.len()];
        Self {
            index,
            commands,
            env,
            destination,
            kill_signal,
            state: Mutex::new(GroupState {
                steps,
                cancelled: false,
            }),
            cancel: watch::channel(false).0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn step_states(&self) -> Vec<StepState> {
        self.lock_state().steps.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_state().cancelled
    }

    fn lock_state(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every step in order, stopping at the first non-zero exit.
    ///
    /// Returns `Ok(0)` when all steps succeed and `Ok(code)` for the first
    /// failing step. Spawn and wait failures are errors. A group terminated
    /// before its next step starts reports `128 + kill signal`.
    pub async fn run(&self) -> Result<i32> {
        for (step, spec) in self.commands.iter().enumerate() {
            let mut process = ProcessHandle::new(spec.clone());

            {
                let mut state = self.lock_state();
                if state.cancelled {
                    debug!(group = self.index, step, "Group terminated before step started");
                    return Ok(128 + self.kill_signal.number());
                }

                match process.start(&self.env, &self.destination) {
                    Ok(pid) => state.steps[step] = StepState::Started { pid },
                    Err(e) => {
                        state.steps[step] = StepState::Finished;
                        return Err(e);
                    }
                }
            }

            // the pid is released as soon as the child is reaped
            let outcome = process.reap().await;
            self.lock_state().steps[step] = StepState::Finished;

            let mut cancelled = self.cancel.subscribe();
            if !process.drain_output(&mut cancelled).await {
                debug!(group = self.index, step, "Group terminated, abandoning remaining output");
            }

            match outcome? {
                0 => continue,
                code => {
                    debug!(group = self.index, step, code, "Step failed, stopping chain");
                    return Ok(code);
                }
            }
        }

        Ok(0)
    }

    /// Signal every started, unfinished step and cancel the steps not yet
    /// started. Returns how many processes were signalled.
    ///
    /// Kill failures other than "already exited" are logged and skipped.
    pub fn terminate(&self) -> usize {
        let mut state = self.lock_state();
        state.cancelled = true;
        self.cancel.send_replace(true);

        let mut signalled = 0;
        for step in &state.steps {
            let StepState::Started { pid } = *step else {
                continue;
            };

            match send_signal(pid, self.kill_signal) {
                Ok(SignalDelivery::Delivered) => {
                    debug!(group = self.index, pid, signal = %self.kill_signal, "Process signalled");
                    signalled += 1;
                }
                Ok(SignalDelivery::AlreadyExited) => {
                    debug!(group = self.index, pid, "Process already exited");
                }
                Err(e) => {
                    error!(group = self.index, pid, error = %e, "Could not kill process");
                }
            }
        }

        signalled
    }
}

impl std::fmt::Debug for SequenceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceGroup")
            .field("index", &self.index)
            .field("commands", &self.commands.len())
            .finish()
    }
}
