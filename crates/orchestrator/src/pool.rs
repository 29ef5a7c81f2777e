//! Bounded-concurrency scheduler for sequence groups.
//!
//! A pool partitions command lines into [`SequenceGroup`]s, runs them under a
//! permit budget, drains one completion event per group and applies the
//! halt/master policy, terminating the survivors once a result is decided.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chainrun_core::{CommandSpec, Environment, PoolConfig};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{PoolError, Result};
use crate::group::SequenceGroup;
use crate::output::OutputSinks;
use crate::process::Destination;
use crate::recorder::OutputRecorder;
use crate::verdict::{Decision, Verdict};

/// Emitted once per group when its run ends.
#[derive(Debug)]
struct GroupCompletion {
    index: usize,
    result: Result<i32>,
}

/// Tracks how many groups are in their started phase at once.
#[derive(Debug, Default)]
struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct CommandPool {
    config: PoolConfig,
    sinks: OutputSinks,
    groups: Vec<Arc<SequenceGroup>>,
    /// Per-group recorders, taken once replayed. Empty unless deinterlaced.
    outputs: Vec<Option<Arc<OutputRecorder>>>,
    events: Option<mpsc::Receiver<GroupCompletion>>,
    tasks: JoinSet<()>,
    gauge: Arc<ConcurrencyGauge>,
    started: bool,
}

impl CommandPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            sinks: OutputSinks::default(),
            groups: Vec::new(),
            outputs: Vec::new(),
            events: None,
            tasks: JoinSet::new(),
            gauge: Arc::new(ConcurrencyGauge::default()),
            started: false,
        }
    }

    /// Replace the destination sinks. Must be called before [`add`](Self::add).
    pub fn with_sinks(mut self, sinks: OutputSinks) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Arc<SequenceGroup>] {
        &self.groups
    }

    /// Highest number of groups observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }

    /// Partition `lines` into groups of `chunk_size` commands each.
    ///
    /// The working directory and environment are snapshotted once and shared
    /// by every command. Nothing is added if any line fails to parse.
    pub fn add<S: AsRef<str>>(&mut self, chunk_size: usize, lines: &[S]) -> Result<()> {
        if self.started {
            return Err(PoolError::AlreadyStarted);
        }
        if chunk_size == 0 || lines.len() % chunk_size != 0 {
            return Err(PoolError::InvalidChunkSize {
                lines: lines.len(),
                chunk_size,
            });
        }

        let env = Arc::new(Environment::capture().map_err(PoolError::Environment)?);

        let specs = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                CommandSpec::prepare(line.as_ref(), &self.config.shell_prefix)
                    .map_err(|e| PoolError::command_line(i + 1, e))
            })
            .collect::<Result<Vec<_>>>()?;

        for chunk in specs.chunks(chunk_size) {
            let index = self.groups.len();
            let (destination, recorder) = if self.config.deinterlaced() {
                let recorder = Arc::new(OutputRecorder::new());
                (Destination::Recorded(recorder.clone()), Some(recorder))
            } else {
                (Destination::Live(self.sinks.clone()), None)
            };

            self.groups.push(Arc::new(SequenceGroup::new(
                index,
                chunk.to_vec(),
                env.clone(),
                destination,
                self.config.kill_signal,
            )));
            self.outputs.push(recorder);
        }

        debug!(
            lines = lines.len(),
            chunk_size,
            groups = self.groups.len(),
            "Command lines added"
        );

        Ok(())
    }

    /// Launch one task per group and return without waiting.
    ///
    /// `jobs` bounds how many groups run at once; 0 runs them all. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self, jobs: usize) -> Result<()> {
        if self.started {
            return Err(PoolError::AlreadyStarted);
        }
        if let Some(index) = self.config.master_index {
            if index >= self.groups.len() {
                return Err(PoolError::InvalidMasterIndex {
                    index,
                    groups: self.groups.len(),
                });
            }
        }
        self.started = true;

        let (tx, rx) = mpsc::channel(self.groups.len().max(1));
        let permits = (jobs > 0).then(|| Arc::new(Semaphore::new(jobs)));

        for group in &self.groups {
            let group = group.clone();
            let tx = tx.clone();
            let permits = permits.clone();
            let gauge = self.gauge.clone();

            self.tasks.spawn(async move {
                // the semaphore is never closed, so acquiring cannot fail
                let permit = match permits {
                    Some(permits) => permits.acquire_owned().await.ok(),
                    None => None,
                };

                debug!(group = group.index(), "Group started");
                gauge.enter();
                let result = group.run().await;
                gauge.exit();
                drop(permit);

                let _ = tx
                    .send(GroupCompletion {
                        index: group.index(),
                        result,
                    })
                    .await;
            });
        }

        self.events = Some(rx);
        info!(groups = self.groups.len(), jobs, "Pool started");

        Ok(())
    }

    /// Wait for every group and compute the aggregate exit code.
    ///
    /// Without a halt or master decision this is the unsigned sum of all
    /// group exit codes. A spawn or wait failure in any group terminates the
    /// others and is returned instead.
    pub async fn join(&mut self) -> Result<u32> {
        let mut events = self.events.take().ok_or(PoolError::NotStarted)?;
        let total = self.groups.len();
        let mut finished = vec![false; total];
        let mut flush_cursor = 0;
        let mut verdict = Verdict::new(self.config.halt_on_failure, self.config.master_index);

        for _ in 0..total {
            let event = events.recv().await.ok_or(PoolError::EventsClosed)?;
            let index = event.index;
            finished[index] = true;

            if let Err(e) = self.flush_output(index, &finished, &mut flush_cursor) {
                error!(group = index, error = %e, "Output replay failed");
                self.terminate(index, &finished).await;
                return Err(e);
            }

            let code = match event.result {
                Ok(code) => code,
                Err(e) => {
                    error!(group = index, error = %e, "Group failed, terminating the others");
                    self.terminate(index, &finished).await;
                    self.flush_completed(&finished)?;
                    return Err(e);
                }
            };

            debug!(group = index, code, "Group completed");

            if let Decision::Latched(reason) = verdict.observe(index, code) {
                info!(group = index, code, reason = ?reason, "Result decided, terminating the others");
                self.terminate(index, &finished).await;
            }
        }

        while self.tasks.join_next().await.is_some() {}
        self.sinks.flush().map_err(PoolError::Output)?;

        info!(
            exit_code = verdict.exit_code(),
            decided = verdict.is_decided(),
            peak_concurrency = self.gauge.peak(),
            "Pool finished"
        );

        Ok(verdict.exit_code())
    }

    /// Replay buffered output for the group that just completed, respecting
    /// submission order when configured.
    fn flush_output(&mut self, index: usize, finished: &[bool], cursor: &mut usize) -> Result<()> {
        if !self.config.deinterlaced() {
            return Ok(());
        }

        if !self.config.ordered {
            return self.replay(index);
        }

        while *cursor < finished.len() && finished[*cursor] {
            self.replay(*cursor)?;
            *cursor += 1;
        }

        Ok(())
    }

    /// Replay every completed group still holding output, in index order.
    fn flush_completed(&mut self, finished: &[bool]) -> Result<()> {
        for (index, done) in finished.iter().enumerate() {
            if *done {
                self.replay(index)?;
            }
        }
        Ok(())
    }

    fn replay(&mut self, index: usize) -> Result<()> {
        if let Some(recorder) = self.outputs.get_mut(index).and_then(Option::take) {
            debug!(group = index, "Replaying group output");
            recorder.replay(&self.sinks).map_err(PoolError::Output)?;
        }
        Ok(())
    }

    /// Signal every unfinished group other than `trigger`, one task per
    /// victim, and wait until all signals are sent. Does not wait for the
    /// victims to exit.
    async fn terminate(&self, trigger: usize, finished: &[bool]) {
        let mut kills = JoinSet::new();

        for group in &self.groups {
            let index = group.index();
            if index == trigger || finished[index] {
                continue;
            }

            let group = group.clone();
            kills.spawn(async move { group.terminate() });
        }

        let victims = kills.len();
        let mut signalled = 0;
        while let Some(result) = kills.join_next().await {
            match result {
                Ok(count) => signalled += count,
                Err(e) => error!(error = %e, "Termination task failed"),
            }
        }

        debug!(trigger, victims, signalled, "Termination fan-out complete");
    }
}

impl std::fmt::Debug for CommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("config", &self.config)
            .field("groups", &self.groups.len())
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_uneven_chunks() {
        let mut pool = CommandPool::new(PoolConfig::default());

        let err = pool.add(2, &["true", "true", "true"]).unwrap_err();
        assert!(matches!(
            err,
            PoolError::InvalidChunkSize {
                lines: 3,
                chunk_size: 2
            }
        ));
        assert!(pool.add(0, &["true"]).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_add_partitions_into_groups() {
        let mut pool = CommandPool::new(PoolConfig::default());

        pool.add(2, &["echo a", "echo b", "echo c", "echo d"]).unwrap();
        pool.add(1, &["echo e"]).unwrap();

        assert_eq!(pool.len(), 3);
        let indices: Vec<_> = pool.groups().iter().map(|g| g.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(pool.groups()[1].commands()[0].args, vec!["c"]);
        assert_eq!(pool.groups()[1].commands()[1].args, vec!["d"]);
    }

    #[test]
    fn test_add_reports_bad_line() {
        let mut pool = CommandPool::new(PoolConfig::default());

        let err = pool.add(1, &["echo ok", "echo 'broken"]).unwrap_err();
        assert!(matches!(err, PoolError::CommandLine { line: 2, .. }));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_recorders_only_when_deinterlaced() {
        let mut live = CommandPool::new(PoolConfig::default());
        live.add(1, &["true", "true"]).unwrap();
        assert!(live.outputs.iter().all(Option::is_none));

        let mut ordered = CommandPool::new(PoolConfig::default().with_ordered(true));
        ordered.add(1, &["true", "true"]).unwrap();
        assert!(ordered.outputs.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn test_start_rejects_master_out_of_range() {
        let mut pool = CommandPool::new(PoolConfig::default().with_master_index(Some(2)));
        pool.add(1, &["true", "true"]).unwrap();

        assert!(matches!(
            pool.start(0),
            Err(PoolError::InvalidMasterIndex {
                index: 2,
                groups: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_join_before_start() {
        let mut pool = CommandPool::new(PoolConfig::default());
        pool.add(1, &["true"]).unwrap();

        assert!(matches!(pool.join().await, Err(PoolError::NotStarted)));
    }

    #[tokio::test]
    async fn test_add_after_start() {
        let mut pool = CommandPool::new(PoolConfig::default());
        pool.add(1, &["true"]).unwrap();
        pool.start(0).unwrap();

        assert!(matches!(
            pool.add(1, &["true"]),
            Err(PoolError::AlreadyStarted)
        ));
        assert!(matches!(pool.start(0), Err(PoolError::AlreadyStarted)));
        assert_eq!(pool.join().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let mut pool = CommandPool::new(PoolConfig::default());
        pool.start(0).unwrap();

        assert_eq!(pool.join().await.unwrap(), 0);
    }
}
