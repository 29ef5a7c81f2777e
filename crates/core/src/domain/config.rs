use serde::{Deserialize, Serialize};

use super::signal::KillSignal;

/// Scheduling, output and failure policy for a command pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of groups running at once (0 = unlimited)
    pub jobs: usize,
    /// Buffer each group's output and replay it when the group completes
    pub deinterlace: bool,
    /// Replay buffered output in submission order (implies `deinterlace`)
    pub ordered: bool,
    /// Terminate the other groups on the first non-zero group result
    pub halt_on_failure: bool,
    /// Group whose completion dictates the final result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_index: Option<usize>,
    /// Signal sent to surviving processes on termination
    pub kill_signal: KillSignal,
    /// Words prepended to every raw line; empty means direct execution
    pub shell_prefix: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            deinterlace: false,
            ordered: false,
            halt_on_failure: false,
            master_index: None,
            kill_signal: KillSignal::default(),
            shell_prefix: Vec::new(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_deinterlace(mut self, deinterlace: bool) -> Self {
        self.deinterlace = deinterlace;
        self
    }

    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn with_master_index(mut self, index: Option<usize>) -> Self {
        self.master_index = index;
        self
    }

    pub fn with_kill_signal(mut self, signal: KillSignal) -> Self {
        self.kill_signal = signal;
        self
    }

    pub fn with_shell_prefix(mut self, prefix: Vec<String>) -> Self {
        self.shell_prefix = prefix;
        self
    }

    /// Whether output is buffered per group rather than written live.
    pub fn deinterlaced(&self) -> bool {
        self.deinterlace || self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn test_config_default() {
        let config = PoolConfig::default();

        assert_eq!(config.jobs, 0);
        assert!(!config.deinterlaced());
        assert!(!config.halt_on_failure);
        assert!(config.master_index.is_none());
        assert_eq!(config.kill_signal.signal(), Signal::SIGKILL);
        assert!(config.shell_prefix.is_empty());
    }

    #[test]
    fn test_ordered_implies_deinterlace() {
        let config = PoolConfig::new().with_ordered(true);
        assert!(!config.deinterlace);
        assert!(config.deinterlaced());
    }

    #[test]
    fn test_config_partial_json() {
        let config: PoolConfig =
            serde_json::from_str(r#"{"jobs": 4, "kill_signal": "TERM", "master_index": 2}"#)
                .unwrap();

        assert_eq!(config.jobs, 4);
        assert_eq!(config.kill_signal.signal(), Signal::SIGTERM);
        assert_eq!(config.master_index, Some(2));
        assert!(!config.ordered);
    }

    #[test]
    fn test_config_serialization_skips_master() {
        let json = serde_json::to_string(&PoolConfig::default()).unwrap();
        assert!(!json.contains("master_index"));
        assert!(json.contains("\"kill_signal\":\"KILL\""));
    }
}
