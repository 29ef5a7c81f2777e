use chainrun_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("line {line}: invalid command line: {source}")]
    CommandLine {
        line: usize,
        #[source]
        source: CoreError,
    },

    #[error("{lines} command lines cannot be split into chunks of {chunk_size}")]
    InvalidChunkSize { lines: usize, chunk_size: usize },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("cannot read exit error status: {0}")]
    UnreadableExitStatus(String),

    #[error("failed to replay output: {0}")]
    Output(#[source] std::io::Error),

    #[error("failed to snapshot working directory: {0}")]
    Environment(#[source] std::io::Error),

    #[error("master index {index} out of range for {groups} groups")]
    InvalidMasterIndex { index: usize, groups: usize },

    #[error("pool already started")]
    AlreadyStarted,

    #[error("pool not started")]
    NotStarted,

    #[error("completion events channel closed before all groups reported")]
    EventsClosed,
}

impl PoolError {
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn command_line(line: usize, source: CoreError) -> Self {
        Self::CommandLine { line, source }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
