use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{CoreError, Result};
use crate::tokenizer::split_words;

/// A fully prepared command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a spec from a raw command line.
    ///
    /// With a non-empty `shell_prefix` the line is passed verbatim as the last
    /// argument (`sh -c <line>`); otherwise it is split into words.
    pub fn prepare(line: &str, shell_prefix: &[String]) -> Result<Self> {
        let words = if shell_prefix.is_empty() {
            split_words(line)?
        } else {
            let mut words = shell_prefix.to_vec();
            words.push(line.to_string());
            words
        };

        let mut words = words.into_iter();
        let program = words.next().ok_or(CoreError::EmptyCommandLine)?;
        if program.is_empty() {
            return Err(CoreError::EmptyProgram);
        }

        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// Human-readable rendering for logs.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Working directory and environment shared by every command of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub cwd: PathBuf,
    pub vars: Vec<(OsString, OsString)>,
}

impl Environment {
    pub fn new(cwd: PathBuf, vars: Vec<(OsString, OsString)>) -> Self {
        Self { cwd, vars }
    }

    /// Snapshot the current process's working directory and environment.
    pub fn capture() -> std::io::Result<Self> {
        Ok(Self {
            cwd: std::env::current_dir()?,
            vars: std::env::vars_os().collect(),
        })
    }
}
