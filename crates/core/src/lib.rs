//! Domain types shared by the chainrun engine and CLI
//!
//! Command specs, the command-line tokenizer, the kill-signal table and
//! pool configuration. Nothing here spawns processes.

pub mod domain;
pub mod error;
pub mod tokenizer;

pub use domain::*;
pub use error::{CoreError, Result};
pub use tokenizer::split_words;
