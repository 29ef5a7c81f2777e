pub mod command;
pub mod config;
pub mod signal;

pub use command::{CommandSpec, Environment};
pub use config::PoolConfig;
pub use signal::{KillSignal, SIGNALS};
