use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use orchestrator::CommandPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod args;
mod config;
mod input;

use args::Cli;
use config::ChainrunConfig;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let code = run(cli).await?;

    // the OS only keeps the low 8 bits of the aggregate anyway
    Ok(ExitCode::from(code as u8))
}

async fn run(cli: Cli) -> Result<u32> {
    let config = ChainrunConfig::load(cli.config.as_deref())
        .await?
        .merge_cli(&cli)?;

    let content = input::read_input(cli.file.as_deref()).await?;
    let lines = input::split_lines(&content, config.input.null_separated);
    if lines.is_empty() {
        anyhow::bail!("please specify at least 1 command");
    }

    tracing::debug!(
        lines = lines.len(),
        chunk_size = config.input.chunk_size,
        "Command lines read"
    );

    let mut pool = CommandPool::new(config.pool);
    pool.add(config.input.chunk_size, &lines)
        .context("Failed to prepare command lines")?;
    pool.start(pool.config().jobs)?;

    let code = pool.join().await?;
    Ok(code)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chainrun=debug,orchestrator=debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
