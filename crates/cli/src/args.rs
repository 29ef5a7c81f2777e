use std::path::PathBuf;

use chainrun_core::KillSignal;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chainrun")]
#[command(about = "Run command lines concurrently, one command per input line", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Read command lines from FILE instead of standard input
    pub file: Option<PathBuf>,

    /// Maximum number of groups running at once (0 = unlimited)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Number of consecutive lines chained into one group (run with AND semantics)
    #[arg(short, long)]
    pub chunk_size: Option<usize>,

    /// Buffer each group's output and print it when the group completes
    #[arg(short, long)]
    pub deinterlace: bool,

    /// Print buffered output in input order (implies --deinterlace)
    #[arg(short, long)]
    pub ordered: bool,

    /// Terminate all groups on the first failure and exit with its code
    #[arg(short = 'a', long)]
    pub halt_all: bool,

    /// Exit with the code of group N as soon as it completes, terminating the others
    #[arg(short, long, value_name = "N")]
    pub master: Option<usize>,

    /// Signal used to terminate processes (name or number)
    #[arg(short, long, value_parser = KillSignal::parse)]
    pub kill_signal: Option<KillSignal>,

    /// Run every line through this shell command, e.g. "sh -c"
    #[arg(long, value_name = "WORDS")]
    pub shell: Option<String>,

    /// Command lines are separated by NUL instead of newline
    #[arg(short = 'z', long)]
    pub null: bool,

    /// Configuration file (defaults to .chainrun.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "chainrun", "-j", "4", "-c", "2", "-o", "-a", "-m", "1", "-k", "TERM", "cmds.txt",
        ])
        .unwrap();

        assert_eq!(cli.jobs, Some(4));
        assert_eq!(cli.chunk_size, Some(2));
        assert!(cli.ordered);
        assert!(cli.halt_all);
        assert!(!cli.deinterlace);
        assert_eq!(cli.master, Some(1));
        assert_eq!(cli.kill_signal.unwrap().name(), "TERM");
        assert_eq!(cli.file, Some(PathBuf::from("cmds.txt")));
    }

    #[test]
    fn test_rejects_unknown_signal() {
        assert!(Cli::try_parse_from(["chainrun", "--kill-signal", "NOPE"]).is_err());
    }
}
