mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "flowd",
    version,
    about = "Connect a flow-based component's stdio to the network"
)]
struct Cli {
    /// Format of announcements printed on stdout.
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    format: OutputFormat,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "FLOWD_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    /// Only log warnings and errors.
    #[arg(long, short = 'q', conflicts_with = "debug", global = true)]
    quiet: bool,

    /// Log frame-level detail.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn effective_log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else if self.debug {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.effective_log_level());

    match cmd::run(cli.command, cli.format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
