use std::time::Duration;

use clap::{ArgAction, Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod copy;
pub mod launch;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a component with its ports bound to network endpoints.
    Launch(LaunchArgs),
    /// Reference component: re-emit every frame from stdin on each output port.
    Copy(CopyArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Launch(args) => launch::run(args, format),
        Command::Copy(args) => copy::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Input endpoint, `scheme://addr#port`. Repeatable.
    #[arg(long = "in", value_name = "LOCATOR")]
    pub inputs: Vec<String>,
    /// Output endpoint, `scheme://addr#local>remote`. Repeatable.
    #[arg(long = "out", value_name = "LOCATOR")]
    pub outputs: Vec<String>,
    /// Initial information packet, `PORT:PAYLOAD`. Repeatable, sent in order.
    #[arg(long = "iip", value_name = "PORT:PAYLOAD")]
    pub iips: Vec<String>,
    /// Decode frames on input connections.
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub in_framing: bool,
    /// Decode frames on the component's stdout.
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub out_framing: bool,
    /// Dial attempts per output before giving up.
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub dial_attempts: u32,
    /// Pause between dial attempts (e.g. 1s, 250ms).
    #[arg(long, value_name = "DUR", default_value = "1s", value_parser = parse_duration)]
    pub dial_delay: Duration,
    /// Failed attempts logged quietly before warnings start.
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub dial_warn_after: u32,
    /// Bound on a single dial attempt.
    #[arg(long, value_name = "DUR", default_value = "10s", value_parser = parse_duration)]
    pub dial_timeout: Duration,
    /// Fail when endpoints are not all connected in time. Default: wait forever.
    #[arg(long, value_name = "DUR", value_parser = parse_duration)]
    pub ready_timeout: Option<Duration>,
    /// Time outputs get to drain after the component exits.
    #[arg(long, value_name = "DUR", default_value = "2s", value_parser = parse_duration)]
    pub drain_grace: Duration,
    /// Component command line, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Output ports. When absent, read them from a `CONF` initial packet.
    #[arg(value_name = "PORT")]
    pub ports: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
