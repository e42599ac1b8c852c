mod commands;
mod helpers;

use clap::Parser;
use scriptprobe_core::domain::ProbeError;

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let probe_error = error.as_probe_error();
            eprintln!("{}", probe_error.diagnostic_line());
            probe_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("scriptprobe".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => match cli.command {
            CliCommand::Exec(args) => commands::run_exec_command(args),
            CliCommand::Verify(args) => commands::run_verify_command(args),
        },
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "scriptprobe",
    version,
    about = "Black-box acceptance checks for CSV/JSON command-line programs"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run a program once under the process harness and summarize the outcome
    Exec(commands::ExecArgs),
    /// Run structural checks against a program's result file
    Verify(commands::VerifyArgs),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Probe(ProbeError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_probe_error(&self) -> ProbeError {
        match self {
            Self::Usage(message) => ProbeError::input_validation("INPUT.CLI_USAGE", message.trim()),
            Self::Probe(error) => error.clone(),
            Self::Internal(error) => ProbeError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<ProbeError> for CliError {
    fn from(error: ProbeError) -> Self {
        Self::Probe(error)
    }
}
