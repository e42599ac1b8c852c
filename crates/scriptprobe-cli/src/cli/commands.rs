use super::CliError;
use super::helpers::{indent_block, write_report_json};
use scriptprobe_core::{OutcomeVerifier, ProbeError, ProcessHarness, ProgramConfig, render_human_summary};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(clap::Args)]
pub(super) struct ExecArgs {
    /// Interpreter to launch the program with (for example `bash`)
    #[arg(long)]
    interpreter: Option<String>,
    /// Working directory for the child process
    #[arg(long, default_value = ".")]
    cwd: PathBuf,
    /// Kill the child after this many milliseconds
    #[arg(long = "timeout-ms", default_value_t = 30_000)]
    timeout_ms: u64,
    /// Write the execution outcome as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
    /// Program or script to run
    program: PathBuf,
    /// Arguments passed through to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

#[derive(clap::Args)]
pub(super) struct VerifyArgs {
    /// Program config JSON describing the result file and its schema
    #[arg(long)]
    config: PathBuf,
    /// Expected number of data rows in the result file
    #[arg(long)]
    rows: Option<usize>,
    /// Write the verification report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

pub(super) fn run_exec_command(args: ExecArgs) -> Result<i32, CliError> {
    if args.timeout_ms == 0 {
        return Err(CliError::Usage(
            "--timeout-ms must be greater than zero".to_string(),
        ));
    }

    let (program, child_args) = match args.interpreter.as_deref() {
        Some(interpreter) => {
            let child_args = std::iter::once(args.program.into_os_string())
                .chain(args.args)
                .collect::<Vec<_>>();
            (OsString::from(interpreter), child_args)
        }
        None => (args.program.into_os_string(), args.args),
    };

    let outcome = ProcessHarness::new()
        .run(
            &program,
            &child_args,
            &args.cwd,
            Duration::from_millis(args.timeout_ms),
        )
        .map_err(ProbeError::from)?;

    println!("Execution: {}", outcome.summary_line());
    if !outcome.stdout().is_empty() {
        println!("stdout:\n{}", indent_block(outcome.stdout()));
    }
    if !outcome.stderr().is_empty() {
        println!("stderr:\n{}", indent_block(outcome.stderr()));
    }
    if !outcome.output_complete() {
        println!("note: output capture was cut short by processes still holding the pipes");
    }

    if let Some(report_path) = &args.report {
        write_report_json(report_path, &outcome)?;
        println!("JSON report: {}", report_path.display());
    }

    if outcome.succeeded() { Ok(0) } else { Ok(1) }
}

pub(super) fn run_verify_command(args: VerifyArgs) -> Result<i32, CliError> {
    let config = ProgramConfig::from_path(&args.config).map_err(ProbeError::from)?;
    let verifier = OutcomeVerifier::for_config(&config).map_err(ProbeError::from)?;

    let report = verifier.structural_report(args.rows);
    println!("{}", render_human_summary(&report));

    if let Some(report_path) = &args.report {
        write_report_json(report_path, &report)?;
        println!("JSON report: {}", report_path.display());
    }

    if report.passed { Ok(0) } else { Ok(1) }
}
