// tally — deterministic multi-source reconciliation from the command line

mod exit_codes;
mod recon;
mod verify;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Reconcile transaction records across sources and emit hashed evidence")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log engine progress to stderr (overridden by TALLY_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation from an engine input document and write evidence
    #[command(after_help = "\
Relative paths in the engine input resolve against the document's directory.

Exit codes:
  0   Evidence written (variances, if any, are in the output)
  3   Variances found and --fail-on-variance set
  4   Invalid engine input, ruleset or mapping config
  5   Unreadable input file or unwritable output directory

Examples:
  tally run engine_input.json
  tally run engine_input.json --json | jq .variance_summary
  tally run engine_input.json --fail-on-variance")]
    Run {
        /// Path to the engine input JSON document
        input: PathBuf,

        /// Print engine_output.json to stdout instead of only the summary
        #[arg(long)]
        json: bool,

        /// Exit 3 when any variance is found
        #[arg(long)]
        fail_on_variance: bool,
    },

    /// Check an engine input document, its ruleset and mapping without reading data
    #[command(after_help = "\
Examples:
  tally validate engine_input.json")]
    Validate {
        /// Path to the engine input JSON document
        input: PathBuf,
    },

    /// Re-hash an evidence bundle and compare against its manifest
    #[command(after_help = "\
Exit codes:
  0   Every file matches the manifest
  5   Manifest unreadable
  6   Missing, resized or altered files

Examples:
  tally verify out/
  tally verify out/ --json")]
    Verify {
        /// Output directory of a previous run
        output_dir: PathBuf,

        /// Print the verification report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<tally_recon::ReconError> for CliError {
    fn from(err: tally_recon::ReconError) -> Self {
        Self { code: recon_exit_code(&err), message: err.to_string(), hint: None }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  tally-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
        "\nevidence schema: 1.0.0",
    )
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here too
            let _ = err.print();
            let code = if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            return ExitCode::from(code);
        }
    };
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { input, json, fail_on_variance } => {
            recon::cmd_run(input, json, fail_on_variance)
        }
        Commands::Validate { input } => recon::cmd_validate(input),
        Commands::Verify { output_dir, json } => verify::cmd_verify(output_dir, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
