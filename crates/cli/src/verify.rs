//! `tally verify` — re-hash an evidence bundle against its manifest.

use std::path::PathBuf;

use crate::exit_codes::{EXIT_ERROR, EXIT_VERIFY_FAILED};
use crate::CliError;

pub fn cmd_verify(output_dir: PathBuf, json_output: bool) -> Result<(), CliError> {
    let report = tally_recon::verify_manifest(&output_dir).map_err(|e| {
        CliError::from(e).with_hint("pass the output_dir of a completed `tally run`")
    })?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&report).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json_str}");
    } else {
        for problem in &report.problems {
            eprintln!("  {problem}");
        }
    }

    if !report.ok {
        return Err(CliError {
            code: EXIT_VERIFY_FAILED,
            message: format!(
                "evidence verification failed: {} problem(s) in {} file(s)",
                report.problems.len(),
                report.files_checked,
            ),
            hint: None,
        });
    }

    eprintln!("verified: {} file(s) match the manifest", report.files_checked);
    Ok(())
}
