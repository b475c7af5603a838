//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args)                                |
//! | 3    | Variances found (only with `--fail-on-variance`)          |
//! | 4    | Invalid engine input, ruleset or mapping config           |
//! | 5    | Runtime failure: unreadable input, unwritable evidence    |
//! | 6    | Evidence verification failed (tampered or missing files)  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use tally_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// Returned by `main` when clap rejects the command line.
pub const EXIT_USAGE: u8 = 2;

/// Run completed and wrote evidence, but variances were found and
/// `--fail-on-variance` was set.
pub const EXIT_RECON_VARIANCES: u8 = 3;

/// Engine input, ruleset or mapping config is unreadable as a document,
/// is missing a required field, or names an unsupported option.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 4;

/// An input file could not be read or parsed, or evidence could not be written.
pub const EXIT_RECON_RUNTIME: u8 = 5;

/// `tally verify` found missing, resized or altered evidence files.
pub const EXIT_VERIFY_FAILED: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnsupportedRounding(_)
        | ReconError::UnsupportedFormat(_)
        | ReconError::UnsupportedMode(_)
        | ReconError::InvalidTimezone(_)
        | ReconError::NoInputFiles
        | ReconError::NoSources => EXIT_RECON_INVALID_CONFIG,
        ReconError::InputParse { .. } | ReconError::Io { .. } | ReconError::Serialize(_) => {
            EXIT_RECON_RUNTIME
        }
    }
}
