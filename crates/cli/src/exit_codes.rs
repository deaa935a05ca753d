//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | merge            | combine/filter run failures              |
//! | 130     | Universal        | Interrupted (Ctrl-C)                     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `merge_exit_code` or the relevant command

use listmerge_engine::MergeError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Merge (3-9)
// =============================================================================

/// The input selection contained no CSV or XLSX file.
pub const EXIT_NO_SOURCES: u8 = 3;

/// The reference list for `filter` could not be loaded.
pub const EXIT_REFERENCE: u8 = 4;

/// Append target lacks Name/Email columns and overwrite was not requested.
pub const EXIT_INCOMPATIBLE_HEADERS: u8 = 5;

/// Output file could not be created, opened or written.
pub const EXIT_WRITE: u8 = 6;

/// An input file could not be read (only for single-file commands such as `headers`).
pub const EXIT_READ: u8 = 7;

// =============================================================================
// Interrupt
// =============================================================================

/// Run cancelled by Ctrl-C. Partial output was still written.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Map a run error to its exit code.
pub fn merge_exit_code(err: &MergeError) -> u8 {
    match err {
        MergeError::NoSources => EXIT_NO_SOURCES,
        MergeError::Reference(_) => EXIT_REFERENCE,
        MergeError::IncompatibleHeaders { .. } => EXIT_INCOMPATIBLE_HEADERS,
        MergeError::Write { .. } => EXIT_WRITE,
        MergeError::FileAccess { .. }
        | MergeError::Format { .. }
        | MergeError::Schema { .. }
        | MergeError::UnsupportedFileType { .. }
        | MergeError::Timeout { .. }
        | MergeError::Worker { .. } => EXIT_READ,
        MergeError::RowShape { .. } => EXIT_ERROR,
    }
}

/// Stable machine-readable name for a run error.
pub fn merge_error_kind(err: &MergeError) -> &'static str {
    match err {
        MergeError::FileAccess { .. } => "file_access",
        MergeError::Format { .. } => "format",
        MergeError::Schema { .. } => "schema",
        MergeError::RowShape { .. } => "row_shape",
        MergeError::UnsupportedFileType { .. } => "unsupported_file_type",
        MergeError::IncompatibleHeaders { .. } => "incompatible_headers",
        MergeError::Write { .. } => "write",
        MergeError::Timeout { .. } => "timeout",
        MergeError::Worker { .. } => "worker",
        MergeError::NoSources => "no_sources",
        MergeError::Reference(_) => "reference",
    }
}

/// Structured error output for `--json` runs.
#[derive(Debug, serde::Serialize)]
pub struct ErrorOutput {
    pub error: String,
    pub message: String,
    pub exit_code: u8,
}

impl ErrorOutput {
    pub fn from_merge_error(err: &MergeError) -> Self {
        Self {
            error: merge_error_kind(err).to_string(),
            message: err.to_string(),
            exit_code: merge_exit_code(err),
        }
    }
}
