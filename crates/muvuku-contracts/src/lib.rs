//! Shared, version-pinned protocol identifiers and limits.
//!
//! These constants are the single source of truth for values that appear in
//! compiled output or that the device firmware depends on.

pub const MUVUKU_IR_SCHEMA_VERSION: &str = "muvuku.ir@0.1.0";

/// Cost of the fixed `1!PSMS!` message header, in characters.
pub const HEADER_LENGTH: u32 = 7;

/// Maximum size of a single GSM text message.
pub const MAX_MESSAGE_LENGTH: u32 = 160;

/// Language assigned to text that carries no language information.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Form code reserved for the on-device settings schema.
pub const RESERVED_FORM_CODE: &str = "MUVU";

/// Longest string (in UTF-16 units) that fits in an SLV literal.
pub const SLV_MAX_CHARS: usize = 0xff;

pub const FORMS_OUTPUT_DIR: &str = "forms";
pub const MAIN_OUTPUT_PATH: &str = "main/main.json";
pub const DEFAULT_OUTPUT_ROOT: &str = "output";

/// Process exit status for any fatal compilation error.
pub const FATAL_EXIT_CODE: u8 = 127;
