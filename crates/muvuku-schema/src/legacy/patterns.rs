use regex::Regex;

use crate::diagnostics::{Detail, Diagnostic, DiagnosticCode, Phase};

/// Matchers for the legacy macro DSL. Built once per extraction call and
/// passed down explicitly.
#[derive(Debug)]
pub(crate) struct Patterns {
    pub raw_string: Regex,
    pub braced_group: Regex,
    pub localized_string: Regex,
    pub localized_string_end: Regex,
    pub localized_list: Regex,
    pub localized_list_end: Regex,
    pub schema_block: Regex,
    pub block_header: Regex,
    pub item_label: Regex,
    pub item_choices: Regex,
    pub item_args: Regex,
    pub item_validate: Regex,
    pub item_flags: Regex,
}

fn build(pattern: &str) -> Result<Regex, Diagnostic> {
    Regex::new(pattern).map_err(|e| {
        Diagnostic::error(
            DiagnosticCode::MVK0901InternalPattern,
            Phase::Extract,
            Detail::None,
        )
        .with_message(format!("internal extractor pattern failed to build: {e}"))
    })
}

impl Patterns {
    pub fn compile() -> Result<Self, Diagnostic> {
        Ok(Patterns {
            raw_string: build(r#"(?:(?:u8|PROGMEM)\s+)+(\w+)(?:\[\])?\s*=\s*"([^"]*)"\s*;"#)?,
            braced_group: build(
                r"(?:(?:u8\s*\*|lc_char|PROGMEM)\s+)+(\w+)(?:\[\])?\s*=\s*\{([^}]*)\}\s*;",
            )?,
            localized_string: build(r#"LC_([A-Z]{2})\s*\(\s*"([^"]*)"\s*\)"#)?,
            localized_string_end: build(r"(?:^|\s+)LC_END(?:\s+|$)")?,
            localized_list: build(r"LC_([A-Z]{2})_LIST\s*\((?:\([^)]*\))?\s*(\w+)\s*\)")?,
            localized_list_end: build(r"(?:^|\s+)LC_END_LIST(?:\s+|$)")?,
            schema_block: build(r"(?s)SCHEMA_BEGIN(.+?)SCHEMA_END\(\s*\)")?,
            block_header: build(r"^\s*\(([^)]*)\)\s*;")?,
            item_label: build(r"^\s*\(\s*locale\(\s*(\w+)\s*\)|(\w+)")?,
            item_choices: build(r"(?s)SCHEMA_ITEM_SELECT\(.+?locale_list\(\s*(\w+)\s*\)")?,
            item_args: build(r",\s*(\w+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)")?,
            item_validate: build(r"SCHEMA_ITEM_VALIDATE\((\w+)\)")?,
            item_flags: build(r"SCHEMA_ITEM_FLAGS\((\w+)\)")?,
        })
    }
}
