//! Reverse extraction from the legacy C macro DSL.
//!
//! Two passes over the source text: the first collects every string and list
//! declaration into a [`SymbolTable`], the second walks each
//! `SCHEMA_BEGIN(...) ... SCHEMA_END()` block and rebuilds its fields in the
//! authoring schema's shape. Malformed blocks and items are skipped, never
//! reported.

mod forms;
mod patterns;
mod symtab;

use std::path::Path;

pub use forms::{legacy_type, LegacyField, LegacyForm, LegacyLabels, LegacyMeta, LegacyText};
pub use symtab::{decode_escapes, Symbol, SymbolTable};

use crate::diagnostics::Diagnostic;
use crate::options::ExtractOptions;
use patterns::Patterns;

pub fn symbol_table(src: &str) -> Result<SymbolTable, Diagnostic> {
    let patterns = Patterns::compile()?;
    Ok(symtab::build_symbol_table(src, &patterns))
}

pub fn extract_source(src: &str, opts: &ExtractOptions) -> Result<Vec<LegacyForm>, Diagnostic> {
    let patterns = Patterns::compile()?;
    let table = symtab::build_symbol_table(src, &patterns);
    Ok(forms::build_forms(&table, src, &opts.locale, &patterns))
}

pub fn extract_file(path: &Path, opts: &ExtractOptions) -> Result<Vec<LegacyForm>, Diagnostic> {
    let src = crate::io::read_file(path)?;
    extract_source(&src, opts)
}
