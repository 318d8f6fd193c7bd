pub mod compile;
pub mod diagnostics;
pub mod encode;
pub mod io;
pub mod ir;
pub mod legacy;
pub mod normalize;
pub mod options;

pub use compile::{check_message_lengths, compile_document, compile_form, compile_forms};
pub use diagnostics::{Detail, Diagnostic, DiagnosticCode, Phase};
pub use encode::{encode, encode_string, Text};
pub use ir::Form;
pub use options::{CompileOptions, ExtractOptions};
