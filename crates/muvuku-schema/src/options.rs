use muvuku_contracts::{DEFAULT_LANGUAGE, HEADER_LENGTH, MAX_MESSAGE_LENGTH};

/// Settings for one forward compilation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Language assigned to plain (unlocalized) text.
    pub default_language: String,
    /// Per-form length before any field is added.
    pub header_length: u32,
    /// Ceiling on a form's upper length, checked once per run.
    pub max_message_length: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            default_language: DEFAULT_LANGUAGE.to_string(),
            header_length: HEADER_LENGTH,
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Two-letter locale selecting which translation to lift, e.g. `en`.
    pub locale: String,
}

impl ExtractOptions {
    pub fn new(locale: impl Into<String>) -> Self {
        ExtractOptions {
            locale: locale.into(),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions::new(DEFAULT_LANGUAGE)
    }
}
