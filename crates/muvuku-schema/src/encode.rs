//! Device string encoding.
//!
//! Text that fits in eight bits is written as a C string body with a handful of
//! characters replaced by the octal escapes the handset charset expects. Anything
//! else is written as an SLV literal: a two byte escape marker, a byte count, a
//! padding byte, big-endian UCS-2 code units, and a two byte terminator.

use std::collections::BTreeMap;

use muvuku_contracts::SLV_MAX_CHARS;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Detail, Diagnostic, DiagnosticCode, Phase};

/// A text value: either plain, or keyed by language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

const GSM_SUBSTITUTIONS: &[(char, &str)] = &[
    ('\u{e9}', "\\5"),
    ('\u{c9}', "\\37"),
    ('\u{e8}', "\\4"),
    ('\u{e7}', "\\11"),
    ('\u{e0}', "\\177"),
    ('\u{e1}', "\\177"),
    ('\u{27}', "\\47"),
    ('\u{f2}', "\\10"),
    ('\u{f3}', "\\10"),
    ('\u{ed}', "\\07"),
];

const SLV_ESCAPE: &str = "\\x84\\x08";
const SLV_PADDING: &str = "\\x80";
const SLV_TERMINATOR: &str = "\\x0\\x0";

pub fn normalize_language_code(code: &str) -> String {
    match code {
        "ne" => "un".to_string(),
        other => other.to_string(),
    }
}

/// True if every UTF-16 code unit of `s` is at most 0xff.
pub fn is_latin1(s: &str) -> bool {
    s.encode_utf16().all(|u| u <= 0xff)
}

pub fn substitute_gsm(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match GSM_SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

pub(crate) fn gsm_substitutions() -> &'static [(char, &'static str)] {
    GSM_SUBSTITUTIONS
}

/// Render `s` as an SLV literal, or `None` if it has more than 255 code units.
pub fn ucs2_to_slv(s: &str) -> Option<String> {
    let units: Vec<u16> = s.encode_utf16().collect();
    if units.len() > SLV_MAX_CHARS {
        return None;
    }

    let mut out = String::with_capacity(16 + units.len() * 10);
    out.push_str(SLV_ESCAPE);
    out.push_str(&format!("\\x{:x}", 2 * (units.len() + 1)));
    out.push_str(SLV_PADDING);
    for u in units {
        out.push_str(&format!("\\x{:x}", (u & 0xff00) >> 8));
        out.push_str(&format!("\\x{:x}", u & 0xff));
    }
    out.push_str(SLV_TERMINATOR);
    Some(out)
}

pub fn encode_string(s: &str) -> Result<String, Diagnostic> {
    if is_latin1(s) {
        return Ok(substitute_gsm(s));
    }
    ucs2_to_slv(s).ok_or_else(|| {
        Diagnostic::error(
            DiagnosticCode::MVK0300StringTooLong,
            Phase::Encode,
            Detail::TextLength {
                chars: s.encode_utf16().count(),
                limit: SLV_MAX_CHARS,
            },
        )
    })
}

pub fn encode_localized(
    map: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, Diagnostic> {
    let mut out = BTreeMap::new();
    for (lang, value) in map {
        out.insert(normalize_language_code(lang), encode_string(value)?);
    }
    Ok(out)
}

/// Encode every leaf of `value`, keeping its shape. Absent values pass through.
pub fn encode(value: Option<&Text>) -> Result<Option<Text>, Diagnostic> {
    match value {
        None => Ok(None),
        Some(Text::Plain(s)) => Ok(Some(Text::Plain(encode_string(s)?))),
        Some(Text::Localized(map)) => Ok(Some(Text::Localized(encode_localized(map)?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_text_is_substituted() {
        assert_eq!(encode_string("café").unwrap(), "caf\\5");
        assert_eq!(encode_string("l'été").unwrap(), "l\\47\\5t\\5");
        assert_eq!(encode_string("Écrire à Açores").unwrap(), "\\37crire \\177 A\\11ores");
        assert_eq!(encode_string("ò ó í").unwrap(), "\\10 \\10 \\07");
    }

    #[test]
    fn latin1_without_table_entry_passes_through() {
        assert_eq!(encode_string("Müller ñ").unwrap(), "Müller ñ");
        assert!(!encode_string("ÿ").unwrap().starts_with(SLV_ESCAPE));
    }

    #[test]
    fn wide_text_becomes_slv() {
        let out = encode_string("नमस").unwrap();
        assert_eq!(
            out,
            "\\x84\\x08\\x8\\x80\\x9\\x28\\x9\\x2e\\x9\\x38\\x0\\x0"
        );
    }

    #[test]
    fn one_wide_char_forces_slv() {
        let out = encode_string("abcĀ").unwrap();
        assert!(out.starts_with("\\x84\\x08\\xa\\x80"));
        assert!(out.ends_with("\\x1\\x0\\x0\\x0"));
    }

    #[test]
    fn slv_rejects_long_strings() {
        let long: String = std::iter::repeat('Ā').take(256).collect();
        let err = encode_string(&long).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::MVK0300StringTooLong);
        assert_eq!(
            err.detail,
            Detail::TextLength {
                chars: 256,
                limit: 255
            }
        );

        let fits: String = std::iter::repeat('Ā').take(255).collect();
        assert!(ucs2_to_slv(&fits).is_some());
    }

    #[test]
    fn encode_keeps_shape() {
        assert_eq!(encode(None).unwrap(), None);

        let plain = Text::Plain("é".to_string());
        assert_eq!(
            encode(Some(&plain)).unwrap(),
            Some(Text::Plain("\\5".to_string()))
        );

        let mut map = BTreeMap::new();
        map.insert("en".to_string(), "Yes".to_string());
        map.insert("fr".to_string(), "Répondu".to_string());
        map.insert("ne".to_string(), "Yes".to_string());
        let Some(Text::Localized(out)) = encode(Some(&Text::Localized(map))).unwrap() else {
            panic!("expected localized output");
        };
        assert_eq!(out["en"], "Yes");
        assert_eq!(out["fr"], "R\\5pondu");
        assert_eq!(out["un"], "Yes");
        assert!(!out.contains_key("ne"));
    }

    #[test]
    fn deprecated_language_code_is_rewritten() {
        assert_eq!(normalize_language_code("ne"), "un");
        assert_eq!(normalize_language_code("fr"), "fr");
    }
}
