//! Shape validation for authored form schemas.
//!
//! Every function here takes a raw JSON value and either returns its canonical
//! typed form or fails with a diagnostic describing the offending input. None of
//! them encode text; that happens in the compiler.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::diagnostics::{Detail, Diagnostic, DiagnosticCode, Phase};
use crate::encode::normalize_language_code;
use crate::ir::{FieldType, LanguageMap, Length, NameSet};
use crate::options::CompileOptions;

const DEFAULT_LENGTH: Length = Length { lower: 1, upper: 4 };

/// One selection-list option before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub key: i64,
    pub text: LanguageMap,
}

fn fail(code: DiagnosticCode, detail: Detail) -> Diagnostic {
    Diagnostic::error(code, Phase::Normalize, detail)
}

pub fn normalize_toplevel(doc: Value) -> Result<Vec<Value>, Diagnostic> {
    match doc {
        Value::Array(forms) => Ok(forms),
        Value::Object(_) => Ok(vec![doc]),
        _ => Err(fail(DiagnosticCode::MVK0100InvalidTopLevel, Detail::None)),
    }
}

pub fn require_object<'a>(
    value: Option<&'a Value>,
    attribute: &str,
) -> Result<&'a Map<String, Value>, Diagnostic> {
    value.and_then(Value::as_object).ok_or_else(|| {
        fail(
            DiagnosticCode::MVK0101InvalidAttribute,
            Detail::Attribute {
                name: attribute.to_string(),
                expected: "object".to_string(),
            },
        )
    })
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Plain text is filed under the default language; language maps pass through
/// with their codes normalized. Null entries inside a map are dropped.
pub fn normalize_multilanguage(
    value: &Value,
    opts: &CompileOptions,
) -> Result<LanguageMap, Diagnostic> {
    let mut out = LanguageMap::new();
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (lang, v) in map {
                if v.is_null() {
                    continue;
                }
                let text = text_of(v).ok_or_else(|| {
                    fail(
                        DiagnosticCode::MVK0180InvalidText,
                        Detail::Attribute {
                            name: lang.clone(),
                            expected: "string".to_string(),
                        },
                    )
                })?;
                out.insert(normalize_language_code(lang), text);
            }
        }
        other => {
            let text = text_of(other)
                .ok_or_else(|| fail(DiagnosticCode::MVK0180InvalidText, Detail::None))?;
            out.insert(opts.default_language.clone(), text);
        }
    }
    Ok(out)
}

pub fn normalize_field_type(value: Option<&Value>) -> Result<FieldType, Diagnostic> {
    let found = value.cloned().unwrap_or(Value::Null);
    let Some(name) = found.as_str() else {
        return Err(fail(
            DiagnosticCode::MVK0120NonStringFieldType,
            Detail::TypeName {
                found: found.to_string(),
            },
        ));
    };
    FieldType::from_name(name).ok_or_else(|| {
        fail(
            DiagnosticCode::MVK0121UnknownFieldType,
            Detail::TypeName {
                found: name.to_string(),
            },
        )
    })
}

pub fn normalize_field_position(value: Option<&Value>) -> Result<usize, Diagnostic> {
    let Some(n) = value.and_then(Value::as_f64) else {
        return Err(fail(DiagnosticCode::MVK0130InvalidPosition, Detail::None));
    };
    let rounded = n.round();
    if !rounded.is_finite() || rounded < 0.0 {
        return Err(fail(DiagnosticCode::MVK0130InvalidPosition, Detail::None)
            .with_message(format!("position must be a non-negative number, got {n}")));
    }
    Ok(rounded as usize)
}

fn as_bound(value: &Value) -> Option<u32> {
    let n = value.as_f64()?.round();
    if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) {
        Some(n as u32)
    } else {
        None
    }
}

pub fn normalize_field_length(value: Option<&Value>) -> Result<Length, Diagnostic> {
    let invalid = || fail(DiagnosticCode::MVK0140InvalidLength, Detail::None);

    let length = match value {
        None | Some(Value::Null) => DEFAULT_LENGTH,
        Some(v @ Value::Number(_)) => {
            let n = as_bound(v).ok_or_else(invalid)?;
            Length { lower: n, upper: n }
        }
        Some(Value::Array(pair)) if pair.len() == 2 => Length {
            lower: as_bound(&pair[0]).ok_or_else(invalid)?,
            upper: as_bound(&pair[1]).ok_or_else(invalid)?,
        },
        Some(_) => return Err(invalid()),
    };

    if length.lower > length.upper {
        return Err(invalid().with_message(format!(
            "length lower bound {} exceeds upper bound {}",
            length.lower, length.upper
        )));
    }
    Ok(length)
}

fn parse_option_key(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

pub fn normalize_list_options(
    value: &Value,
    opts: &CompileOptions,
) -> Result<Vec<OptionEntry>, Diagnostic> {
    let Some(items) = value.as_array() else {
        return Err(fail(DiagnosticCode::MVK0150NonArrayList, Detail::None));
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let entry = match item {
            Value::Array(pair) => {
                if pair.len() != 2 {
                    return Err(fail(
                        DiagnosticCode::MVK0151InvalidListPair,
                        Detail::Index { index },
                    ));
                }
                let key = parse_option_key(&pair[0]).ok_or_else(|| {
                    fail(DiagnosticCode::MVK0151InvalidListPair, Detail::Index { index })
                        .with_message("list option key must be an integer")
                })?;
                OptionEntry {
                    key,
                    text: normalize_multilanguage(&pair[1], opts)?,
                }
            }
            Value::String(_) | Value::Object(_) => OptionEntry {
                key: index as i64,
                text: normalize_multilanguage(item, opts)?,
            },
            _ => {
                return Err(fail(
                    DiagnosticCode::MVK0152InvalidListItem,
                    Detail::Index { index },
                ))
            }
        };
        out.push(entry);
    }
    Ok(out)
}

/// Field name -> required value, in the order written.
pub fn normalize_conditions(value: Option<&Value>) -> Result<IndexMap<String, i64>, Diagnostic> {
    let mut out = IndexMap::new();
    let map = match value {
        None | Some(Value::Null) => return Ok(out),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(fail(
                DiagnosticCode::MVK0101InvalidAttribute,
                Detail::Attribute {
                    name: "conditions".to_string(),
                    expected: "object".to_string(),
                },
            ))
        }
    };

    for (field, rhs) in map {
        let Some(n) = rhs.as_f64() else {
            return Err(fail(
                DiagnosticCode::MVK0160InvalidConditionValue,
                Detail::Field {
                    field: field.clone(),
                },
            ));
        };
        out.insert(field.clone(), rhs.as_i64().unwrap_or(n.trunc() as i64));
    }
    Ok(out)
}

pub fn normalize_condition_operator(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str) == Some("||")
}

fn name_set(value: Option<&Value>, code: DiagnosticCode) -> Result<NameSet, Diagnostic> {
    let mut out = NameSet::new();
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Array(names)) => {
            for (index, name) in names.iter().enumerate() {
                let name = text_of(name).ok_or_else(|| fail(code, Detail::Index { index }))?;
                out.insert(name, true);
            }
        }
        Some(Value::Object(map)) => {
            for name in map.keys() {
                out.insert(name.clone(), true);
            }
        }
        Some(_) => return Err(fail(code, Detail::None)),
    }
    Ok(out)
}

pub fn normalize_validations(value: Option<&Value>) -> Result<NameSet, Diagnostic> {
    name_set(value, DiagnosticCode::MVK0170InvalidValidations)
}

pub fn normalize_flags(value: Option<&Value>) -> Result<NameSet, Diagnostic> {
    name_set(value, DiagnosticCode::MVK0171InvalidFlags)
}

/// `\w` here is ASCII-only, matching the handset's symbol rules.
const FIELD_NAME_PATTERN: &str = r"(?-u)^\w[\d\w]+";
const FORM_CODE_PATTERN: &str = r"(?-u)^\w{1,9}$";

static FIELD_NAME: OnceLock<Result<Regex, Diagnostic>> = OnceLock::new();
static FORM_CODE: OnceLock<Result<Regex, Diagnostic>> = OnceLock::new();

fn is_match(
    cell: &'static OnceLock<Result<Regex, Diagnostic>>,
    pattern: &str,
    text: &str,
) -> Result<bool, Diagnostic> {
    let built = cell.get_or_init(|| {
        Regex::new(pattern).map_err(|e| {
            Diagnostic::error(
                DiagnosticCode::MVK0901InternalPattern,
                Phase::Normalize,
                Detail::None,
            )
            .with_message(format!("internal name pattern failed to build: {e}"))
        })
    });
    match built {
        Ok(re) => Ok(re.is_match(text)),
        Err(e) => Err(e.clone()),
    }
}

/// Field names need a leading word character followed by at least one more.
pub fn validate_field_name(name: &str) -> Result<(), Diagnostic> {
    if !is_match(&FIELD_NAME, FIELD_NAME_PATTERN, name)? {
        return Err(fail(
            DiagnosticCode::MVK0110InvalidFieldName,
            Detail::Field {
                field: name.to_string(),
            },
        ));
    }
    Ok(())
}

/// Returns the lower-cased code.
pub fn validate_form_code(value: Option<&Value>) -> Result<String, Diagnostic> {
    let found = value.cloned().unwrap_or(Value::Null);
    let Some(code) = found.as_str() else {
        return Err(fail(
            DiagnosticCode::MVK0111InvalidFormCode,
            Detail::FormCode {
                code: found.to_string(),
            },
        )
        .with_message("form code must be a string"));
    };
    if !is_match(&FORM_CODE, FORM_CODE_PATTERN, code)? {
        return Err(fail(
            DiagnosticCode::MVK0111InvalidFormCode,
            Detail::FormCode {
                code: code.to_string(),
            },
        ));
    }
    Ok(code.to_lowercase())
}
