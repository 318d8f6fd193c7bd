use std::collections::BTreeMap;

use indexmap::IndexMap;
use muvuku_contracts::RESERVED_FORM_CODE;
use serde::{Deserialize, Serialize};

use crate::ir::{FieldType, NameSet};

use super::patterns::Patterns;
use super::symtab::{decode_escapes, Symbol, SymbolTable};

const ITEM_INTRODUCER: &str = "SCHEMA_ITEM(";

/// Text keyed by lower-case language code; `None` where the source had no
/// resolvable value.
pub type LegacyText = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLabels {
    pub short: LegacyText,
    pub long: Option<String>,
    pub description: Option<String>,
}

/// A field in the authoring schema's shape, ready to be fed back into the
/// compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyField {
    pub labels: LegacyLabels,
    pub position: usize,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    pub length: [u32; 2],
    pub validations: NameSet,
    pub flags: NameSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<(u32, LegacyText)>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMeta {
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyForm {
    pub meta: LegacyMeta,
    pub fields: IndexMap<String, LegacyField>,
}

pub fn legacy_type(name: &str) -> Option<FieldType> {
    match name {
        "TS_PHONE" => Some(FieldType::Phone),
        "TS_STRING" => Some(FieldType::String),
        "TS_SELECT" | "TS_INTEGER" => Some(FieldType::Integer),
        "TS_BOOLEAN" => Some(FieldType::Boolean),
        _ => None,
    }
}

enum CodeRef<'a> {
    Symbol(&'a str),
    Literal(&'a str),
}

/// `SCHEMA_BEGIN(list, code, size);`
struct BlockHeader<'a> {
    code: CodeRef<'a>,
    /// Advisory only; never checked against the items actually present.
    size: u32,
}

fn parse_header<'a>(body: &'a str, patterns: &Patterns) -> Option<BlockHeader<'a>> {
    let caps = patterns.block_header.captures(body)?;
    let args_text = caps.get(1)?.as_str();
    let args: Vec<&str> = args_text.split(',').map(str::trim).collect();
    if args.len() < 3 {
        return None;
    }

    let code = match args[1].strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(literal) => CodeRef::Literal(literal),
        None => CodeRef::Symbol(args[1]),
    };
    let size = args[2].parse().ok()?;
    Some(BlockHeader { code, size })
}

fn split_items(body: &str) -> Vec<&str> {
    let skip = ITEM_INTRODUCER.len() - 1;
    let starts: Vec<usize> = body
        .match_indices(ITEM_INTRODUCER)
        .map(|(i, _)| i + skip)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).map(|&next| next - skip).unwrap_or(body.len());
            &body[start..end]
        })
        .collect()
}

struct Locale {
    /// Upper-case tag as written in `LC_XX(...)`.
    tag: String,
    /// Lower-case key used in the emitted schema.
    key: String,
}

fn extract_item(
    table: &SymbolTable,
    item: &str,
    position: usize,
    locale: &Locale,
    patterns: &Patterns,
) -> Option<(String, LegacyField)> {
    let label_caps = patterns.item_label.captures(item)?;
    let label_symbol = label_caps.get(1).or_else(|| label_caps.get(2))?.as_str();

    let Some(args) = patterns.item_args.captures(item) else {
        tracing::debug!(label = label_symbol, "skipping item without type/length arguments");
        return None;
    };
    let min_chars: u32 = args[2].parse().ok()?;
    let max_chars: u32 = args[3].parse().ok()?;

    let label = match table.get(label_symbol) {
        Some(Symbol::LocalizedString(values)) => {
            values.get(&locale.tag).map(|s| decode_escapes(s))
        }
        Some(Symbol::RawString(s)) => Some(s.clone()),
        _ => None,
    };

    let list = patterns
        .item_choices
        .captures(item)
        .and_then(|caps| match table.get(&caps[1]) {
            Some(Symbol::LocalizedList(lists)) => lists.get(&locale.tag).cloned(),
            _ => None,
        })
        .map(|choices| {
            choices
                .into_iter()
                .enumerate()
                .map(|(i, text)| (i as u32 + 1, localize(locale, text)))
                .collect()
        });

    let mut validations = NameSet::new();
    for caps in patterns.item_validate.captures_iter(item) {
        validations.insert(caps[1].to_lowercase(), true);
    }

    let mut flags = NameSet::new();
    for caps in patterns.item_flags.captures_iter(item) {
        let flag = caps[1].to_lowercase();
        let flag = flag.strip_prefix("fl_").unwrap_or(&flag).to_string();
        flags.insert(flag, true);
    }

    let key = label_symbol
        .strip_prefix("lc_")
        .unwrap_or(label_symbol)
        .to_string();

    Some((
        key,
        LegacyField {
            labels: LegacyLabels {
                short: localize(locale, label),
                long: None,
                description: None,
            },
            position,
            field_type: legacy_type(&args[1]),
            length: [min_chars, max_chars],
            validations,
            flags,
            list,
        },
    ))
}

fn localize(locale: &Locale, value: Option<String>) -> LegacyText {
    let mut out = LegacyText::new();
    out.insert(locale.key.clone(), value);
    out
}

/// Reassemble every schema block in `src` into an authoring-schema form.
pub(crate) fn build_forms(
    table: &SymbolTable,
    src: &str,
    locale: &str,
    patterns: &Patterns,
) -> Vec<LegacyForm> {
    let locale = Locale {
        tag: locale.to_uppercase(),
        key: locale.to_lowercase(),
    };
    let mut out = Vec::new();

    for block in patterns.schema_block.captures_iter(src) {
        let body = block.get(1).map(|m| m.as_str()).unwrap_or_default();

        let Some(header) = parse_header(body, patterns) else {
            tracing::debug!("skipping schema block with fewer than three header arguments");
            continue;
        };

        let code = match header.code {
            CodeRef::Literal(code) => Some(code.to_string()),
            CodeRef::Symbol(symbol) => table.raw_string(symbol).map(str::to_string),
        };
        if code.as_deref() == Some(RESERVED_FORM_CODE) {
            tracing::debug!("skipping reserved settings form");
            continue;
        }

        let mut fields = IndexMap::new();
        for (position, item) in split_items(body).into_iter().enumerate() {
            if let Some((key, field)) = extract_item(table, item, position, &locale, patterns) {
                fields.insert(key, field);
            }
        }

        if fields.len() != header.size as usize {
            tracing::warn!(
                code = code.as_deref().unwrap_or("<unresolved>"),
                declared = header.size,
                extracted = fields.len(),
                "schema block size does not match its items"
            );
        }

        out.push(LegacyForm {
            meta: LegacyMeta { code },
            fields,
        });
    }

    out
}
