use std::collections::{BTreeMap, HashMap};

use crate::encode::gsm_substitutions;

use super::patterns::Patterns;

/// A string or string-array declaration lifted from legacy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// `u8 PROGMEM name[] = "...";`
    RawString(String),
    /// `lc_char PROGMEM name[] = { LC_EN("...") ... LC_END };`, keyed by
    /// upper-case language tag.
    LocalizedString(BTreeMap<String, String>),
    /// `lc_list PROGMEM name[] = { LC_EN_LIST(list) ... LC_END_LIST };`
    LocalizedList(BTreeMap<String, Vec<Option<String>>>),
    /// `u8 *PROGMEM name[] = { a, b, ... };`. Entries that do not name a
    /// known raw string are `None`.
    List(Vec<Option<String>>),
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.symbols.insert(name.into(), symbol);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn raw_string(&self, name: &str) -> Option<&str> {
        match self.symbols.get(name) {
            Some(Symbol::RawString(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Decode the octal escapes written by the substitution encoder back into
/// the characters they stand for. Escapes outside that table, including an
/// escaped backslash, are kept as-is.
pub fn decode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(at) = rest.find('\\') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        if let Some(after) = tail.strip_prefix('\\') {
            out.push_str("\\\\");
            rest = after;
            continue;
        }
        let digits = tail
            .bytes()
            .take(3)
            .take_while(|b| (b'0'..=b'7').contains(b))
            .count();
        let decoded = if digits == 0 {
            None
        } else {
            u32::from_str_radix(&tail[..digits], 8)
                .ok()
                .and_then(char_for_octal)
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[digits..];
            }
            None => {
                out.push('\\');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn char_for_octal(value: u32) -> Option<char> {
    gsm_substitutions().iter().find_map(|(c, escape)| {
        let code = u32::from_str_radix(escape.trim_start_matches('\\'), 8).ok()?;
        (code == value).then_some(*c)
    })
}

/// Scan the whole source once and collect every string and list declaration.
///
/// Raw strings are collected first; braced groups are then classified in
/// source order, so a list can only refer to strings declared before it or to
/// any raw string.
pub(crate) fn build_symbol_table(src: &str, patterns: &Patterns) -> SymbolTable {
    let mut table = SymbolTable::default();

    for caps in patterns.raw_string.captures_iter(src) {
        table.insert(
            caps[1].trim(),
            Symbol::RawString(decode_escapes(&caps[2])),
        );
    }

    for caps in patterns.braced_group.captures_iter(src) {
        let name = caps[1].trim().to_string();
        let body = &caps[2];

        let symbol = if patterns.localized_string_end.is_match(body) {
            let mut values = BTreeMap::new();
            for m in patterns.localized_string.captures_iter(body) {
                values.insert(m[1].trim().to_string(), m[2].trim().to_string());
            }
            Symbol::LocalizedString(values)
        } else if patterns.localized_list_end.is_match(body) {
            let mut values = BTreeMap::new();
            for m in patterns.localized_list.captures_iter(body) {
                if let Some(Symbol::List(items)) = table.get(&m[2]) {
                    values.insert(m[1].to_string(), items.clone());
                }
            }
            Symbol::LocalizedList(values)
        } else {
            let items = body
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| table.raw_string(s).map(str::to_string))
                .collect();
            Symbol::List(items)
        };

        table.insert(name, symbol);
    }

    tracing::debug!(symbols = table.len(), "built legacy symbol table");
    table
}
