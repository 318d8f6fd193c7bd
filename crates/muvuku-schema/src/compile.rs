use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::diagnostics::{Detail, Diagnostic, DiagnosticCode, Phase};
use crate::encode::encode_string;
use crate::ir::{
    Condition, Field, FieldType, Form, LanguageList, LanguageMap, Length, ListOption, Meta,
    NameSet, SelectionList, StringTableEntry, StringValue,
};
use crate::normalize::{
    normalize_condition_operator, normalize_conditions, normalize_field_length,
    normalize_field_position, normalize_field_type, normalize_flags, normalize_list_options,
    normalize_multilanguage, normalize_toplevel, normalize_validations, require_object,
    validate_field_name, validate_form_code,
};
use crate::options::CompileOptions;

const DATE_PARTS: [(&str, &str); 3] = [
    ("_day", "Day: "),
    ("_month", "Month: "),
    ("_year", "Year: "),
];

/// A condition whose left-hand sides are still field names.
#[derive(Debug)]
struct PendingCondition {
    name: String,
    equal: IndexMap<String, i64>,
    operator_is_logical_or: bool,
}

/// Accumulates one form while its fields are compiled.
///
/// Fields are slotted by declared position; a later field declared at an
/// occupied position replaces the earlier one. `finish` compacts the slots
/// into a dense `0..n` sequence.
struct FormBuilder<'a> {
    opts: &'a CompileOptions,
    code: String,
    length: Length,
    slots: BTreeMap<usize, Field>,
    names: BTreeMap<String, usize>,
    strings: BTreeMap<String, StringTableEntry>,
    lists: BTreeMap<String, SelectionList>,
    pending: Vec<PendingCondition>,
}

impl<'a> FormBuilder<'a> {
    fn new(code: String, opts: &'a CompileOptions) -> Self {
        FormBuilder {
            opts,
            code,
            length: Length {
                lower: opts.header_length,
                upper: opts.header_length,
            },
            slots: BTreeMap::new(),
            names: BTreeMap::new(),
            strings: BTreeMap::new(),
            lists: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    fn add_string(&mut self, symbol: &str, lang: &str, text: &str) -> Result<(), Diagnostic> {
        let value = encode_string(text)?;
        self.strings
            .entry(symbol.to_string())
            .or_insert_with(|| StringTableEntry {
                localized: true,
                list: Vec::new(),
            })
            .list
            .push(StringValue {
                name: format!("{symbol}_{lang}"),
                language: lang.to_lowercase(),
                value,
            });
        Ok(())
    }

    fn compile_field(&mut self, name: &str, def: &Value) -> Result<(), Diagnostic> {
        validate_field_name(name)?;
        let def = require_object(Some(def), name)?;
        let labels = require_object(def.get("labels"), &format!("{name}.labels"))?;

        let declared_type = normalize_field_type(def.get("type"))?;
        let position = normalize_field_position(def.get("position"))?;

        let label_ref = format!("lc_{}_{}", self.code, name);
        let short = match labels.get("short") {
            Some(Value::Null) | Some(Value::Bool(false)) | None => Value::String(name.to_string()),
            Some(Value::String(s)) if s.is_empty() => Value::String(name.to_string()),
            Some(v) => v.clone(),
        };
        let label = normalize_multilanguage(&short, self.opts)?;

        for (lang, text) in &label {
            self.add_string(&label_ref, lang, text)?;
            if declared_type == FieldType::Date {
                for (suffix, prefix) in DATE_PARTS {
                    let symbol = format!("{label_ref}{suffix}");
                    self.add_string(&symbol, lang, &format!("{prefix}{text}"))?;
                }
            }
        }

        let mut field_type = declared_type;
        if let Some(list) = def.get("list").filter(|v| !v.is_null()) {
            field_type = FieldType::Select;
            self.compile_list_options(name, list)?;
        }

        let conditions_operator_is_or =
            normalize_condition_operator(def.get("conditions-operator"));
        let mut conditions = NameSet::new();
        if let Some(raw) = def.get("conditions").filter(|v| !v.is_null()) {
            let symbol = format!("cf_{}_{}", self.code, name);
            self.pending.push(PendingCondition {
                name: symbol.clone(),
                equal: normalize_conditions(Some(raw))?,
                operator_is_logical_or: conditions_operator_is_or,
            });
            conditions.insert(symbol, true);
        }

        let validations = normalize_validations(def.get("validations"))?;
        let flags = normalize_flags(def.get("flags"))?;
        let length = normalize_field_length(def.get("length"))?;

        let list = self.lists.get(name).cloned();
        let field = Field {
            flags,
            validations,
            conditions,
            is_date_type: field_type == FieldType::Date,
            is_month_type: field_type == FieldType::Month,
            is_integer_type: field_type == FieldType::Integer,
            name: name.to_string(),
            comment: comment_for(&label, &self.opts.default_language, name),
            list_ref: list.as_ref().map(|l| l.name.clone()),
            list,
            label_ref,
            field_type,
            length,
            conditions_operator_is_or,
            position,
        };

        self.length = self.add_length(length)?;
        if let Some(displaced) = self.slots.insert(position, field) {
            tracing::warn!(
                form = %self.code,
                position,
                displaced = %displaced.name,
                replacement = %name,
                "two fields declared at the same position; keeping the later one"
            );
            self.forget(&displaced);
        }
        self.names.insert(name.to_string(), position);
        Ok(())
    }

    /// Running form budget plus one field's length. Fails instead of wrapping.
    fn add_length(&self, length: Length) -> Result<Length, Diagnostic> {
        match (
            self.length.lower.checked_add(length.lower),
            self.length.upper.checked_add(length.upper),
        ) {
            (Some(lower), Some(upper)) => Ok(Length { lower, upper }),
            _ => Err(Diagnostic::error(
                DiagnosticCode::MVK0140InvalidLength,
                Phase::Compile,
                Detail::None,
            )
            .with_message(format!(
                "form length overflows: {} + {} characters",
                self.length.upper, length.upper
            ))),
        }
    }

    /// Drop the strings, list and conditions owned by a field that lost its slot.
    fn forget(&mut self, displaced: &Field) {
        self.strings.remove(&displaced.label_ref);
        for (suffix, _) in DATE_PARTS {
            self.strings.remove(&format!("{}{suffix}", displaced.label_ref));
        }
        if let Some(list) = self.lists.remove(&displaced.name) {
            for option in list.map.values().flat_map(|l| &l.list) {
                self.strings.remove(&option.name);
            }
        }
        self.pending
            .retain(|cond| !displaced.conditions.contains_key(&cond.name));
    }

    fn compile_list_options(&mut self, field: &str, raw: &Value) -> Result<(), Diagnostic> {
        let options = normalize_list_options(raw, self.opts)?;
        let mut map: BTreeMap<String, LanguageList> = BTreeMap::new();

        for (i, option) in options.iter().enumerate() {
            for (lang, text) in &option.text {
                let option_name = format!("lc_{}_{}_{}_{}", self.code, field, lang, i + 1);
                let value = encode_string(text)?;

                self.strings.insert(
                    option_name.clone(),
                    StringTableEntry {
                        localized: false,
                        list: vec![StringValue {
                            name: option_name.clone(),
                            language: lang.to_lowercase(),
                            value: value.clone(),
                        }],
                    },
                );

                let code = &self.code;
                map.entry(lang.clone())
                    .or_insert_with(|| LanguageList {
                        name: format!("ll_{code}_{field}_{lang}"),
                        language: lang.to_lowercase(),
                        list: Vec::new(),
                    })
                    .list
                    .push(ListOption {
                        name: option_name.clone(),
                        string_ref: option_name,
                        key: option.key,
                        value,
                    });
            }
        }

        self.lists.insert(
            field.to_string(),
            SelectionList {
                name: format!("l_{}_{}", self.code, field),
                size: options.len(),
                map,
            },
        );
        Ok(())
    }

    fn finish(self, label: Option<LanguageMap>) -> Result<Form, Diagnostic> {
        let mut fields: Vec<Field> = Vec::with_capacity(self.slots.len());
        let mut final_position: BTreeMap<usize, usize> = BTreeMap::new();
        for (declared, mut field) in self.slots {
            final_position.insert(declared, fields.len());
            field.position = fields.len();
            fields.push(field);
        }

        let mut fieldmap: BTreeMap<String, Field> = BTreeMap::new();
        for (name, declared) in &self.names {
            let Some(field) = final_position.get(declared).map(|&i| &fields[i]) else {
                continue;
            };
            if &field.name == name {
                fieldmap.insert(name.clone(), field.clone());
            }
        }

        let count = fields.len();
        let count_expanded = count
            + 2 * fields
                .iter()
                .filter(|f| f.field_type == FieldType::Date)
                .count();

        let conditions = resolve_conditions(self.pending, &fieldmap)?;

        Ok(Form {
            meta: Meta {
                code: self.code,
                length: self.length,
                label,
                count,
                count_expanded,
            },
            fields,
            strings: self.strings,
            lists: self.lists,
            fieldmap,
            conditions,
        })
    }
}

/// Rewrite each condition's field names to the fields' final positions.
fn resolve_conditions(
    pending: Vec<PendingCondition>,
    fieldmap: &BTreeMap<String, Field>,
) -> Result<BTreeMap<String, Condition>, Diagnostic> {
    let mut out = BTreeMap::new();
    for cond in pending {
        let mut equal = BTreeMap::new();
        for (lhs, value) in cond.equal {
            let Some(field) = fieldmap.get(&lhs) else {
                return Err(Diagnostic::error(
                    DiagnosticCode::MVK0410UnresolvedCondition,
                    Phase::Resolve,
                    Detail::Field { field: lhs },
                ));
            };
            equal.insert(field.position, value);
        }
        out.insert(
            cond.name.clone(),
            Condition {
                name: cond.name,
                equal,
                operator_is_logical_or: cond.operator_is_logical_or,
            },
        );
    }
    Ok(out)
}

/// Single-line comment text taken from the default-language label.
fn comment_for(label: &LanguageMap, default_language: &str, field: &str) -> String {
    let Some(text) = label
        .get(default_language)
        .or_else(|| label.values().next())
    else {
        return field.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let is_break = match c {
            '\r' | '\n' => true,
            '\\' if matches!(chars.peek(), Some('r') | Some('n')) => {
                chars.next();
                true
            }
            _ => false,
        };
        if is_break {
            if !in_break {
                out.push_str(": ");
            }
            in_break = true;
        } else {
            in_break = false;
            out.push(c);
        }
    }
    out
}

fn compile_form_body(
    form: &Map<String, Value>,
    code: String,
    opts: &CompileOptions,
) -> Result<Form, Diagnostic> {
    let meta = require_object(form.get("meta"), "meta")?;
    let fields = require_object(form.get("fields"), "fields")?;

    let label = match meta.get("label") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let mut encoded = LanguageMap::new();
            for (lang, text) in normalize_multilanguage(v, opts)? {
                encoded.insert(lang, encode_string(&text)?);
            }
            Some(encoded)
        }
    };

    let mut builder = FormBuilder::new(code, opts);
    for (name, def) in fields {
        builder.compile_field(name, def).map_err(|e| {
            e.within(
                DiagnosticCode::MVK0400FieldFailed,
                Phase::Compile,
                Detail::Field {
                    field: name.clone(),
                },
            )
        })?;
    }
    builder.finish(label)
}

/// Compile one form definition. `offset` is the form's index within its file.
pub fn compile_form(
    form: &Value,
    path: Option<&str>,
    offset: usize,
    opts: &CompileOptions,
) -> Result<Form, Diagnostic> {
    let context = |code: Option<String>| Detail::Form {
        code,
        path: path.map(str::to_string),
        offset,
    };
    let wrap = |e: Diagnostic, code: Option<String>| {
        e.within(DiagnosticCode::MVK0401FormFailed, Phase::Compile, context(code))
    };

    let obj = require_object(Some(form), "form").map_err(|e| wrap(e, None))?;
    let meta = require_object(obj.get("meta"), "meta").map_err(|e| wrap(e, None))?;
    let code = validate_form_code(meta.get("code")).map_err(|e| wrap(e, None))?;

    tracing::debug!(code = %code, offset, "compiling form");
    let compiled = compile_form_body(obj, code.clone(), opts).map_err(|e| wrap(e, Some(code)))?;
    tracing::debug!(
        code = %compiled.meta.code,
        fields = compiled.meta.count,
        upper = compiled.meta.length.upper,
        "compiled form"
    );
    Ok(compiled)
}

pub fn compile_forms(
    forms: &[Value],
    path: Option<&str>,
    opts: &CompileOptions,
) -> Result<Vec<Form>, Diagnostic> {
    forms
        .iter()
        .enumerate()
        .map(|(offset, form)| compile_form(form, path, offset, opts))
        .collect()
}

/// Parse one JSON schema document and compile every form in it.
pub fn compile_document(
    text: &str,
    path: Option<&str>,
    opts: &CompileOptions,
) -> Result<Vec<Form>, Diagnostic> {
    let file_detail = || Detail::Path {
        path: path.unwrap_or("<input>").to_string(),
    };

    let doc: Value = serde_json::from_str(text).map_err(|e| {
        Diagnostic::error(DiagnosticCode::MVK0002ParseFailed, Phase::Parse, file_detail())
            .with_message(format!("failure while parsing JSON: {e}"))
    })?;

    normalize_toplevel(doc)
        .and_then(|forms| compile_forms(&forms, path, opts))
        .map_err(|e| e.within(DiagnosticCode::MVK0402FileFailed, Phase::Compile, file_detail()))
}

/// Run-level gate: every form must fit in a single message.
pub fn check_message_lengths(forms: &[Form], opts: &CompileOptions) -> Result<(), Diagnostic> {
    for form in forms {
        let length = form.meta.length;
        if length.upper > opts.max_message_length {
            return Err(Diagnostic::error(
                DiagnosticCode::MVK0500MessageTooLong,
                Phase::Compile,
                Detail::MessageLength {
                    code: form.meta.code.clone(),
                    lower: length.lower,
                    upper: length.upper,
                    limit: opts.max_message_length,
                },
            )
            .with_message(format!(
                "maximum message length is > {} characters",
                opts.max_message_length
            )));
        }
    }
    Ok(())
}
