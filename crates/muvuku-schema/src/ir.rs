use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named booleans, e.g. a field's validation rules or flags.
pub type NameSet = BTreeMap<String, bool>;

/// Text keyed by language code.
pub type LanguageMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Phone,
    Date,
    Month,
    Integer,
    Numeric,
    Boolean,
    Select,
}

impl FieldType {
    /// Parse one of the user-facing type names. `select` is never accepted
    /// here; it is assigned when a field carries a selection list.
    pub fn from_name(name: &str) -> Option<FieldType> {
        match name {
            "string" => Some(FieldType::String),
            "phone" => Some(FieldType::Phone),
            "date" => Some(FieldType::Date),
            "month" => Some(FieldType::Month),
            "integer" => Some(FieldType::Integer),
            "numeric" => Some(FieldType::Numeric),
            "boolean" => Some(FieldType::Boolean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Length {
    pub lower: u32,
    pub upper: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Lower-cased form code.
    pub code: String,
    pub length: Length,
    pub label: Option<LanguageMap>,
    pub count: usize,
    /// `count` plus two per date field (day/month/year are entered separately).
    pub count_expanded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub flags: NameSet,
    pub validations: NameSet,
    /// Symbols of the conditions that gate this field.
    pub conditions: NameSet,
    pub is_date_type: bool,
    pub is_month_type: bool,
    pub is_integer_type: bool,
    pub name: String,
    pub comment: String,
    pub list: Option<SelectionList>,
    pub list_ref: Option<String>,
    #[serde(rename = "ref")]
    pub label_ref: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub length: Length,
    pub conditions_operator_is_or: bool,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringValue {
    pub name: String,
    pub language: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringTableEntry {
    pub localized: bool,
    pub list: Vec<StringValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOption {
    pub name: String,
    #[serde(rename = "ref")]
    pub string_ref: String,
    pub key: i64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageList {
    pub name: String,
    pub language: String,
    pub list: Vec<ListOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionList {
    pub name: String,
    pub size: usize,
    pub map: BTreeMap<String, LanguageList>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    /// Field position -> required value.
    pub equal: BTreeMap<usize, i64>,
    pub operator_is_logical_or: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub meta: Meta,
    pub fields: Vec<Field>,
    pub strings: BTreeMap<String, StringTableEntry>,
    /// Keyed by field name.
    pub lists: BTreeMap<String, SelectionList>,
    pub fieldmap: BTreeMap<String, Field>,
    pub conditions: BTreeMap<String, Condition>,
}
