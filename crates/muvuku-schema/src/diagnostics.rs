use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Read,
    Parse,
    Normalize,
    Encode,
    Compile,
    Resolve,
    Extract,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticCode {
    MVK0001ReadFailed,
    MVK0002ParseFailed,
    MVK0003WriteFailed,
    MVK0100InvalidTopLevel,
    MVK0101InvalidAttribute,
    MVK0110InvalidFieldName,
    MVK0111InvalidFormCode,
    MVK0120NonStringFieldType,
    MVK0121UnknownFieldType,
    MVK0130InvalidPosition,
    MVK0140InvalidLength,
    MVK0150NonArrayList,
    MVK0151InvalidListPair,
    MVK0152InvalidListItem,
    MVK0160InvalidConditionValue,
    MVK0170InvalidValidations,
    MVK0171InvalidFlags,
    MVK0180InvalidText,
    MVK0300StringTooLong,
    MVK0400FieldFailed,
    MVK0401FormFailed,
    MVK0402FileFailed,
    MVK0410UnresolvedCondition,
    MVK0500MessageTooLong,
    MVK0901InternalPattern,
}

impl DiagnosticCode {
    pub fn code_str(self) -> &'static str {
        match self {
            DiagnosticCode::MVK0001ReadFailed => "MVK0001",
            DiagnosticCode::MVK0002ParseFailed => "MVK0002",
            DiagnosticCode::MVK0003WriteFailed => "MVK0003",
            DiagnosticCode::MVK0100InvalidTopLevel => "MVK0100",
            DiagnosticCode::MVK0101InvalidAttribute => "MVK0101",
            DiagnosticCode::MVK0110InvalidFieldName => "MVK0110",
            DiagnosticCode::MVK0111InvalidFormCode => "MVK0111",
            DiagnosticCode::MVK0120NonStringFieldType => "MVK0120",
            DiagnosticCode::MVK0121UnknownFieldType => "MVK0121",
            DiagnosticCode::MVK0130InvalidPosition => "MVK0130",
            DiagnosticCode::MVK0140InvalidLength => "MVK0140",
            DiagnosticCode::MVK0150NonArrayList => "MVK0150",
            DiagnosticCode::MVK0151InvalidListPair => "MVK0151",
            DiagnosticCode::MVK0152InvalidListItem => "MVK0152",
            DiagnosticCode::MVK0160InvalidConditionValue => "MVK0160",
            DiagnosticCode::MVK0170InvalidValidations => "MVK0170",
            DiagnosticCode::MVK0171InvalidFlags => "MVK0171",
            DiagnosticCode::MVK0180InvalidText => "MVK0180",
            DiagnosticCode::MVK0300StringTooLong => "MVK0300",
            DiagnosticCode::MVK0400FieldFailed => "MVK0400",
            DiagnosticCode::MVK0401FormFailed => "MVK0401",
            DiagnosticCode::MVK0402FileFailed => "MVK0402",
            DiagnosticCode::MVK0410UnresolvedCondition => "MVK0410",
            DiagnosticCode::MVK0500MessageTooLong => "MVK0500",
            DiagnosticCode::MVK0901InternalPattern => "MVK0901",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            DiagnosticCode::MVK0001ReadFailed => "unable to read file",
            DiagnosticCode::MVK0002ParseFailed => "failure while parsing JSON",
            DiagnosticCode::MVK0003WriteFailed => "unable to open file for writing",
            DiagnosticCode::MVK0100InvalidTopLevel => {
                "top-level must be object or array of objects"
            }
            DiagnosticCode::MVK0101InvalidAttribute => "missing and/or invalid attribute",
            DiagnosticCode::MVK0110InvalidFieldName => "field name violates naming rules",
            DiagnosticCode::MVK0111InvalidFormCode => "form code must be 1 to 9 characters",
            DiagnosticCode::MVK0120NonStringFieldType => "non-string field type specified",
            DiagnosticCode::MVK0121UnknownFieldType => "unrecognized field type",
            DiagnosticCode::MVK0130InvalidPosition => {
                "position attribute required; must be numeric"
            }
            DiagnosticCode::MVK0140InvalidLength => {
                "length must be an integer or a two-item array"
            }
            DiagnosticCode::MVK0150NonArrayList => "non-array selection list encountered",
            DiagnosticCode::MVK0151InvalidListPair => "list option must be two-member array",
            DiagnosticCode::MVK0152InvalidListItem => "list item has invalid type",
            DiagnosticCode::MVK0160InvalidConditionValue => {
                "condition right-hand-side must be an integer"
            }
            DiagnosticCode::MVK0170InvalidValidations => "list of validation rules is invalid",
            DiagnosticCode::MVK0171InvalidFlags => "list of field flags is invalid",
            DiagnosticCode::MVK0180InvalidText => "text value must be a string or language map",
            DiagnosticCode::MVK0300StringTooLong => "string too long for SLV encoding",
            DiagnosticCode::MVK0400FieldFailed => "error while compiling field",
            DiagnosticCode::MVK0401FormFailed => "error while compiling fields",
            DiagnosticCode::MVK0402FileFailed => "error while compiling forms",
            DiagnosticCode::MVK0410UnresolvedCondition => {
                "condition refers to non-existent field"
            }
            DiagnosticCode::MVK0500MessageTooLong => {
                "maximum message length is > 160 characters"
            }
            DiagnosticCode::MVK0901InternalPattern => "internal extractor pattern failed to build",
        }
    }

    pub fn default_help(self) -> Option<&'static str> {
        match self {
            DiagnosticCode::MVK0110InvalidFieldName => Some(
                "Field names start with a word character and are at least two characters long.",
            ),
            DiagnosticCode::MVK0121UnknownFieldType => Some(
                "Use one of: string, phone, date, month, integer, numeric, boolean.",
            ),
            DiagnosticCode::MVK0300StringTooLong => {
                Some("Shorten the text to at most 255 characters.")
            }
            DiagnosticCode::MVK0500MessageTooLong => {
                Some("Reduce field lengths or split the form in two.")
            }
            _ => None,
        }
    }
}

/// Situational attributes attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detail {
    None,
    Path {
        path: String,
    },
    Field {
        field: String,
    },
    Form {
        code: Option<String>,
        path: Option<String>,
        offset: usize,
    },
    FormCode {
        code: String,
    },
    TypeName {
        found: String,
    },
    Attribute {
        name: String,
        expected: String,
    },
    Index {
        index: usize,
    },
    TextLength {
        chars: usize,
        limit: usize,
    },
    MessageLength {
        code: String,
        lower: u32,
        upper: u32,
        limit: u32,
    },
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::None => Ok(()),
            Detail::Path { path } => write!(f, "path={path}"),
            Detail::Field { field } => write!(f, "field={field:?}"),
            Detail::Form { code, path, offset } => {
                write!(f, "offset={offset}")?;
                if let Some(code) = code {
                    write!(f, ", code={code}")?;
                }
                if let Some(path) = path {
                    write!(f, ", path={path}")?;
                }
                Ok(())
            }
            Detail::FormCode { code } => write!(f, "code={code:?}"),
            Detail::TypeName { found } => write!(f, "type={found}"),
            Detail::Attribute { name, expected } => {
                write!(f, "attribute={name}, expected={expected}")
            }
            Detail::Index { index } => write!(f, "index={index}"),
            Detail::TextLength { chars, limit } => write!(f, "chars={chars}, limit={limit}"),
            Detail::MessageLength {
                code,
                lower,
                upper,
                limit,
            } => write!(f, "code={code}, lower={lower}, upper={upper}, limit={limit}"),
        }
    }
}

/// A compilation failure plus the chain of enclosing failures that caused it
/// to be reported.
///
/// The innermost cause sits at the end of the `parent` chain; each enclosing
/// unit (field, form, file, run) wraps the diagnostic it received with its own
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub phase: Phase,
    pub message: String,
    pub detail: Detail,
    pub help: Option<String>,
    pub parent: Option<Box<Diagnostic>>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, phase: Phase, detail: Detail) -> Self {
        Diagnostic {
            code,
            phase,
            message: code.default_message().to_string(),
            detail,
            help: code.default_help().map(|s| s.to_string()),
            parent: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Wrap `self` as the cause of a new, outer diagnostic.
    pub fn within(self, code: DiagnosticCode, phase: Phase, detail: Detail) -> Self {
        let mut outer = Diagnostic::error(code, phase, detail);
        outer.parent = Some(Box::new(self));
        outer
    }

    /// Iterate from this diagnostic down to the root cause.
    pub fn chain(&self) -> impl Iterator<Item = &Diagnostic> {
        std::iter::successors(Some(self), |d| d.parent.as_deref())
    }

    pub fn root_cause(&self) -> &Diagnostic {
        self.chain().last().unwrap_or(self)
    }

    fn fmt_one(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?}: {}",
            self.code.code_str(),
            self.phase,
            self.message
        )?;
        if self.detail != Detail::None {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_one(f)?;
        for cause in self.chain().skip(1) {
            write!(f, "\n  caused by: ")?;
            cause.fmt_one(f)?;
        }
        if let Some(help) = &self.root_cause().help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.parent
            .as_deref()
            .map(|p| p as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_renders_outermost_first() {
        let inner = Diagnostic::error(
            DiagnosticCode::MVK0121UnknownFieldType,
            Phase::Normalize,
            Detail::TypeName {
                found: "\"bogus\"".to_string(),
            },
        );
        let field = inner.within(
            DiagnosticCode::MVK0400FieldFailed,
            Phase::Compile,
            Detail::Field {
                field: "age".to_string(),
            },
        );
        let form = field.within(
            DiagnosticCode::MVK0401FormFailed,
            Phase::Compile,
            Detail::Form {
                code: Some("reg".to_string()),
                path: Some("forms.json".to_string()),
                offset: 0,
            },
        );

        let text = form.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("MVK0401 Compile: error while compiling fields"));
        assert!(lines[0].contains("code=reg"));
        assert!(lines[0].contains("path=forms.json"));
        assert!(lines[1].contains("MVK0400"));
        assert!(lines[1].contains("field=\"age\""));
        assert!(lines[2].contains("MVK0121"));
        assert!(lines[3].starts_with("  help: Use one of"));

        assert_eq!(form.chain().count(), 3);
        assert_eq!(
            form.root_cause().code,
            DiagnosticCode::MVK0121UnknownFieldType
        );
    }

    #[test]
    fn source_walks_parent() {
        use std::error::Error as _;

        let d = Diagnostic::error(
            DiagnosticCode::MVK0150NonArrayList,
            Phase::Normalize,
            Detail::None,
        )
        .within(
            DiagnosticCode::MVK0400FieldFailed,
            Phase::Compile,
            Detail::Field {
                field: "sex".to_string(),
            },
        );
        let src = d.source().expect("parent");
        assert!(src.to_string().starts_with("MVK0150"));
        assert!(src.source().is_none());
    }
}
