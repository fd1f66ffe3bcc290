//! Shared types and errors for the aidesign settings engine.
//!
//! This crate provides the foundational types used across all other aidesign crates:
//! - `SettingsError` — unified error taxonomy
//! - `LiteralValue` — values produced by the literal text parser
//! - `OptionValue` — closed value variant for plugin options

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error type for all aidesign subsystems.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    // === Parser Errors ===
    #[error("XML parse error at line {line}, col {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
        source_snippet: Option<String>,
    },

    #[error("Malformed literal '{literal}': {message}")]
    MalformedLiteral { literal: String, message: String },

    // === Loader Errors ===
    #[error("Invalid XML tag '{tag}' in '{parent}'; valid tags are: {}", .valid_tags.join(", "))]
    UnknownTag {
        tag: String,
        parent: String,
        valid_tags: Vec<String>,
    },

    #[error("Element '{tag}' is missing required attribute '{attribute}'")]
    MissingAttribute { tag: String, attribute: String },

    // === Lookup Errors ===
    #[error("More than one element ({count}) is named '{name}'")]
    AmbiguousName { name: String, count: usize },

    #[error("No element exists with name '{name}'")]
    NotFound { name: String },

    #[error("Unresolved reference to '{name}'{}", referenced_by_suffix(.referenced_by))]
    UnresolvedReference {
        name: String,
        referenced_by: Option<String>,
    },

    // === Builder Errors ===
    #[error("'{tag}' is not a valid element name")]
    InvalidTag { tag: String },

    #[error("Value '{value}' cannot be written as literal text: {message}")]
    InvalidValue { value: String, message: String },

    #[error("Pipeline validation failed: {0}")]
    Validation(String),

    #[error("No file path set for this settings document")]
    NoFilePath,

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(owner) => format!(" (declared by '{owner}')"),
        None => String::new(),
    }
}

impl SettingsError {
    /// Returns `false` for errors that are reported but do not invalidate the
    /// rest of the document.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SettingsError::UnknownTag { .. } | SettingsError::UnresolvedReference { .. }
        )
    }

    /// Returns `true` if the error comes from a name lookup.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            SettingsError::AmbiguousName { .. }
                | SettingsError::NotFound { .. }
                | SettingsError::UnresolvedReference { .. }
        )
    }
}

/// A convenience alias for `Result<T, SettingsError>`.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ---------------------------------------------------------------------------
// LiteralValue — one evaluated value from a literal text block
// ---------------------------------------------------------------------------

/// A language-neutral literal. Tuples are represented as `List`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<LiteralValue>),
}

impl LiteralValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LiteralValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LiteralValue::Int(i) => Some(*i as f64),
            LiteralValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[LiteralValue]> {
        match self {
            LiteralValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Render the value as a single text line. Top-level strings are written
    /// raw unless they contain brackets, in which case they are quoted.
    ///
    /// A line containing both `(` and `)` is evaluated as a tuple when read
    /// back, so a string like `relu(x)` has no line form even when quoted.
    /// Line breaks and whitespace inside strings are not preserved either.
    /// `aidesign_xml::literal::encode_line` checks a value before it is written.
    pub fn to_text_line(&self) -> String {
        match self {
            LiteralValue::Str(s) if !s.contains('[') && !s.contains(']') => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::None => write!(f, "None"),
            LiteralValue::Bool(true) => write!(f, "True"),
            LiteralValue::Bool(false) => write!(f, "False"),
            LiteralValue::Int(i) => write!(f, "{i}"),
            LiteralValue::Float(x) => write!(f, "{x:?}"),
            LiteralValue::Str(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\\' => write!(f, "\\\\")?,
                        '\'' => write!(f, "\\'")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "'")
            }
            LiteralValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::Str(s.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(s: String) -> Self {
        LiteralValue::Str(s)
    }
}

impl From<i32> for LiteralValue {
    fn from(i: i32) -> Self {
        LiteralValue::Int(i64::from(i))
    }
}

impl From<i64> for LiteralValue {
    fn from(i: i64) -> Self {
        LiteralValue::Int(i)
    }
}

impl From<f64> for LiteralValue {
    fn from(x: f64) -> Self {
        LiteralValue::Float(x)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Bool(b)
    }
}

impl<T: Into<LiteralValue>> From<Vec<T>> for LiteralValue {
    fn from(items: Vec<T>) -> Self {
        LiteralValue::List(items.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// OptionValue — value of one plugin option
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Scalar(LiteralValue),
    List(Vec<LiteralValue>),
    Nested(IndexMap<String, OptionValue>),
}

impl OptionValue {
    /// Lift a collapsed literal into an option: lists stay lists, everything
    /// else is a scalar.
    pub fn from_literal(value: LiteralValue) -> Self {
        match value {
            LiteralValue::List(items) => OptionValue::List(items),
            other => OptionValue::Scalar(other),
        }
    }

    pub fn as_scalar(&self) -> Option<&LiteralValue> {
        match self {
            OptionValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[LiteralValue]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&IndexMap<String, OptionValue>> {
        match self {
            OptionValue::Nested(map) => Some(map),
            _ => None,
        }
    }
}

impl From<LiteralValue> for OptionValue {
    fn from(value: LiteralValue) -> Self {
        OptionValue::from_literal(value)
    }
}

macro_rules! option_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for OptionValue {
                fn from(value: $ty) -> Self {
                    OptionValue::Scalar(LiteralValue::from(value))
                }
            }
        )*
    };
}

option_from_scalar!(&str, String, i32, i64, f64, bool);

impl<T: Into<LiteralValue>> From<Vec<T>> for OptionValue {
    fn from(items: Vec<T>) -> Self {
        OptionValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, OptionValue>> for OptionValue {
    fn from(map: IndexMap<String, OptionValue>) -> Self {
        OptionValue::Nested(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_parse_error() {
        let err = SettingsError::ParseError {
            line: 10,
            col: 5,
            message: "unexpected token".into(),
            source_snippet: Some("<Settings".into()),
        };
        assert_eq!(
            err.to_string(),
            "XML parse error at line 10, col 5: unexpected token"
        );
    }

    #[test]
    fn error_display_malformed_literal() {
        let err = SettingsError::MalformedLiteral {
            literal: "[1,2".into(),
            message: "expected ']'".into(),
        };
        assert_eq!(err.to_string(), "Malformed literal '[1,2': expected ']'");
    }

    #[test]
    fn error_display_unknown_tag_lists_valid_tags() {
        let err = SettingsError::UnknownTag {
            tag: "Widget".into(),
            parent: "pipeline".into(),
            valid_tags: vec!["plugin".into(), "loop".into()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid XML tag 'Widget' in 'pipeline'; valid tags are: plugin, loop"
        );
    }

    #[test]
    fn error_display_missing_attribute() {
        let err = SettingsError::MissingAttribute {
            tag: "loop".into(),
            attribute: "condition".into(),
        };
        assert_eq!(
            err.to_string(),
            "Element 'loop' is missing required attribute 'condition'"
        );
    }

    #[test]
    fn error_display_lookup_errors() {
        let err = SettingsError::AmbiguousName {
            name: "norm1".into(),
            count: 2,
        };
        assert_eq!(err.to_string(), "More than one element (2) is named 'norm1'");

        let err = SettingsError::NotFound { name: "ghost".into() };
        assert_eq!(err.to_string(), "No element exists with name 'ghost'");
    }

    #[test]
    fn error_display_unresolved_reference() {
        let err = SettingsError::UnresolvedReference {
            name: "ghost".into(),
            referenced_by: Some("norm1".into()),
        };
        assert_eq!(
            err.to_string(),
            "Unresolved reference to 'ghost' (declared by 'norm1')"
        );

        let err = SettingsError::UnresolvedReference {
            name: "ghost".into(),
            referenced_by: None,
        };
        assert_eq!(err.to_string(), "Unresolved reference to 'ghost'");
    }

    // --- is_fatal / is_lookup_error ---

    #[test]
    fn unknown_tag_is_not_fatal() {
        let err = SettingsError::UnknownTag {
            tag: "x".into(),
            parent: "y".into(),
            valid_tags: vec![],
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_attribute_is_fatal() {
        let err = SettingsError::MissingAttribute {
            tag: "Modelling".into(),
            attribute: "name".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_lookup_error());
    }

    #[test]
    fn ambiguous_name_is_fatal_lookup_error() {
        let err = SettingsError::AmbiguousName {
            name: "a".into(),
            count: 3,
        };
        assert!(err.is_fatal());
        assert!(err.is_lookup_error());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SettingsError = io_err.into();
        assert!(matches!(err, SettingsError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    // --- LiteralValue ---

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SettingsError = json_err.into();
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn invalid_value_names_the_value() {
        let err = SettingsError::InvalidValue {
            value: "relu(x)".into(),
            message: "expected literal value".into(),
        };
        assert_eq!(
            err.to_string(),
            "Value 'relu(x)' cannot be written as literal text: expected literal value"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn literal_display_uses_literal_syntax() {
        let value = LiteralValue::List(vec![
            LiteralValue::Int(1),
            LiteralValue::Float(2.5),
            LiteralValue::Str("it's".into()),
            LiteralValue::Bool(true),
            LiteralValue::None,
            LiteralValue::List(vec![]),
        ]);
        assert_eq!(value.to_string(), r"[1, 2.5, 'it\'s', True, None, []]");
    }

    #[test]
    fn whole_floats_keep_their_fraction() {
        assert_eq!(LiteralValue::Float(3.0).to_string(), "3.0");
    }

    #[test]
    fn text_line_leaves_plain_strings_unquoted() {
        assert_eq!(LiteralValue::from("l2").to_text_line(), "l2");
        assert_eq!(LiteralValue::from("a[0]").to_text_line(), "'a[0]'");
        assert_eq!(LiteralValue::from(vec![1, 2, 3]).to_text_line(), "[1, 2, 3]");
    }

    #[test]
    fn literal_serializes_untagged() {
        let value = LiteralValue::from(vec![
            LiteralValue::Int(1),
            LiteralValue::from("a"),
            LiteralValue::None,
        ]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"[1,"a",null]"#);
    }

    #[test]
    fn literal_accessors() {
        assert_eq!(LiteralValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(LiteralValue::from("x").as_str(), Some("x"));
        assert!(LiteralValue::Bool(false).as_list().is_none());
    }

    // --- OptionValue ---

    #[test]
    fn option_from_literal_lifts_lists() {
        let opt = OptionValue::from_literal(LiteralValue::from(vec!["a", "b"]));
        assert_eq!(opt.as_list().map(<[LiteralValue]>::len), Some(2));

        let opt = OptionValue::from("l2");
        assert_eq!(opt.as_scalar(), Some(&LiteralValue::from("l2")));
    }

    #[test]
    fn nested_option_serializes_as_object() {
        let mut inner = IndexMap::new();
        inner.insert("test".to_string(), OptionValue::from(4));
        let opt = OptionValue::Nested(inner);
        assert_eq!(serde_json::to_string(&opt).unwrap(), r#"{"test":4}"#);
        assert!(opt.as_nested().is_some());
    }
}
