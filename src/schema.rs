//! Schema Mapper
//!
//! A [`SchemaDefinition`] is an ordered list of [`FieldSpec`]s. Mapping a
//! raw record runs every field's extractor in declaration order, each one
//! draining the keys it consumes. Leftover keys are reported as unknown,
//! then every value is checked against its declared type. Mismatches are
//! warnings only; the value is kept.

use std::fmt;

use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{CardError, Result};
use crate::minify::{deep_strip, minify_content};
use crate::parser::{self, RawRecord, RawValue, Syntax};

/// A mapped document: field name to value, in schema order.
pub type Document = Map<String, Value>;

/// Pulls one field's value out of a raw record.
pub type Extractor = fn(&FieldSpec, &mut RawRecord, &mut Diagnostics) -> Result<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    OptStr,
    Bool,
    OptBool,
    Int,
    OptInt,
    Tags,
    OptTags,
    Json,
    Document,
    OptDocument,
    DocumentList,
}

impl FieldType {
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            FieldType::OptStr
                | FieldType::OptBool
                | FieldType::OptInt
                | FieldType::OptTags
                | FieldType::OptDocument
        )
    }

    /// Value used when the key is absent from the raw record.
    pub fn default_value(self) -> Value {
        match self {
            FieldType::Str => Value::String(String::new()),
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::from(0),
            FieldType::Tags | FieldType::DocumentList => Value::Array(vec![]),
            FieldType::Json | FieldType::Document => Value::Object(Map::new()),
            _ => Value::Null,
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        if value.is_null() {
            return self.is_optional();
        }
        match self {
            FieldType::Str | FieldType::OptStr => value.is_string(),
            FieldType::Bool | FieldType::OptBool => value.is_boolean(),
            FieldType::Int | FieldType::OptInt => value.is_i64(),
            FieldType::Tags | FieldType::OptTags => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string)),
            FieldType::Json | FieldType::Document | FieldType::OptDocument => value.is_object(),
            FieldType::DocumentList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_object)),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Str => "string",
            FieldType::OptStr => "optional string",
            FieldType::Bool => "boolean",
            FieldType::OptBool => "optional boolean",
            FieldType::Int => "integer",
            FieldType::OptInt => "optional integer",
            FieldType::Tags => "list of strings",
            FieldType::OptTags => "optional list of strings",
            FieldType::Json => "object",
            FieldType::Document => "document",
            FieldType::OptDocument => "optional document",
            FieldType::DocumentList => "list of documents",
        };
        f.write_str(name)
    }
}

/// Short name of a value's JSON shape, for diagnostics.
pub fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[derive(Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: Value,
    pub required: bool,
    pub non_empty: bool,
    pub minify: bool,
    extract: Extractor,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("non_empty", &self.non_empty)
            .field("minify", &self.minify)
            .finish_non_exhaustive()
    }
}

impl FieldSpec {
    pub fn custom(name: &'static str, ty: FieldType, extract: Extractor) -> Self {
        Self {
            name,
            ty,
            default: ty.default_value(),
            required: false,
            non_empty: false,
            minify: false,
            extract,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::custom(name, FieldType::Str, text_field)
    }

    pub fn optional_text(name: &'static str) -> Self {
        Self::custom(name, FieldType::OptStr, text_field)
    }

    pub fn boolean(name: &'static str, default: bool) -> Self {
        Self::custom(name, FieldType::Bool, bool_field).with_default(default)
    }

    pub fn optional_boolean(name: &'static str) -> Self {
        Self::custom(name, FieldType::OptBool, bool_field)
    }

    pub fn integer(name: &'static str, default: i64) -> Self {
        Self::custom(name, FieldType::Int, int_field).with_default(default)
    }

    pub fn optional_integer(name: &'static str) -> Self {
        Self::custom(name, FieldType::OptInt, int_field)
    }

    pub fn tags(name: &'static str) -> Self {
        Self::custom(name, FieldType::Tags, tags_field)
    }

    pub fn optional_tags(name: &'static str) -> Self {
        Self::custom(name, FieldType::OptTags, tags_field)
    }

    pub fn json(name: &'static str) -> Self {
        Self::custom(name, FieldType::Json, json_field)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// The key must be present and non-blank.
    pub fn required(mut self) -> Self {
        self.required = true;
        self.non_empty = true;
        self.default = Value::Null;
        self
    }

    /// Pass the text through the content minifier before storing it.
    pub fn minified(mut self) -> Self {
        self.minify = true;
        self
    }

    pub fn extract(&self, raw: &mut RawRecord, diag: &mut Diagnostics) -> Result<Value> {
        (self.extract)(self, raw, diag)
    }
}

#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub name: &'static str,
    pub syntax: Syntax,
    pub fields: Vec<FieldSpec>,
}

impl SchemaDefinition {
    pub fn new(name: &'static str, syntax: Syntax, fields: Vec<FieldSpec>) -> Self {
        Self { name, syntax, fields }
    }

    /// Parse `text` with this schema's syntax, merge `overrides` on top of
    /// the parsed keys and map the result.
    pub fn parse(
        &self,
        text: &str,
        overrides: Vec<(&str, RawValue)>,
        diag: &mut Diagnostics,
    ) -> Result<Document> {
        let mut raw = parser::parse(text, &self.syntax, diag);

        for (key, value) in overrides {
            if raw.contains_key(key) {
                diag.warn(
                    DiagnosticKind::DuplicateKey,
                    Some(key),
                    format!("Duplicate data key: {}, overwriting", key),
                );
            }
            raw.insert(key, value);
        }

        self.map(&mut raw, diag)
    }

    /// Run every extractor against `raw`, draining it.
    pub fn map(&self, raw: &mut RawRecord, diag: &mut Diagnostics) -> Result<Document> {
        let mut extracted = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let value = spec.extract(raw, diag)?;
            extracted.push((spec, value));
        }

        if !raw.is_empty() {
            let remaining: Vec<&str> = raw.keys().collect();
            diag.warn(
                DiagnosticKind::UnknownEntries,
                None,
                format!("Unknown entries will be ignored: {}", remaining.join(", ")),
            );
        }

        let mut document = Document::new();
        for (spec, value) in extracted {
            if !spec.ty.accepts(&value) {
                diag.push(Diagnostic::type_mismatch(
                    spec.name,
                    spec.ty.to_string(),
                    shape_of(&value),
                ));
            }
            if !value.is_null() {
                document.insert(spec.name.to_string(), value);
            }
        }

        tracing::trace!(schema = self.name, fields = document.len(), "mapped document");
        Ok(document)
    }
}

// --- Extraction primitives ---

/// Remove and return `key`. A missing required key is fatal.
pub fn extract_raw(raw: &mut RawRecord, key: &str, required: bool) -> Result<Option<RawValue>> {
    match raw.take(key) {
        Some(value) => Ok(Some(value)),
        None if required => Err(CardError::MissingRequired(key.to_string())),
        None => Ok(None),
    }
}

/// Extract a single text value, deep-stripped when `stripped` is set.
pub fn extract_text(
    raw: &mut RawRecord,
    key: &str,
    stripped: bool,
    required: bool,
    non_empty: bool,
) -> Result<Option<String>> {
    let text = match extract_raw(raw, key, required)? {
        None => return Ok(None),
        Some(RawValue::Text(text)) => text,
        Some(RawValue::List(_)) => return Err(CardError::ExpectedText(key.to_string())),
    };

    let text = if stripped { deep_strip(&text) } else { text };
    if non_empty && text.is_empty() {
        return Err(CardError::EmptyField(key.to_string()));
    }
    Ok(Some(text))
}

/// Extract a tag list. Text is split on commas and line breaks; list
/// elements are taken as they are. Tags are trimmed, blank ones dropped
/// and duplicates removed keeping the first occurrence.
pub fn extract_tags(raw: &mut RawRecord, key: &str, required: bool) -> Result<Option<Vec<String>>> {
    let items: Vec<String> = match extract_raw(raw, key, required)? {
        None => return Ok(None),
        Some(RawValue::Text(text)) => text.split(&[',', '\n'][..]).map(str::to_string).collect(),
        Some(RawValue::List(items)) => items,
    };

    let mut tags: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let tag = item.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    Ok(Some(tags))
}

/// Extract a scalar through `coerce`. Only a missing key takes the default;
/// text that fails to coerce (blank included) is kept as a string for the
/// type check to flag.
pub fn extract_scalar(
    raw: &mut RawRecord,
    key: &str,
    required: bool,
    coerce: impl FnOnce(&str) -> Option<Value>,
) -> Result<Option<Value>> {
    let text = match extract_raw(raw, key, required)? {
        None => return Ok(None),
        Some(RawValue::Text(text)) => text,
        Some(RawValue::List(_)) => return Err(CardError::ExpectedText(key.to_string())),
    };

    let text = text.trim();
    Ok(Some(
        coerce(text).unwrap_or_else(|| Value::String(text.to_string())),
    ))
}

pub fn parse_bool(text: &str) -> Option<Value> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
        "false" | "no" | "off" | "0" | "" => Some(Value::Bool(false)),
        _ => None,
    }
}

pub fn parse_int(text: &str) -> Option<Value> {
    text.parse::<i64>().ok().map(Value::from)
}

pub fn parse_json(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

// --- Stock extractors ---

pub(crate) fn text_field(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    let text = extract_text(raw, spec.name, true, spec.required, spec.non_empty)?;
    Ok(match text {
        Some(text) if spec.minify => Value::String(minify_content(&text)),
        Some(text) => Value::String(text),
        None => spec.default.clone(),
    })
}

fn tags_field(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    Ok(extract_tags(raw, spec.name, spec.required)?
        .map(|tags| Value::Array(tags.into_iter().map(Value::String).collect()))
        .unwrap_or_else(|| spec.default.clone()))
}

fn bool_field(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    Ok(extract_scalar(raw, spec.name, spec.required, parse_bool)?
        .unwrap_or_else(|| spec.default.clone()))
}

fn int_field(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    Ok(extract_scalar(raw, spec.name, spec.required, parse_int)?
        .unwrap_or_else(|| spec.default.clone()))
}

fn json_field(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    Ok(extract_scalar(raw, spec.name, spec.required, parse_json)?
        .unwrap_or_else(|| spec.default.clone()))
}
