//! Named constants and `{{$name}}` substitution.

use regex::{NoExpand, RegexBuilder};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::{RawRecord, RawValue};

/// Constants declared in one source text, in declaration order.
///
/// Names are stored lowercased; redeclaring a name keeps its original
/// position and replaces the text.
#[derive(Debug, Default, Clone)]
pub struct ConstantTable {
    entries: Vec<(String, String)>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration line with the constant marker already removed.
    ///
    /// The name runs up to the first space; everything after it, trimmed,
    /// is the substitution text.
    pub fn declare(&mut self, declaration: &str, diag: &mut Diagnostics) {
        let (name, text) = match declaration.split_once(' ') {
            Some((name, text)) => (name.trim(), text.trim()),
            None => (declaration.trim(), ""),
        };
        let name = name.to_lowercase();

        if name.is_empty() {
            diag.warn(DiagnosticKind::UnnamedConstant, None, "Unnamed constant, ignoring");
            return;
        }
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            diag.warn(
                DiagnosticKind::InvalidConstantName,
                Some(&name),
                format!("Constant name must start with a letter: {}, ignoring", name),
            );
            return;
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            diag.warn(
                DiagnosticKind::InvalidConstantName,
                Some(&name),
                format!("Constant name must be alphanumeric: {}, ignoring", name),
            );
            return;
        }

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => {
                diag.warn(
                    DiagnosticKind::DuplicateConstant,
                    Some(&name),
                    format!("Duplicate constant name: {}, overwriting", name),
                );
                existing.1 = text.to_string();
            }
            None => self.entries.push((name, text.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace `{{$name}}` references (any letter case) in every text value.
    /// List values are left untouched.
    ///
    /// Constants are applied one after another in declaration order, so a
    /// constant's text may itself reference a constant declared later.
    pub fn apply(&self, record: &mut RawRecord) {
        for (name, text) in &self.entries {
            let token = format!("{{{{${}}}}}", name);
            let pattern = match RegexBuilder::new(&regex::escape(&token))
                .case_insensitive(true)
                .build()
            {
                Ok(p) => p,
                // Names are validated to `[a-z][a-z0-9_]*`, the escaped token always compiles.
                Err(_) => continue,
            };

            for (_, value) in record.iter_mut() {
                if let RawValue::Text(s) = value {
                    if pattern.is_match(s) {
                        *s = pattern.replace_all(s, NoExpand(text)).into_owned();
                    }
                }
            }
        }
    }
}
