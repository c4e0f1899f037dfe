//! Diagnostics - recoverable warnings collected during a parse.
//!
//! Every parse call receives a `&mut Diagnostics`. Nothing here stops
//! processing; callers decide how to surface what was collected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnnamedConstant,
    InvalidConstantName,
    DuplicateConstant,
    EmptyKey,
    DuplicateKey,
    UnknownEntries,
    TypeMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(default)]
    pub key: Option<String>,
    pub message: String,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, key: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.map(str::to_owned),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn type_mismatch(key: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        let expected = expected.into();
        Self {
            kind: DiagnosticKind::TypeMismatch,
            key: Some(key.to_string()),
            message: format!("{} does not match {}", key, expected),
            expected: Some(expected),
            actual: Some(actual.into()),
        }
    }
}

/// Collector threaded through the parser and the schema mapper.
#[derive(Debug, Default)]
pub struct Diagnostics {
    silent: bool,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that discards everything pushed to it.
    pub fn silent() -> Self {
        Self {
            silent: true,
            entries: vec![],
        }
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if !self.silent {
            self.entries.push(diagnostic);
        }
    }

    pub fn warn(&mut self, kind: DiagnosticKind, key: Option<&str>, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, key, message));
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Emit every collected diagnostic as a `tracing` warning.
    pub fn report(&self) {
        for d in &self.entries {
            tracing::warn!(kind = ?d.kind, key = d.key.as_deref(), "{}", d.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_sink_drops_everything() {
        let mut diag = Diagnostics::silent();
        diag.warn(DiagnosticKind::EmptyKey, None, "Empty data key, ignoring");
        assert!(diag.is_empty());
        assert!(diag.is_silent());
    }

    #[test]
    fn test_type_mismatch_carries_shapes() {
        let d = Diagnostic::type_mismatch("priority", "optional integer", "string");
        assert_eq!(d.kind, DiagnosticKind::TypeMismatch);
        assert_eq!(d.message, "priority does not match optional integer");
        assert_eq!(d.actual.as_deref(), Some("string"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DiagnosticKind::UnknownEntries).unwrap();
        assert_eq!(json, r#""unknown_entries""#);
    }
}
