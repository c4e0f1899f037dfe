//! Line Parser - CDL text to an ordered raw record.
//!
//! A line starting with the key marker opens a key, every other line
//! continues the key opened last. A key ending in `+` appends a new
//! element to a list instead. Lines starting with `#` are comments, and
//! lines starting with the constant marker (when the syntax has one)
//! declare constants that are substituted once the whole text is read.

use crate::constants::ConstantTable;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Marker characters for one family of schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syntax {
    pub key_mark: char,
    pub const_mark: Option<char>,
    /// Key that receives text appearing before the first key line.
    pub default_key: &'static str,
}

impl Syntax {
    /// Cards: `@key value`, `$const value`.
    pub const CARD: Syntax = Syntax {
        key_mark: '@',
        const_mark: Some('$'),
        default_key: "name",
    };

    /// Lore-book and lore-book entries: `|key value`, no constants.
    pub const LORE: Syntax = Syntax {
        key_mark: '|',
        const_mark: None,
        default_key: "name",
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    List(Vec<String>),
}

impl RawValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            RawValue::List(_) => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<Vec<String>> for RawValue {
    fn from(items: Vec<String>) -> Self {
        RawValue::List(items)
    }
}

/// Insertion-ordered key/value mapping produced by [`parse`].
///
/// The schema mapper drains it with [`RawRecord::take`]; whatever is left
/// afterwards is reported as unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    entries: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut RawValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, keeping its position if it already exists.
    /// Returns the replaced value.
    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) -> Option<RawValue> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove and return the value under `key`.
    pub fn take(&mut self, key: &str) -> Option<RawValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut RawValue)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key currently receiving continuation lines.
enum Active {
    Text(String),
    ListItem(String),
}

/// Parse CDL text into a [`RawRecord`], substituting constants at the end.
pub fn parse(text: &str, syntax: &Syntax, diag: &mut Diagnostics) -> RawRecord {
    let mut record = RawRecord::new();
    let mut constants = ConstantTable::new();
    let mut active: Option<Active> = None;

    for raw_line in text.split('\n') {
        let line = format!("{}\n", raw_line.trim());

        if line.starts_with('#') {
            continue;
        }

        if let Some(mark) = syntax.const_mark {
            if let Some(declaration) = line.strip_prefix(mark) {
                constants.declare(declaration, diag);
                continue;
            }
        }

        let value = match line.strip_prefix(syntax.key_mark) {
            Some(rest) => {
                let (token, value) = rest.split_once(' ').unwrap_or((rest, ""));
                let token = token.trim();

                match open_key(&mut record, token, diag) {
                    Some(key) => active = Some(key),
                    None => continue,
                }
                value
            }
            None => line.as_str(),
        };

        if active.is_none() {
            if record.contains_key(syntax.default_key) || value.trim().is_empty() {
                continue;
            }
            record.insert(syntax.default_key, RawValue::Text(String::new()));
            active = Some(Active::Text(syntax.default_key.to_string()));
        }

        if let Some(target) = &active {
            append(&mut record, target, value);
        }
    }

    constants.apply(&mut record);
    record
}

/// Handle a key token from a key line. Returns `None` when the line is dropped.
fn open_key(record: &mut RawRecord, token: &str, diag: &mut Diagnostics) -> Option<Active> {
    if let Some(base) = token.strip_suffix('+') {
        // A bare `+` names no list.
        if base.is_empty() {
            diag.warn(DiagnosticKind::EmptyKey, None, "Empty data key, ignoring");
            return None;
        }
        match record.get_mut(base) {
            Some(RawValue::List(items)) => items.push(String::new()),
            Some(RawValue::Text(_)) => {
                diag.warn(
                    DiagnosticKind::DuplicateKey,
                    Some(base),
                    format!("Duplicate data key: {}, overwriting", base),
                );
                record.take(base);
                record.insert(base, RawValue::List(vec![String::new()]));
            }
            None => {
                record.insert(base, RawValue::List(vec![String::new()]));
            }
        }
        return Some(Active::ListItem(base.to_string()));
    }

    if token.is_empty() {
        diag.warn(DiagnosticKind::EmptyKey, None, "Empty data key, ignoring");
        return None;
    }
    if record.contains_key(token) {
        diag.warn(
            DiagnosticKind::DuplicateKey,
            Some(token),
            format!("Duplicate data key: {}, overwriting", token),
        );
    }
    record.insert(token, RawValue::Text(String::new()));
    Some(Active::Text(token.to_string()))
}

fn append(record: &mut RawRecord, target: &Active, value: &str) {
    match target {
        Active::Text(key) => {
            if let Some(RawValue::Text(s)) = record.get_mut(key) {
                s.push_str(value);
            }
        }
        Active::ListItem(key) => {
            if let Some(RawValue::List(items)) = record.get_mut(key) {
                if let Some(last) = items.last_mut() {
                    last.push_str(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> (RawRecord, Diagnostics) {
        let mut diag = Diagnostics::new();
        let record = parse(text, &Syntax::CARD, &mut diag);
        (record, diag)
    }

    fn text(record: &RawRecord, key: &str) -> String {
        record.get(key).and_then(RawValue::as_text).unwrap().to_string()
    }

    #[test]
    fn test_keys_and_continuations() {
        let (record, diag) = card("@name Alice\n@description First line\n  second line\n\nthird");
        assert_eq!(text(&record, "name"), "Alice\n");
        assert_eq!(
            text(&record, "description"),
            "First line\nsecond line\n\nthird\n"
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn test_leading_text_goes_to_default_key() {
        let (record, _) = card("\n\nBob\n@scenario A tavern");
        assert_eq!(text(&record, "name"), "Bob\n");
        assert_eq!(text(&record, "scenario"), "A tavern\n");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["name", "scenario"]);
    }

    #[test]
    fn test_comments_are_dropped_everywhere() {
        let (record, _) = card("# header\n@name Eve\n# inline\nmore");
        assert_eq!(text(&record, "name"), "Eve\nmore\n");
    }

    #[test]
    fn test_key_without_value_starts_empty() {
        let (record, _) = card("@first_mes\nHello there");
        assert_eq!(text(&record, "first_mes"), "Hello there\n");
    }

    #[test]
    fn test_list_accumulation_preserves_order_and_count() {
        let (record, _) = card("@alternate_greetings+ one\n@alternate_greetings+\ntwo\n@alternate_greetings+ three");
        assert_eq!(
            record.get("alternate_greetings"),
            Some(&RawValue::List(vec![
                "one\n".to_string(),
                "two\n".to_string(),
                "three\n".to_string(),
            ]))
        );
    }

    #[test]
    fn test_list_key_replaces_text_with_warning() {
        let (record, diag) = card("@tags a, b\n@tags+ c");
        assert_eq!(record.get("tags"), Some(&RawValue::List(vec!["c\n".to_string()])));
        assert_eq!(diag.count(DiagnosticKind::DuplicateKey), 1);
    }

    #[test]
    fn test_duplicate_key_resets_value() {
        let (record, diag) = card("@name One\n@scenario x\n@name Two");
        assert_eq!(text(&record, "name"), "Two\n");
        assert_eq!(record.len(), 2);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["name", "scenario"]);
        assert_eq!(diag.count(DiagnosticKind::DuplicateKey), 1);
    }

    #[test]
    fn test_empty_key_keeps_previous_key_active() {
        let (record, diag) = card("@name Ann\n@ stray\ntail");
        assert_eq!(text(&record, "name"), "Ann\ntail\n");
        assert_eq!(diag.count(DiagnosticKind::EmptyKey), 1);
    }

    #[test]
    fn test_bare_list_marker_is_an_empty_key() {
        let (record, diag) = card("@name Ann
@+ stray
tail");
        assert_eq!(text(&record, "name"), "Ann
tail
");
        assert_eq!(record.len(), 1);
        assert_eq!(diag.count(DiagnosticKind::EmptyKey), 1);
    }

    #[test]
    fn test_constants_substitute_regardless_of_order() {
        let before = card("$hero Arthur\n@name {{$hero}}").0;
        let after = card("@name {{$HERO}}\n$hero Arthur").0;
        assert_eq!(text(&before, "name"), "Arthur\n");
        assert_eq!(text(&before, "name"), text(&after, "name"));
    }

    #[test]
    fn test_constants_skip_list_values() {
        let (record, _) = card("$x y\n@items+ {{$x}}");
        assert_eq!(record.get("items"), Some(&RawValue::List(vec!["{{$x}}\n".to_string()])));
    }

    #[test]
    fn test_lore_syntax_has_no_constants() {
        let mut diag = Diagnostics::new();
        let record = parse("|keys dragon\n$not a constant", &Syntax::LORE, &mut diag);
        assert_eq!(text(&record, "keys"), "dragon\n$not a constant\n");
        assert!(diag.is_empty());
    }
}
