//! Document shapes: versioned card, legacy card, lore-book, lore-book
//! entry, and the description-only "formatted" shape.

use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::{CardError, Result};
use crate::minify::deep_strip;
use crate::parser::{RawRecord, RawValue, Syntax};
use crate::schema::{extract_raw, extract_text, text_field, FieldSpec, FieldType, SchemaDefinition};

pub const POSITIONS: [&str; 2] = ["before_char", "after_char"];

/// Fields of a versioned (`chara_card_v2`) card.
pub fn card_v2() -> SchemaDefinition {
    SchemaDefinition::new(
        "card_v2",
        Syntax::CARD,
        vec![
            FieldSpec::text("name").required(),
            FieldSpec::text("description").minified(),
            FieldSpec::text("personality"),
            FieldSpec::text("scenario"),
            FieldSpec::custom("first_mes", FieldType::Str, first_mes),
            FieldSpec::text("mes_example"),
            FieldSpec::text("creator_notes"),
            FieldSpec::text("system_prompt"),
            FieldSpec::text("post_history_instructions"),
            FieldSpec::custom("alternate_greetings", FieldType::Tags, alternate_greetings),
            FieldSpec::tags("tags"),
            FieldSpec::text("creator"),
            FieldSpec::text("character_version"),
            FieldSpec::json("extensions"),
            FieldSpec::custom("character_book", FieldType::OptDocument, character_book_field),
        ],
    )
}

/// Fields of a legacy flat card.
pub fn card_v1() -> SchemaDefinition {
    SchemaDefinition::new(
        "card_v1",
        Syntax::CARD,
        vec![
            FieldSpec::text("name").required(),
            FieldSpec::text("description").minified(),
            FieldSpec::text("personality"),
            FieldSpec::text("scenario"),
            FieldSpec::text("first_mes"),
            FieldSpec::text("mes_example"),
        ],
    )
}

/// Description only, for previewing the minified text.
pub fn formatted() -> SchemaDefinition {
    SchemaDefinition::new(
        "formatted",
        Syntax::CARD,
        vec![FieldSpec::text("description").minified()],
    )
}

pub fn character_book() -> SchemaDefinition {
    SchemaDefinition::new(
        "character_book",
        Syntax::LORE,
        vec![
            FieldSpec::optional_text("name"),
            FieldSpec::optional_text("description"),
            FieldSpec::optional_integer("scan_depth"),
            FieldSpec::optional_integer("token_budget"),
            FieldSpec::optional_boolean("recursive_scanning"),
            FieldSpec::custom("entries", FieldType::DocumentList, book_entries),
            FieldSpec::json("extensions"),
        ],
    )
}

pub fn character_book_entry() -> SchemaDefinition {
    SchemaDefinition::new(
        "character_book_entry",
        Syntax::LORE,
        vec![
            FieldSpec::tags("keys"),
            FieldSpec::text("content").minified(),
            FieldSpec::boolean("enabled", true),
            FieldSpec::integer("insertion_order", 0),
            FieldSpec::optional_boolean("case_sensitive"),
            FieldSpec::optional_text("name"),
            FieldSpec::optional_integer("priority"),
            FieldSpec::optional_integer("id"),
            FieldSpec::optional_text("comment"),
            FieldSpec::optional_boolean("selective"),
            FieldSpec::optional_tags("secondary_keys"),
            FieldSpec::optional_boolean("constant"),
            FieldSpec::custom("position", FieldType::OptStr, position),
            FieldSpec::json("extensions"),
        ],
    )
}

/// Falls back to the first alternate greeting, moving it out of that list.
fn first_mes(spec: &FieldSpec, raw: &mut RawRecord, diag: &mut Diagnostics) -> Result<Value> {
    if !raw.contains_key(spec.name) {
        let promoted = match raw.get_mut("alternate_greetings") {
            Some(RawValue::List(greetings)) if !greetings.is_empty() => Some(greetings.remove(0)),
            _ => None,
        };
        if let Some(greeting) = promoted {
            raw.insert(spec.name, RawValue::Text(greeting));
        }
    }
    text_field(spec, raw, diag)
}

fn alternate_greetings(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    let greetings = match extract_raw(raw, spec.name, false)? {
        None => vec![],
        Some(RawValue::List(items)) => items,
        Some(RawValue::Text(_)) => return Err(CardError::NotAList(spec.name.to_string())),
    };

    Ok(Value::Array(
        greetings
            .iter()
            .map(|g| deep_strip(g))
            .filter(|g| !g.is_empty())
            .map(Value::String)
            .collect(),
    ))
}

fn position(spec: &FieldSpec, raw: &mut RawRecord, _: &mut Diagnostics) -> Result<Value> {
    let Some(value) = extract_text(raw, spec.name, true, false, false)? else {
        return Ok(Value::Null);
    };

    let value = value.to_lowercase();
    if !POSITIONS.contains(&value.as_str()) {
        return Err(CardError::InvalidChoice {
            field: spec.name.to_string(),
            allowed: POSITIONS.to_vec(),
        });
    }
    Ok(Value::String(value))
}

/// Each list element is a full lore-book entry in `|key value` syntax.
fn book_entries(spec: &FieldSpec, raw: &mut RawRecord, diag: &mut Diagnostics) -> Result<Value> {
    let items = match extract_raw(raw, spec.name, false)? {
        None => vec![],
        Some(RawValue::List(items)) => items,
        Some(RawValue::Text(_)) => return Err(CardError::NotAList(spec.name.to_string())),
    };

    let schema = character_book_entry();
    let entries = items
        .iter()
        .map(|text| schema.parse(text, vec![], diag).map(Value::Object))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(entries))
}

/// Builds the lore-book from the card's `character_book` text plus the
/// card's own `entries` list. A book with nothing in it is omitted.
fn character_book_field(spec: &FieldSpec, raw: &mut RawRecord, diag: &mut Diagnostics) -> Result<Value> {
    let text = match extract_raw(raw, spec.name, false)? {
        None => String::new(),
        Some(RawValue::Text(text)) => text,
        Some(RawValue::List(_)) => return Err(CardError::ExpectedText(spec.name.to_string())),
    };
    let entries = extract_raw(raw, "entries", false)?.unwrap_or(RawValue::List(vec![]));

    let book = character_book().parse(&text, vec![("entries", entries)], diag)?;

    let is_blank = book.len() == 2
        && book.get("entries") == Some(&Value::Array(vec![]))
        && book.get("extensions").map_or(false, |e| e.as_object().map_or(false, |m| m.is_empty()));

    Ok(if is_blank { Value::Null } else { Value::Object(book) })
}
