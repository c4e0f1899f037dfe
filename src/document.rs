//! Document Assembler - envelopes for the two card shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::schema::{Document, SchemaDefinition};
use crate::schemas;
use crate::{TOOL_NAME, TOOL_VERSION};

pub const SPEC_V2: &str = "chara_card_v2";
pub const SPEC_VERSION_V2: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub version: String,
}

/// Producer metadata attached to every card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Unix timestamp in milliseconds.
    pub modified: i64,
    pub tool: Tool,
}

impl Metadata {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(modified: DateTime<Utc>) -> Self {
        Self {
            modified: modified.timestamp_millis(),
            tool: Tool {
                name: TOOL_NAME.to_string(),
                version: TOOL_VERSION.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardV2 {
    pub spec: String,
    pub spec_version: String,
    pub data: Document,
    pub metadata: Metadata,
}

impl CardV2 {
    pub fn new(data: Document) -> Self {
        Self {
            spec: SPEC_V2.to_string(),
            spec_version: SPEC_VERSION_V2.to_string(),
            data,
            metadata: Metadata::now(),
        }
    }
}

/// Legacy card: fields at the top level, metadata last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardV1 {
    #[serde(flatten)]
    pub data: Document,
    pub metadata: Metadata,
}

impl CardV1 {
    pub fn new(data: Document) -> Self {
        Self {
            data,
            metadata: Metadata::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardVersion {
    V1,
    #[default]
    V2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Card {
    V2(CardV2),
    V1(CardV1),
}

impl Card {
    pub fn version(&self) -> CardVersion {
        match self {
            Card::V1(_) => CardVersion::V1,
            Card::V2(_) => CardVersion::V2,
        }
    }

    pub fn data(&self) -> &Document {
        match self {
            Card::V1(card) => &card.data,
            Card::V2(card) => &card.data,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Card::V1(card) => &card.metadata,
            Card::V2(card) => &card.metadata,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parse `text` against `schema` and hand the mapped fields to `finalize`.
pub fn build_document<T>(
    schema: &SchemaDefinition,
    text: &str,
    diag: &mut Diagnostics,
    finalize: impl FnOnce(Document) -> T,
) -> Result<T> {
    let document = schema.parse(text, vec![], diag)?;
    Ok(finalize(document))
}

pub fn parse_card_v2(text: &str, diag: &mut Diagnostics) -> Result<CardV2> {
    build_document(&schemas::card_v2(), text, diag, CardV2::new)
}

pub fn parse_card_v1(text: &str, diag: &mut Diagnostics) -> Result<CardV1> {
    build_document(&schemas::card_v1(), text, diag, CardV1::new)
}

pub fn parse_card(text: &str, version: CardVersion, diag: &mut Diagnostics) -> Result<Card> {
    match version {
        CardVersion::V1 => parse_card_v1(text, diag).map(Card::V1),
        CardVersion::V2 => parse_card_v2(text, diag).map(Card::V2),
    }
}

/// The minified description alone. Diagnostics are not collected.
pub fn parse_description(text: &str) -> Result<String> {
    let mut diag = Diagnostics::silent();
    build_document(&schemas::formatted(), text, &mut diag, |mut doc| {
        match doc.remove("description") {
            Some(serde_json::Value::String(description)) => description,
            _ => String::new(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_v2_envelope_shape() {
        let mut diag = Diagnostics::new();
        let mut card = parse_card_v2("@name X\n@tags a", &mut diag).unwrap();
        card.metadata = Metadata::at(fixed_time());

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["spec"], json!("chara_card_v2"));
        assert_eq!(value["spec_version"], json!("2.0"));
        assert_eq!(value["data"]["name"], json!("X"));
        assert_eq!(value["data"]["tags"], json!(["a"]));
        assert_eq!(
            value["metadata"],
            json!({"modified": 1704164645000i64, "tool": {"name": ".card", "version": TOOL_VERSION}})
        );

        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["spec", "spec_version", "data", "metadata"]);
    }

    #[test]
    fn test_v1_is_flat_with_metadata_last() {
        let mut diag = Diagnostics::new();
        let card = parse_card("@name X", CardVersion::V1, &mut diag).unwrap();
        let value = serde_json::to_value(&card).unwrap();

        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["name", "description", "personality", "scenario", "first_mes", "mes_example", "metadata"]
        );
        assert_eq!(card.version(), CardVersion::V1);
    }

    #[test]
    fn test_card_deserializes_both_shapes() {
        let mut diag = Diagnostics::new();
        for version in [CardVersion::V1, CardVersion::V2] {
            let card = parse_card("@name X", version, &mut diag).unwrap();
            let back: Card = serde_json::from_str(&card.to_json_pretty().unwrap()).unwrap();
            assert_eq!(back, card);
            assert_eq!(back.data()["name"], json!("X"));
            assert_eq!(back.metadata().tool.name, TOOL_NAME);
        }
    }

    #[test]
    fn test_description_only_is_silent() {
        let text = "Unnamed\n@description Line one\nline two\n@bogus x";
        assert_eq!(parse_description(text).unwrap(), "Line one line two");
    }
}
