//! dotcard - Card Definition Language compiler
//!
//! Turns `.card` text into character card documents:
//! 1. `parser` reads CDL lines into a raw record (constants substituted)
//! 2. `schema` maps the raw record onto a declared field list
//! 3. `document` wraps the fields in the card envelope
//! 4. `carrier` stores the card inside a PNG

pub mod batch;
pub mod carrier;
pub mod constants;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod minify;
pub mod parser;
pub mod schema;
pub mod schemas;

pub use carrier::{embed_card, extract_card, read_card_image, write_card_image};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use document::{
    build_document, parse_card, parse_card_v1, parse_card_v2, parse_description, Card, CardV1,
    CardV2, CardVersion, Metadata,
};
pub use error::CardError;
pub use minify::{deep_strip, minify_content};
pub use parser::{parse, RawRecord, RawValue, Syntax};
pub use schema::{Document, FieldSpec, FieldType, SchemaDefinition};

pub const TOOL_NAME: &str = ".card";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
