//! Carrier Image - the card as a PNG `tEXt` chunk.
//!
//! Payload layout: `chara` NUL base64(JSON(card)). The chunk is written
//! after the pixel data, immediately before `IEND`. Decoding and resizing
//! pixels is not done here; the source image is copied chunk by chunk.

use std::fs;
use std::path::Path;

use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CardError, Result};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Keyword of the text chunk holding the card, NUL separator included.
pub const CARD_TAG: &[u8; 6] = b"chara\0";

const TEXT_CHUNK: [u8; 4] = *b"tEXt";
const END_CHUNK: [u8; 4] = *b"IEND";

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// CRC-32 over a chunk's type and data, as stored in the chunk trailer.
pub fn chunk_crc(kind: &[u8; 4], data: &[u8]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for &b in kind.iter().chain(data) {
        c = CRC_TABLE[((c ^ b as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    pub data: &'a [u8],
}

impl Chunk<'_> {
    pub fn kind_str(&self) -> String {
        String::from_utf8_lossy(&self.kind).into_owned()
    }

    pub fn is_card(&self) -> bool {
        self.kind == TEXT_CHUNK && self.data.starts_with(CARD_TAG)
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Split a PNG into its chunks, checking the signature and every CRC.
pub fn chunks(png: &[u8]) -> Result<Vec<Chunk<'_>>> {
    let body = png
        .strip_prefix(&PNG_SIGNATURE[..])
        .ok_or_else(|| CardError::InvalidImage("missing PNG signature".into()))?;

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        if body.len() - pos < 12 {
            return Err(CardError::InvalidImage("truncated chunk header".into()));
        }
        let len = read_u32(body, pos) as usize;
        let kind = [body[pos + 4], body[pos + 5], body[pos + 6], body[pos + 7]];
        let start = pos + 8;
        let end = start
            .checked_add(len)
            .filter(|end| end + 4 <= body.len())
            .ok_or_else(|| CardError::InvalidImage("truncated chunk data".into()))?;

        let chunk = Chunk {
            kind,
            data: &body[start..end],
        };
        if read_u32(body, end) != chunk_crc(&kind, chunk.data) {
            return Err(CardError::InvalidImage(format!(
                "CRC mismatch in {} chunk",
                chunk.kind_str()
            )));
        }

        out.push(chunk);
        pos = end + 4;
        if kind == END_CHUNK {
            break;
        }
    }

    match out.last() {
        Some(last) if last.kind == END_CHUNK => Ok(out),
        _ => Err(CardError::InvalidImage("missing IEND chunk".into())),
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| CardError::InvalidPayload(format!("{} bytes do not fit in one chunk", data.len())))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
    Ok(())
}

/// `chara\0` followed by the base64 of the card's JSON.
pub fn encode_payload<T: Serialize>(card: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(card)?;
    let mut payload = CARD_TAG.to_vec();
    payload.extend_from_slice(
        base64::engine::general_purpose::STANDARD
            .encode(json)
            .as_bytes(),
    );
    Ok(payload)
}

pub fn decode_payload(data: &[u8]) -> Result<Value> {
    let encoded = data
        .strip_prefix(&CARD_TAG[..])
        .ok_or_else(|| CardError::InvalidPayload("missing chara tag".into()))?;
    let json = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CardError::InvalidPayload(e.to_string()))?;
    let json = String::from_utf8(json).map_err(|e| CardError::InvalidPayload(e.to_string()))?;
    Ok(serde_json::from_str(&json)?)
}

/// Copy `png` with the card stored in a fresh `tEXt` chunk. A card
/// embedded earlier is replaced.
pub fn embed_card<T: Serialize>(png: &[u8], card: &T) -> Result<Vec<u8>> {
    let payload = encode_payload(card)?;
    let chunks = chunks(png)?;

    let mut out = Vec::with_capacity(png.len() + payload.len() + 12);
    out.extend_from_slice(&PNG_SIGNATURE);
    for chunk in &chunks {
        if chunk.is_card() {
            tracing::debug!("replacing previously embedded card");
            continue;
        }
        if chunk.kind == END_CHUNK {
            write_chunk(&mut out, &TEXT_CHUNK, &payload)?;
        }
        write_chunk(&mut out, &chunk.kind, chunk.data)?;
    }

    tracing::debug!(payload = payload.len(), total = out.len(), "embedded card chunk");
    Ok(out)
}

/// Recover the card JSON embedded by [`embed_card`].
pub fn extract_card(png: &[u8]) -> Result<Value> {
    let chunks = chunks(png)?;
    let chunk = chunks
        .iter()
        .find(|c| c.is_card())
        .ok_or(CardError::MissingCard)?;
    decode_payload(chunk.data)
}

pub fn write_card_image<T: Serialize>(image: &Path, output: &Path, card: &T) -> Result<()> {
    let png = fs::read(image)?;
    let embedded = embed_card(&png, card)?;
    fs::write(output, embedded)?;
    tracing::debug!(image = %image.display(), output = %output.display(), "wrote card image");
    Ok(())
}

pub fn read_card_image(image: &Path) -> Result<Value> {
    extract_card(&fs::read(image)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal 1x1 transparent PNG.
    const PIXEL_PNG: [u8; 67] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A,
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
        0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
        0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41,
        0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
        0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
        0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_crc_matches_png_trailers() {
        assert_eq!(chunk_crc(b"IEND", &[]), 0xAE42_6082);
        assert_eq!(chunks(&PIXEL_PNG).unwrap().len(), 3);
    }

    #[test]
    fn test_card_chunk_sits_before_iend() {
        let png = embed_card(&PIXEL_PNG, &json!({"name": "X"})).unwrap();
        let kinds: Vec<String> = chunks(&png).unwrap().iter().map(Chunk::kind_str).collect();
        assert_eq!(kinds, vec!["IHDR", "IDAT", "tEXt", "IEND"]);
    }

    #[test]
    fn test_payload_layout() {
        let payload = encode_payload(&json!({"a": 1})).unwrap();
        assert_eq!(&payload[..6], b"chara\0");
        assert_eq!(&payload[6..], b"eyJhIjoxfQ==");
    }

    #[test]
    fn test_reembedding_replaces_card() {
        let first = embed_card(&PIXEL_PNG, &json!({"v": 1})).unwrap();
        let second = embed_card(&first, &json!({"v": 2})).unwrap();
        assert_eq!(chunks(&second).unwrap().iter().filter(|c| c.is_card()).count(), 1);
        assert_eq!(extract_card(&second).unwrap(), json!({"v": 2}));
    }

    #[test]
    fn test_rejects_damaged_images() {
        assert!(matches!(chunks(b"not a png"), Err(CardError::InvalidImage(_))));

        let mut corrupt = PIXEL_PNG;
        corrupt[20] ^= 0xFF;
        assert!(matches!(chunks(&corrupt), Err(CardError::InvalidImage(_))));

        assert!(matches!(chunks(&PIXEL_PNG[..40]), Err(CardError::InvalidImage(_))));
    }

    #[test]
    fn test_missing_card() {
        assert!(matches!(extract_card(&PIXEL_PNG), Err(CardError::MissingCard)));
    }
}
