use crate::error::{BrowseError, Result};
use crc32fast::Hasher;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MAGIC_BYTES: [u8; 8] = [65, 77, 82, 84, 82, 69, 69, 0]; // "AMRTREE\0"
pub const VERSION: u32 = 1;

/// `"header_crc32_hex" : "XXXXXXXX"`, capturing the separator so it survives substitution.
static CRC_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""header_crc32_hex"(\s*:\s*)"[^"]*""#).expect("regex"));

// Headers written by other tools are loose about numbers: integers may arrive
// as floats or strings. Anything unreadable decodes to the field's zero value.

fn loose_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.round().max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_f64(v: &Value) -> f64 {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.unwrap_or(f64::NAN)
}

fn loose_array<T>(v: Value, item: impl Fn(&Value) -> T) -> Vec<T> {
    match v {
        Value::Array(items) => items.iter().map(item).collect(),
        _ => Vec::new(),
    }
}

fn de_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    Ok(loose_u64(&Value::deserialize(d)?).unwrap_or(0))
}

fn de_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    Ok(u32::try_from(de_u64(d)?).unwrap_or(u32::MAX))
}

/// Negative parents mean "no parent".
fn de_parent<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    let v = Value::deserialize(d)?;
    if v.as_i64().is_some_and(|i| i < 0) {
        return Ok(None);
    }
    Ok(loose_u64(&v))
}

fn de_dims<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u64>, D::Error> {
    Ok(loose_array(Value::deserialize(d)?, |x| loose_u64(x).unwrap_or(0)))
}

fn de_edges<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f64>, D::Error> {
    Ok(loose_array(Value::deserialize(d)?, loose_f64))
}

/// One grid of the hierarchy as described in the container header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridEntry {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,

    #[serde(default, deserialize_with = "de_parent")]
    pub parent: Option<u64>,

    #[serde(default, deserialize_with = "de_u32")]
    pub level: u32,

    #[serde(default, deserialize_with = "de_edges")]
    pub left_edge: Vec<f64>,

    #[serde(default, deserialize_with = "de_edges")]
    pub right_edge: Vec<f64>,

    #[serde(default, deserialize_with = "de_dims")]
    pub dims: Vec<u64>,

    #[serde(default)]
    pub compression: String,

    #[serde(default, deserialize_with = "de_u64")]
    pub offset: u64,

    #[serde(default, deserialize_with = "de_u64")]
    pub csize: u64,

    #[serde(default, deserialize_with = "de_u64")]
    pub usize: u64,

    #[serde(default, deserialize_with = "de_u32")]
    pub crc32: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub format: String,
    pub magic: String,
    pub version: u32,

    #[serde(default)]
    pub endianness: String,

    #[serde(default)]
    pub order: String,

    #[serde(default)]
    pub dataset: String,

    #[serde(default)]
    pub field: String,

    #[serde(default)]
    pub created_utc: String,

    #[serde(default)]
    pub generator: String,

    pub grids: Vec<GridEntry>,

    #[serde(default, deserialize_with = "de_u64")]
    pub payload_start: u64,

    #[serde(default, deserialize_with = "de_u64")]
    pub file_size: u64,

    #[serde(default)]
    pub header_crc32_hex: String,
}

pub fn compute_crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// CRC of the header text with its own checksum value zeroed.
pub fn compute_header_crc32_hex(header_json: &str) -> String {
    let zeroed = CRC_FIELD.replace(header_json, r#""header_crc32_hex"${1}"00000000""#);
    format!("{:08X}", compute_crc32(zeroed.as_bytes()))
}

/// An empty checksum is accepted; writers may skip it.
pub fn validate_header_crc(header: &Header, header_json: &str) -> Result<()> {
    let expected = header.header_crc32_hex.trim().to_ascii_uppercase();
    if expected.is_empty() {
        return Ok(());
    }
    let got = compute_header_crc32_hex(header_json);
    if expected == got {
        Ok(())
    } else {
        Err(BrowseError::HeaderCrcMismatch { expected, got })
    }
}
