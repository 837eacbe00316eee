//! Wire envelope types for parameters and parameter sets.
//!
//! The wire format is JSON with camelCase keys. A parameter travels as a
//! tagged pair `{"dataType": <tag>, "value": {<variant fields>}}`; the tag
//! alone decides which field set the inner object must contain. Numeric and
//! boolean fields use their native JSON types; colors are 8-hex-digit
//! `RRGGBBAA` strings.

use serde::{Deserialize, Serialize};

/// Outer tagged envelope for a single parameter.
///
/// `value` stays untyped here: the decoder reads `data_type` first and only
/// then parses the inner object against the variant that tag names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEnvelope {
    pub data_type: u8,
    pub value: serde_json::Value,
}

/// Envelope for one category and its ordered entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEnvelope {
    pub name: String,
    pub is_debug: bool,
    pub disclosed: bool,
    pub entries: Vec<ParameterEnvelope>,
}

/// Envelope for a whole parameter set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSetEnvelope {
    pub version: String,
    pub source: String,
    pub categories: Vec<CategoryEnvelope>,
}

fn default_persisted() -> bool {
    true
}

// ── Per-variant inner payloads ────────────────────────────────────────────────

/// Inner payload for `dataType = 0` (bool).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoolEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: bool,
    pub default_value: bool,
}

/// Inner payload for `dataType = 1` (int).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: i64,
    pub default_value: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub step_value: i64,
}

/// Inner payload for `dataType = 2` (float).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FloatEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: f64,
    pub default_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub step_value: f64,
    pub precision: f64,
}

/// Inner payload for `dataType = 3` (string).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StringEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: String,
    pub default_value: String,
}

/// Inner payload for `dataType = 4` (color). Both color fields are
/// `RRGGBBAA` hex strings and are validated by the decoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColorEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: String,
    pub default_value: String,
}

/// Inner payload for `dataType = 5` (segmented). Indices are carried
/// signed so the decoder can report negative values precisely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentedEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: i64,
    pub default_value: i64,
    pub titles: Vec<String>,
}

/// Inner payload for `dataType = 6` (static text).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticTextEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: String,
}

/// One picker row on the wire. The secondary `value` string is optional
/// and omitted entirely when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickerItemEnvelope {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Inner payload for `dataType = 7` (picker).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickerEnvelope {
    pub category: String,
    pub name: String,
    #[serde(default = "default_persisted")]
    pub persisted: bool,
    pub value: i64,
    pub default_value: i64,
    pub picker_items: Vec<PickerItemEnvelope>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
