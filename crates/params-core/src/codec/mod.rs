//! JSON codec for parameters and parameter sets.
//!
//! Encoding writes the tagged envelope form described in
//! [`envelope`]. Decoding is a discriminated-union decode: the `dataType`
//! tag is read first and selects exactly one field set to parse next.
//! Unknown tags, unparseable fields, and out-of-range selection indices
//! are typed errors — a failure anywhere aborts the whole envelope, so a
//! half-decoded set is never produced.
//!
//! The codec is pure and stateless: no I/O, no observers allocated, same
//! input gives the same output.

pub mod envelope;

use thiserror::Error;

use crate::model::category::ParameterCategory;
use crate::model::color::Rgba;
use crate::model::parameter::{
    BoolValue, ColorValue, DataType, FloatValue, IntValue, Parameter, ParameterValue, PickerItem,
    PickerValue, SegmentedValue, StaticTextValue, StringValue,
};
use crate::model::set::ParameterSet;
use envelope::{
    BoolEnvelope, CategoryEnvelope, ColorEnvelope, FloatEnvelope, IntEnvelope, ParameterEnvelope,
    ParameterSetEnvelope, PickerEnvelope, PickerItemEnvelope, SegmentedEnvelope,
    StaticTextEnvelope, StringEnvelope,
};

/// Errors that can occur while encoding or decoding parameter envelopes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    /// The `dataType` tag is not one of the eight known variants.
    #[error("unknown parameter data type tag: {0}")]
    UnknownVariant(u8),

    /// A field was present but could not be parsed as its declared type
    /// (bad hex color, wrong JSON type, missing required field).
    #[error("malformed field {field}: {detail}")]
    MalformedField { field: String, detail: String },

    /// A Segmented/Picker selection index lies outside `[0, len)`.
    #[error("selection index {index} out of range for {len} choices")]
    IndexOutOfRange { index: i64, len: usize },
}

impl CodecError {
    fn malformed(field: &str, detail: impl ToString) -> Self {
        CodecError::MalformedField {
            field: field.to_string(),
            detail: detail.to_string(),
        }
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a single parameter into its tagged envelope.
pub fn encode_parameter(parameter: &Parameter) -> Result<ParameterEnvelope, CodecError> {
    let value = match parameter.value() {
        ParameterValue::Bool(v) => to_value(BoolEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value,
            default_value: v.default_value,
        })?,
        ParameterValue::Int(v) => to_value(IntEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value,
            default_value: v.default_value,
            min_value: v.min_value,
            max_value: v.max_value,
            step_value: v.step_value,
        })?,
        ParameterValue::Float(v) => to_value(FloatEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value,
            default_value: v.default_value,
            min_value: v.min_value,
            max_value: v.max_value,
            step_value: v.step_value,
            precision: v.precision,
        })?,
        ParameterValue::String(v) => to_value(StringEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value.clone(),
            default_value: v.default_value.clone(),
        })?,
        ParameterValue::Color(v) => to_value(ColorEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value.to_hex(),
            default_value: v.default_value.to_hex(),
        })?,
        ParameterValue::Segmented(v) => to_value(SegmentedEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value as i64,
            default_value: v.default_value as i64,
            titles: v.titles.clone(),
        })?,
        ParameterValue::StaticText(v) => to_value(StaticTextEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value.clone(),
        })?,
        ParameterValue::Picker(v) => to_value(PickerEnvelope {
            category: parameter.category.clone(),
            name: parameter.name.clone(),
            persisted: parameter.persisted,
            value: v.value as i64,
            default_value: v.default_value as i64,
            picker_items: v
                .items
                .iter()
                .map(|item| PickerItemEnvelope {
                    display_name: item.display_name.clone(),
                    value: item.value.clone(),
                })
                .collect(),
        })?,
    };

    Ok(ParameterEnvelope {
        data_type: parameter.data_type() as u8,
        value,
    })
}

/// Encodes a whole parameter set into UTF-8 JSON bytes.
pub fn encode_set(set: &ParameterSet) -> Result<Vec<u8>, CodecError> {
    let mut categories = Vec::with_capacity(set.categories.len());
    for category in &set.categories {
        let mut entries = Vec::with_capacity(category.entries.len());
        for parameter in &category.entries {
            entries.push(encode_parameter(parameter)?);
        }
        categories.push(CategoryEnvelope {
            name: category.name.clone(),
            is_debug: category.is_debug,
            disclosed: category.disclosed,
            entries,
        });
    }
    let envelope = ParameterSetEnvelope {
        version: set.version.clone(),
        source: set.source.clone(),
        categories,
    };
    serde_json::to_vec(&envelope).map_err(|e| CodecError::malformed("parameterSet", e))
}

fn to_value<T: serde::Serialize>(payload: T) -> Result<serde_json::Value, CodecError> {
    serde_json::to_value(payload).map_err(|e| CodecError::malformed("value", e))
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes a single parameter from its tagged envelope.
///
/// # Errors
///
/// [`CodecError::UnknownVariant`] for a tag outside the closed enum,
/// [`CodecError::MalformedField`] for unparseable fields (colors that are
/// not valid hex included), [`CodecError::IndexOutOfRange`] for
/// Segmented/Picker indices outside the titles/items bounds.
pub fn decode_parameter(envelope: &ParameterEnvelope) -> Result<Parameter, CodecError> {
    let data_type = DataType::try_from(envelope.data_type)
        .map_err(|_| CodecError::UnknownVariant(envelope.data_type))?;

    let (category, name, persisted, value) = match data_type {
        DataType::Bool => {
            let e: BoolEnvelope = from_value(&envelope.value)?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::Bool(BoolValue {
                    value: e.value,
                    default_value: e.default_value,
                }),
            )
        }
        DataType::Int => {
            let e: IntEnvelope = from_value(&envelope.value)?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::Int(IntValue {
                    value: e.value,
                    default_value: e.default_value,
                    min_value: e.min_value,
                    max_value: e.max_value,
                    step_value: e.step_value,
                }),
            )
        }
        DataType::Float => {
            let e: FloatEnvelope = from_value(&envelope.value)?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::Float(FloatValue {
                    value: e.value,
                    default_value: e.default_value,
                    min_value: e.min_value,
                    max_value: e.max_value,
                    step_value: e.step_value,
                    precision: e.precision,
                }),
            )
        }
        DataType::String => {
            let e: StringEnvelope = from_value(&envelope.value)?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::String(StringValue {
                    value: e.value,
                    default_value: e.default_value,
                }),
            )
        }
        DataType::Color => {
            let e: ColorEnvelope = from_value(&envelope.value)?;
            let value = Rgba::parse_hex(&e.value)
                .map_err(|err| CodecError::malformed("value", err))?;
            let default_value = Rgba::parse_hex(&e.default_value)
                .map_err(|err| CodecError::malformed("defaultValue", err))?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::Color(ColorValue {
                    value,
                    default_value,
                }),
            )
        }
        DataType::Segmented => {
            let e: SegmentedEnvelope = from_value(&envelope.value)?;
            let value = checked_index(e.value, e.titles.len())?;
            let default_value = checked_index(e.default_value, e.titles.len())?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::Segmented(SegmentedValue {
                    value,
                    default_value,
                    titles: e.titles,
                }),
            )
        }
        DataType::StaticText => {
            let e: StaticTextEnvelope = from_value(&envelope.value)?;
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::StaticText(StaticTextValue { value: e.value }),
            )
        }
        DataType::Picker => {
            let e: PickerEnvelope = from_value(&envelope.value)?;
            let value = checked_index(e.value, e.picker_items.len())?;
            let default_value = checked_index(e.default_value, e.picker_items.len())?;
            let items = e
                .picker_items
                .into_iter()
                .map(|item| PickerItem {
                    display_name: item.display_name,
                    value: item.value,
                })
                .collect();
            (
                e.category,
                e.name,
                e.persisted,
                ParameterValue::Picker(PickerValue {
                    value,
                    default_value,
                    items,
                }),
            )
        }
    };

    let mut parameter = Parameter::from_parts(&category, &name, value);
    parameter.persisted = persisted;
    Ok(parameter)
}

/// Decodes a whole parameter set from UTF-8 JSON bytes. Category and entry
/// order are preserved exactly as transmitted.
///
/// # Errors
///
/// Any parameter-level error aborts the decode of the entire set.
pub fn decode_set(bytes: &[u8]) -> Result<ParameterSet, CodecError> {
    let envelope: ParameterSetEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| CodecError::malformed("parameterSet", e))?;

    let mut categories = Vec::with_capacity(envelope.categories.len());
    for category in envelope.categories {
        let mut entries = Vec::with_capacity(category.entries.len());
        for entry in &category.entries {
            entries.push(decode_parameter(entry)?);
        }
        categories.push(ParameterCategory {
            name: category.name,
            is_debug: category.is_debug,
            disclosed: category.disclosed,
            entries,
        });
    }

    Ok(ParameterSet {
        version: envelope.version,
        source: envelope.source,
        categories,
    })
}

fn from_value<T: serde::de::DeserializeOwned>(
    value: &serde_json::Value,
) -> Result<T, CodecError> {
    serde_json::from_value(value.clone()).map_err(|e| CodecError::malformed("value", e))
}

fn checked_index(index: i64, len: usize) -> Result<usize, CodecError> {
    if index < 0 || index as u64 >= len as u64 {
        return Err(CodecError::IndexOutOfRange { index, len });
    }
    Ok(index as usize)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(parameter: &Parameter) -> Parameter {
        let envelope = encode_parameter(parameter).expect("encode failed");
        decode_parameter(&envelope).expect("decode failed")
    }

    #[test]
    fn test_bool_round_trip() {
        let mut p = Parameter::bool("Debug", "Flag", false);
        p.set_bool(true).unwrap();
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn test_int_round_trip_with_extreme_values() {
        let mut p = Parameter::int("Tuning", "Count", 0, i64::MIN, i64::MAX, 1);
        p.set_int(i64::MIN).unwrap();
        assert_eq!(round_trip(&p), p);
        p.set_int(i64::MAX).unwrap();
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn test_float_round_trip_keeps_precision_field() {
        let p = Parameter::float("Tuning", "Gain", 2.5, 0.0, 10.0, 0.5, 0.1);
        let decoded = round_trip(&p);
        match decoded.value() {
            ParameterValue::Float(v) => {
                assert_eq!(v.precision, 0.1);
                assert_eq!(v.step_value, 0.5);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(decoded, p);
    }

    #[test]
    fn test_string_round_trip_empty_string() {
        let p = Parameter::string("Text", "Label", "");
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn test_color_round_trip_transparent_and_opaque() {
        let transparent = Parameter::color("Look", "Tint", Rgba::new(0, 0, 0, 0));
        assert_eq!(round_trip(&transparent), transparent);
        let opaque = Parameter::color("Look", "Tint", Rgba::WHITE);
        assert_eq!(round_trip(&opaque), opaque);
    }

    #[test]
    fn test_color_encodes_as_uppercase_hex_string() {
        let p = Parameter::color("Look", "Tint", Rgba::new(0xAB, 0xCD, 0xEF, 0x01));
        let envelope = encode_parameter(&p).unwrap();
        assert_eq!(envelope.value["value"], "ABCDEF01");
    }

    #[test]
    fn test_segmented_round_trip_first_and_last_index() {
        let titles = vec!["Low".to_string(), "Medium".to_string(), "High".to_string()];
        let mut p = Parameter::segmented("Mode", "Quality", titles, 0);
        assert_eq!(round_trip(&p), p);
        p.set_selected_index(2).unwrap();
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn test_static_text_round_trip() {
        let p = Parameter::static_text("About", "Build", "2024.06");
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn test_picker_round_trip_with_and_without_item_values() {
        let items = vec![
            PickerItem {
                display_name: "Paris".into(),
                value: Some("CDG".into()),
            },
            PickerItem {
                display_name: "Custom".into(),
                value: None,
            },
        ];
        let p = Parameter::picker("Route", "Origin", items, 1);
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn test_persisted_flag_round_trips() {
        let p = Parameter::bool("Debug", "Flag", true).with_persisted(false);
        let decoded = round_trip(&p);
        assert!(!decoded.persisted);
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let envelope = ParameterEnvelope {
            data_type: 99,
            value: serde_json::json!({}),
        };
        assert_eq!(
            decode_parameter(&envelope),
            Err(CodecError::UnknownVariant(99))
        );
    }

    #[test]
    fn test_decode_rejects_invalid_hex_color() {
        let envelope = ParameterEnvelope {
            data_type: DataType::Color as u8,
            value: serde_json::json!({
                "category": "Look",
                "name": "Tint",
                "persisted": true,
                "value": "zzzzzzzz",
                "defaultValue": "FFFFFFFF",
            }),
        };
        assert!(matches!(
            decode_parameter(&envelope),
            Err(CodecError::MalformedField { field, .. }) if field == "value"
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_hex_default_color() {
        let envelope = ParameterEnvelope {
            data_type: DataType::Color as u8,
            value: serde_json::json!({
                "category": "Look",
                "name": "Tint",
                "value": "FFFFFFFF",
                "defaultValue": "nope",
            }),
        };
        assert!(matches!(
            decode_parameter(&envelope),
            Err(CodecError::MalformedField { field, .. }) if field == "defaultValue"
        ));
    }

    #[test]
    fn test_decode_rejects_segmented_index_out_of_range() {
        let envelope = ParameterEnvelope {
            data_type: DataType::Segmented as u8,
            value: serde_json::json!({
                "category": "Mode",
                "name": "Quality",
                "value": 5,
                "defaultValue": 0,
                "titles": ["Low", "Medium", "High"],
            }),
        };
        assert_eq!(
            decode_parameter(&envelope),
            Err(CodecError::IndexOutOfRange { index: 5, len: 3 })
        );
    }

    #[test]
    fn test_decode_rejects_negative_segmented_index() {
        let envelope = ParameterEnvelope {
            data_type: DataType::Segmented as u8,
            value: serde_json::json!({
                "category": "Mode",
                "name": "Quality",
                "value": -1,
                "defaultValue": 0,
                "titles": ["Low", "High"],
            }),
        };
        assert_eq!(
            decode_parameter(&envelope),
            Err(CodecError::IndexOutOfRange { index: -1, len: 2 })
        );
    }

    #[test]
    fn test_decode_rejects_wrong_json_type_for_value() {
        let envelope = ParameterEnvelope {
            data_type: DataType::Bool as u8,
            value: serde_json::json!({
                "category": "Debug",
                "name": "Flag",
                "value": "not-a-bool",
                "defaultValue": false,
            }),
        };
        assert!(matches!(
            decode_parameter(&envelope),
            Err(CodecError::MalformedField { .. })
        ));
    }

    #[test]
    fn test_decoded_parameter_carries_no_observers() {
        let mut p = Parameter::bool("Debug", "Flag", false);
        let _rx = p.subscribe("ui");
        let decoded = round_trip(&p);
        assert_eq!(decoded.observer_count(), 0);
    }

    #[test]
    fn test_decode_set_aborts_on_first_bad_entry() {
        let set = ParameterSet::new("1.0", "device")
            .with(
                ParameterCategory::new("A")
                    .with(Parameter::bool("A", "Good", true))
                    .with(Parameter::color("A", "Bad", Rgba::WHITE)),
            );
        let mut bytes = encode_set(&set).unwrap();
        // Corrupt the color hex in place to force a mid-set decode failure.
        let json = String::from_utf8(bytes.clone()).unwrap();
        let corrupted = json.replace("FFFFFFFF", "zzzzzzzz");
        assert_ne!(json, corrupted, "fixture must contain the color value");
        bytes = corrupted.into_bytes();

        assert!(matches!(
            decode_set(&bytes),
            Err(CodecError::MalformedField { .. })
        ));
    }

    #[test]
    fn test_decode_set_rejects_non_json_payload() {
        assert!(matches!(
            decode_set(b"\x00\x01\x02"),
            Err(CodecError::MalformedField { field, .. }) if field == "parameterSet"
        ));
    }
}
