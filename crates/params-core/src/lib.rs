//! # params-core
//!
//! Shared library for Remote Parameters containing the parameter variant
//! model and the wire codec used to move whole parameter sets between
//! devices.
//!
//! This crate is used by both the embedding application (the device that
//! exposes its tunables) and the remote control. It has zero dependencies
//! on UI frameworks, network sockets, or async runtimes.
//!
//! The crate defines:
//!
//! - **`model`** – The closed set of parameter variants (bool, int, float,
//!   string, color, segmented, static text, picker), the ordered category
//!   and set containers, and the subscribe/publish observer mechanism that
//!   fires whenever a value changes.
//!
//! - **`codec`** – A tagged JSON envelope for single parameters and whole
//!   parameter sets. Decoding reads the `dataType` tag first and then
//!   expects exactly the field set that tag implies; anything else is a
//!   typed error, never a silent default.

pub mod codec;
pub mod model;

// Re-export the most-used types at the crate root so callers can write
// `params_core::Parameter` instead of `params_core::model::parameter::Parameter`.
pub use codec::{
    decode_parameter, decode_set, encode_parameter, encode_set, CodecError,
};
pub use model::category::ParameterCategory;
pub use model::color::Rgba;
pub use model::parameter::{
    BoolValue, ColorValue, DataType, FloatValue, IntValue, Parameter, ParameterChange,
    ParameterError, ParameterValue, PickerItem, PickerValue, SegmentedValue, StaticTextValue,
    StringValue,
};
pub use model::set::ParameterSet;
