//! The parameter variant model.
//!
//! A [`Parameter`] couples a stable identity (`category` + `name`) with one
//! of eight typed payloads ([`ParameterValue`]). The payload variant is
//! fixed for the lifetime of the parameter: setters never change the data
//! type, only the value fields inside it.
//!
//! Observers subscribe by string identifier and receive a
//! [`ParameterChange`] on a channel every time the value is written —
//! including writes that store the same value again. Dependents rely on
//! that re-notification to redraw, so setters must not dedup.

use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

use thiserror::Error;

use crate::model::color::Rgba;

// ── Data type tags ────────────────────────────────────────────────────────────

/// Wire tag identifying the concrete variant of a parameter.
///
/// The numeric values are fixed by the wire format and must not be
/// reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Bool = 0,
    Int = 1,
    Float = 2,
    String = 3,
    Color = 4,
    Segmented = 5,
    StaticText = 6,
    Picker = 7,
}

impl TryFrom<u8> for DataType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DataType::Bool),
            1 => Ok(DataType::Int),
            2 => Ok(DataType::Float),
            3 => Ok(DataType::String),
            4 => Ok(DataType::Color),
            5 => Ok(DataType::Segmented),
            6 => Ok(DataType::StaticText),
            7 => Ok(DataType::Picker),
            _ => Err(()),
        }
    }
}

// ── Per-variant payloads ──────────────────────────────────────────────────────

/// Payload of a boolean toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolValue {
    pub value: bool,
    pub default_value: bool,
}

/// Payload of an integer slider/stepper.
///
/// The declared range is a UI hint: the stored value may legally sit
/// outside `[min_value, max_value]` when set programmatically.
#[derive(Debug, Clone, PartialEq)]
pub struct IntValue {
    pub value: i64,
    pub default_value: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub step_value: i64,
}

/// Payload of a floating-point slider/stepper.
///
/// `precision` is the rounding granularity: every editing path snaps the
/// incoming value to the nearest multiple of it. Stored values are not
/// re-snapped or clamped on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatValue {
    pub value: f64,
    pub default_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub step_value: f64,
    pub precision: f64,
}

/// Payload of a free-form text field.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub value: String,
    pub default_value: String,
}

/// Payload of a color well.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorValue {
    pub value: Rgba,
    pub default_value: Rgba,
}

/// Payload of a segmented control. `value` is the selected index into
/// `titles` and must satisfy `value < titles.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedValue {
    pub value: usize,
    pub default_value: usize,
    pub titles: Vec<String>,
}

/// Payload of a read-only text row. Reverting is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTextValue {
    pub value: String,
}

/// One row of a picker wheel. The secondary `value` string is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerItem {
    pub display_name: String,
    pub value: Option<String>,
}

/// Payload of a picker wheel. `value` is the selected index into `items`,
/// not any item's own value string.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerValue {
    pub value: usize,
    pub default_value: usize,
    pub items: Vec<PickerItem>,
}

/// The typed payload of a parameter — exactly one variant per data type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(BoolValue),
    Int(IntValue),
    Float(FloatValue),
    String(StringValue),
    Color(ColorValue),
    Segmented(SegmentedValue),
    StaticText(StaticTextValue),
    Picker(PickerValue),
}

impl ParameterValue {
    /// Returns the [`DataType`] discriminant for this payload.
    pub fn data_type(&self) -> DataType {
        match self {
            ParameterValue::Bool(_) => DataType::Bool,
            ParameterValue::Int(_) => DataType::Int,
            ParameterValue::Float(_) => DataType::Float,
            ParameterValue::String(_) => DataType::String,
            ParameterValue::Color(_) => DataType::Color,
            ParameterValue::Segmented(_) => DataType::Segmented,
            ParameterValue::StaticText(_) => DataType::StaticText,
            ParameterValue::Picker(_) => DataType::Picker,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors returned by the typed mutation entry points.
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    /// A setter was called on a parameter of a different variant.
    #[error("parameter {uuid} holds a {actual:?} value, not {expected:?}")]
    WrongKind {
        uuid: String,
        expected: DataType,
        actual: DataType,
    },

    /// A selection index outside the titles/items bounds was supplied.
    #[error("selection index {index} out of range for {len} choices")]
    IndexOutOfRange { index: usize, len: usize },
}

// ── Change notifications ──────────────────────────────────────────────────────

/// Snapshot delivered to observers after every value write.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChange {
    /// The derived identity of the parameter that changed.
    pub uuid: String,
    /// The payload after the write.
    pub value: ParameterValue,
}

struct Observer {
    identifier: String,
    tx: Sender<ParameterChange>,
}

// ── Parameter ─────────────────────────────────────────────────────────────────

/// A single tunable parameter: identity, typed payload, and observers.
///
/// Identity is derived, not random: `uuid()` is `category + "-" + name`,
/// so uniqueness is the (category, name) pair's responsibility.
pub struct Parameter {
    pub category: String,
    pub name: String,
    /// Hint for the embedding application's persistence layer.
    pub persisted: bool,
    value: ParameterValue,
    observers: Vec<Observer>,
}

impl Parameter {
    fn new(category: &str, name: &str, value: ParameterValue) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            persisted: true,
            value,
            observers: Vec::new(),
        }
    }

    /// Assembles a parameter from an already-validated payload. Used by the
    /// codec, which performs its own bounds checks before construction.
    pub(crate) fn from_parts(category: &str, name: &str, value: ParameterValue) -> Self {
        Self::new(category, name, value)
    }

    /// Creates a boolean parameter initialised to its default.
    pub fn bool(category: &str, name: &str, default_value: bool) -> Self {
        Self::new(
            category,
            name,
            ParameterValue::Bool(BoolValue {
                value: default_value,
                default_value,
            }),
        )
    }

    /// Creates an integer parameter initialised to its default.
    pub fn int(
        category: &str,
        name: &str,
        default_value: i64,
        min_value: i64,
        max_value: i64,
        step_value: i64,
    ) -> Self {
        Self::new(
            category,
            name,
            ParameterValue::Int(IntValue {
                value: default_value,
                default_value,
                min_value,
                max_value,
                step_value,
            }),
        )
    }

    /// Creates a float parameter initialised to its default.
    pub fn float(
        category: &str,
        name: &str,
        default_value: f64,
        min_value: f64,
        max_value: f64,
        step_value: f64,
        precision: f64,
    ) -> Self {
        Self::new(
            category,
            name,
            ParameterValue::Float(FloatValue {
                value: default_value,
                default_value,
                min_value,
                max_value,
                step_value,
                precision,
            }),
        )
    }

    /// Creates a string parameter initialised to its default.
    pub fn string(category: &str, name: &str, default_value: &str) -> Self {
        Self::new(
            category,
            name,
            ParameterValue::String(StringValue {
                value: default_value.to_string(),
                default_value: default_value.to_string(),
            }),
        )
    }

    /// Creates a color parameter initialised to its default.
    pub fn color(category: &str, name: &str, default_value: Rgba) -> Self {
        Self::new(
            category,
            name,
            ParameterValue::Color(ColorValue {
                value: default_value,
                default_value,
            }),
        )
    }

    /// Creates a segmented parameter. `default_index` must be a valid index
    /// into `titles`.
    pub fn segmented(
        category: &str,
        name: &str,
        titles: Vec<String>,
        default_index: usize,
    ) -> Self {
        debug_assert!(default_index < titles.len());
        Self::new(
            category,
            name,
            ParameterValue::Segmented(SegmentedValue {
                value: default_index,
                default_value: default_index,
                titles,
            }),
        )
    }

    /// Creates a read-only static text parameter.
    pub fn static_text(category: &str, name: &str, value: &str) -> Self {
        Self::new(
            category,
            name,
            ParameterValue::StaticText(StaticTextValue {
                value: value.to_string(),
            }),
        )
    }

    /// Creates a picker parameter. `default_index` must be a valid index
    /// into `items`.
    pub fn picker(
        category: &str,
        name: &str,
        items: Vec<PickerItem>,
        default_index: usize,
    ) -> Self {
        debug_assert!(default_index < items.len());
        Self::new(
            category,
            name,
            ParameterValue::Picker(PickerValue {
                value: default_index,
                default_value: default_index,
                items,
            }),
        )
    }

    /// Marks the parameter as excluded from the persistence layer.
    pub fn with_persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }

    /// The derived identity: `category + "-" + name`.
    pub fn uuid(&self) -> String {
        format!("{}-{}", self.category, self.name)
    }

    /// Returns the variant tag of this parameter.
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// Read access to the typed payload.
    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    // ── Mutation entry points ─────────────────────────────────────────────────

    /// Resets the value to the default and notifies observers exactly once.
    ///
    /// Static text has no default; reverting it is a no-op and fires no
    /// notification.
    pub fn revert_to_default(&mut self) {
        match &mut self.value {
            ParameterValue::Bool(v) => v.value = v.default_value,
            ParameterValue::Int(v) => v.value = v.default_value,
            ParameterValue::Float(v) => v.value = v.default_value,
            ParameterValue::String(v) => v.value = v.default_value.clone(),
            ParameterValue::Color(v) => v.value = v.default_value,
            ParameterValue::Segmented(v) => v.value = v.default_value,
            ParameterValue::Picker(v) => v.value = v.default_value,
            ParameterValue::StaticText(_) => return,
        }
        self.notify();
    }

    /// Sets a boolean value.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongKind`] for a non-bool parameter.
    pub fn set_bool(&mut self, value: bool) -> Result<(), ParameterError> {
        match &mut self.value {
            ParameterValue::Bool(v) => v.value = value,
            other => {
                let actual = other.data_type();
                return Err(self.wrong_kind(DataType::Bool, actual));
            }
        }
        self.notify();
        Ok(())
    }

    /// Sets an integer value. The declared range is not enforced here.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongKind`] for a non-int parameter.
    pub fn set_int(&mut self, value: i64) -> Result<(), ParameterError> {
        match &mut self.value {
            ParameterValue::Int(v) => v.value = value,
            other => {
                let actual = other.data_type();
                return Err(self.wrong_kind(DataType::Int, actual));
            }
        }
        self.notify();
        Ok(())
    }

    /// Sets a float value, snapped to the nearest multiple of `precision`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongKind`] for a non-float parameter.
    pub fn set_float(&mut self, value: f64) -> Result<(), ParameterError> {
        match &mut self.value {
            ParameterValue::Float(v) => v.value = snap_to_precision(value, v.precision),
            other => {
                let actual = other.data_type();
                return Err(self.wrong_kind(DataType::Float, actual));
            }
        }
        self.notify();
        Ok(())
    }

    /// Sets a string value.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongKind`] for a non-string parameter.
    pub fn set_string(&mut self, value: &str) -> Result<(), ParameterError> {
        match &mut self.value {
            ParameterValue::String(v) => v.value = value.to_string(),
            other => {
                let actual = other.data_type();
                return Err(self.wrong_kind(DataType::String, actual));
            }
        }
        self.notify();
        Ok(())
    }

    /// Sets a color value.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongKind`] for a non-color parameter.
    pub fn set_color(&mut self, value: Rgba) -> Result<(), ParameterError> {
        match &mut self.value {
            ParameterValue::Color(v) => v.value = value,
            other => {
                let actual = other.data_type();
                return Err(self.wrong_kind(DataType::Color, actual));
            }
        }
        self.notify();
        Ok(())
    }

    /// Sets the selected index of a segmented or picker parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::IndexOutOfRange`] when `index` is not a
    /// valid choice, and [`ParameterError::WrongKind`] for other variants.
    pub fn set_selected_index(&mut self, index: usize) -> Result<(), ParameterError> {
        match &mut self.value {
            ParameterValue::Segmented(v) => {
                if index >= v.titles.len() {
                    return Err(ParameterError::IndexOutOfRange {
                        index,
                        len: v.titles.len(),
                    });
                }
                v.value = index;
            }
            ParameterValue::Picker(v) => {
                if index >= v.items.len() {
                    return Err(ParameterError::IndexOutOfRange {
                        index,
                        len: v.items.len(),
                    });
                }
                v.value = index;
            }
            other => {
                let actual = other.data_type();
                return Err(self.wrong_kind(DataType::Segmented, actual));
            }
        }
        self.notify();
        Ok(())
    }

    /// Replaces the whole payload with one of the same variant and notifies
    /// once. This is the path the sync coordinator uses when applying a
    /// decoded remote parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongKind`] when the incoming payload is a
    /// different variant.
    pub fn replace_value(&mut self, value: ParameterValue) -> Result<(), ParameterError> {
        if value.data_type() != self.value.data_type() {
            return Err(self.wrong_kind(self.value.data_type(), value.data_type()));
        }
        self.value = value;
        self.notify();
        Ok(())
    }

    fn wrong_kind(&self, expected: DataType, actual: DataType) -> ParameterError {
        ParameterError::WrongKind {
            uuid: self.uuid(),
            expected,
            actual,
        }
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    /// Registers an observer under `identifier` and returns the channel on
    /// which change notifications arrive. The parameter holds only the
    /// sending half: dropping the receiver ends the subscription.
    pub fn subscribe(&mut self, identifier: &str) -> Receiver<ParameterChange> {
        let (tx, rx) = channel();
        self.observers.push(Observer {
            identifier: identifier.to_string(),
            tx,
        });
        rx
    }

    /// Removes every observer registered under `identifier`. Idempotent —
    /// unknown identifiers are silently ignored.
    pub fn unsubscribe(&mut self, identifier: &str) {
        self.observers.retain(|o| o.identifier != identifier);
    }

    /// Number of live observers, for diagnostics and tests.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Delivers the current value to every observer, pruning subscriptions
    /// whose receiving half has been dropped.
    fn notify(&mut self) {
        let change = ParameterChange {
            uuid: self.uuid(),
            value: self.value.clone(),
        };
        self.observers.retain(|o| o.tx.send(change.clone()).is_ok());
    }
}

/// Rounds `value` to the nearest multiple of `precision`. A zero or
/// non-finite precision leaves the value untouched.
pub(crate) fn snap_to_precision(value: f64, precision: f64) -> f64 {
    if precision <= 0.0 || !precision.is_finite() {
        return value;
    }
    (value / precision).round() * precision
}

// `Clone` duplicates identity and payload only; observers do not follow the
// copy. `PartialEq` likewise ignores observers so decoded parameters compare
// equal to their source.
impl Clone for Parameter {
    fn clone(&self) -> Self {
        Self {
            category: self.category.clone(),
            name: self.name.clone(),
            persisted: self.persisted,
            value: self.value.clone(),
            observers: Vec::new(),
        }
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.name == other.name
            && self.persisted == other.persisted
            && self.value == other.value
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("uuid", &self.uuid())
            .field("persisted", &self.persisted)
            .field("value", &self.value)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
