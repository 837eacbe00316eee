//! RGBA color value used by color parameters.
//!
//! The wire representation is an 8-hex-digit uppercase string of the form
//! `RRGGBBAA`. Parsing is strict: exactly eight hex digits, nothing else.

use std::fmt;

use thiserror::Error;

/// Error produced when a hex color string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    /// The string is not exactly 8 characters long.
    #[error("expected 8 hex digits (RRGGBBAA), got {0} characters")]
    BadLength(usize),

    /// A character outside `[0-9A-Fa-f]` was found.
    #[error("invalid hex digit in color string {0:?}")]
    BadDigit(String),
}

/// An RGBA color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque white, the conventional starting color for color parameters.
    pub const WHITE: Rgba = Rgba::new(0xFF, 0xFF, 0xFF, 0xFF);

    /// Formats the color as an uppercase `RRGGBBAA` string.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Parses an `RRGGBBAA` hex string. Case-insensitive on input.
    ///
    /// # Errors
    ///
    /// Returns [`ColorParseError`] for a wrong length or a non-hex digit.
    /// There is no silent fallback color — callers must handle the error.
    pub fn parse_hex(s: &str) -> Result<Self, ColorParseError> {
        let char_count = s.chars().count();
        if char_count != 8 {
            return Err(ColorParseError::BadLength(char_count));
        }
        if !s.is_ascii() {
            return Err(ColorParseError::BadDigit(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16).map_err(|_| ColorParseError::BadDigit(s.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            a: channel(6..8)?,
        })
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex_is_uppercase_rrggbbaa() {
        let c = Rgba::new(0xDE, 0xAD, 0xBE, 0xEF);
        assert_eq!(c.to_hex(), "DEADBEEF");
    }

    #[test]
    fn test_parse_hex_round_trips() {
        let c = Rgba::new(0x12, 0x34, 0x56, 0x78);
        assert_eq!(Rgba::parse_hex(&c.to_hex()), Ok(c));
    }

    #[test]
    fn test_parse_hex_accepts_lowercase() {
        assert_eq!(
            Rgba::parse_hex("deadbeef"),
            Ok(Rgba::new(0xDE, 0xAD, 0xBE, 0xEF))
        );
    }

    #[test]
    fn test_parse_hex_rejects_wrong_length() {
        assert_eq!(Rgba::parse_hex("FFF"), Err(ColorParseError::BadLength(3)));
        assert_eq!(
            Rgba::parse_hex("FFFFFFFFFF"),
            Err(ColorParseError::BadLength(10))
        );
    }

    #[test]
    fn test_parse_hex_rejects_non_hex_digits() {
        assert!(matches!(
            Rgba::parse_hex("zzzzzzzz"),
            Err(ColorParseError::BadDigit(_))
        ));
    }

    #[test]
    fn test_transparent_and_opaque_extremes() {
        assert_eq!(Rgba::parse_hex("00000000").unwrap().to_hex(), "00000000");
        assert_eq!(Rgba::parse_hex("FFFFFFFF").unwrap(), Rgba::WHITE);
    }
}
