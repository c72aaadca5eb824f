//! A bounded JSON representation
//!
//! This module carries the JSON values that flow through every other part
//! of the crate: JOSE headers, claim sets, and key parameters. It differs
//! from a general-purpose JSON stack in three ways that matter here:
//!
//! * parsing is *bounded* — input size, nesting depth, numeral length,
//!   string length, and container sizes are all enforced by [`Limits`],
//!   so hostile wire data cannot exhaust the process;
//! * object members can be marked *final*, after which they cannot be
//!   overwritten — the mechanism that protects registered claims; and
//! * values can be [`invalidate`][Value::invalidate]d, scrubbing every
//!   contained string and numeral before release, for structures that
//!   carry key material.
//!
//! Numbers are preserved as their source text; the integer form is used
//! only when the token has no fraction or exponent and fits in an `i64`.

mod array;
mod object;
mod parser;
pub mod utf8;

use std::fmt::Write as _;

use thiserror::Error;
use zeroize::Zeroize;

pub use array::Array;
pub use object::Object;

/// An error arising while parsing or manipulating JSON values
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The input text is not well-formed JSON
    #[error("malformed JSON at byte {offset}: expected {expected}")]
    Malformed {
        /// Byte offset at which parsing failed
        offset: usize,
        /// What the parser was looking for
        expected: &'static str,
    },

    /// A configured limit was exceeded
    #[error("{what} exceeds allowed limit")]
    LimitExceeded {
        /// The limit that was tripped
        what: &'static str,
    },

    /// The input is not acceptable UTF-8
    #[error("invalid text encoding at byte {offset}")]
    Unicode {
        /// Byte offset of the offending sequence
        offset: usize,
    },

    /// The member is final and cannot be modified
    #[error("member '{name}' is final")]
    FinalConflict {
        /// The member name
        name: String,
    },

    /// The container is locked against all mutation
    #[error("locked against modification")]
    Locked,

    /// The value is not of the requested type
    #[error("value is not {expected}")]
    TypeMismatch {
        /// The requested type
        expected: &'static str,
    },

    /// The named member does not exist
    #[error("member '{name}' not found")]
    NotFound {
        /// The member name
        name: String,
    },
}

/// Bounds applied while parsing JSON text
///
/// Any violation terminates parsing with [`Error::LimitExceeded`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Maximum total input size in bytes
    pub json_string_size: usize,
    /// Maximum nesting depth of containers
    pub recursion_depth: u32,
    /// Maximum number of characters in a numeral
    pub numeral_length: usize,
    /// Maximum size in bytes of any single string value
    pub string_size: usize,
    /// Maximum number of elements in an array
    pub array_elem_count: usize,
    /// Maximum number of members in an object
    pub object_mbr_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            json_string_size: 4 * 1024 * 1024,
            recursion_depth: 32,
            numeral_length: 256,
            string_size: 64 * 1024,
            array_elem_count: 4096,
            object_mbr_count: 256,
        }
    }
}

/// A JSON value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The `null` keyword
    Null,
    /// `true` or `false`
    Bool(bool),
    /// A number with no fraction or exponent that fits in 64 signed bits
    Integer(i64),
    /// Any other number, preserved as its source text
    Number(String),
    /// A string
    String(String),
    /// An ordered sequence of values
    Array(Array),
    /// A collection of named members
    Object(Object),
}

impl Value {
    /// Whether this value is `null`
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean carried by this value, if it is one
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer carried by this value, if it is one
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The string carried by this value, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The array carried by this value, if it is one
    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The object carried by this value, if it is one
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Renders this value as compact JSON text
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    pub(crate) fn write_json(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(true) => out.push_str("true"),
            Self::Bool(false) => out.push_str("false"),
            Self::Integer(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Number(n) => out.push_str(n),
            Self::String(s) => write_escaped(s, out),
            Self::Array(a) => a.write_json(out),
            Self::Object(o) => o.write_json(out),
        }
    }

    /// Scrubs every string and numeral contained in this value, then
    /// releases its children, leaving `null` behind
    pub fn invalidate(&mut self) {
        match self {
            Self::Number(n) => n.zeroize(),
            Self::String(s) => s.zeroize(),
            Self::Array(a) => a.invalidate(),
            Self::Object(o) => o.invalidate(),
            Self::Null | Self::Bool(_) | Self::Integer(_) => {}
        }
        *self = Self::Null;
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

pub(crate) fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Parses JSON text under the default limits
///
/// The top-level value must be an object or an array.
///
/// # Errors
///
/// Returns an error if the text is malformed or violates a limit.
pub fn parse(text: &str) -> Result<Value, Error> {
    parse_with_limits(text, &Limits::default())
}

/// Parses JSON text under the given limits
///
/// The top-level value must be an object or an array; trailing bytes
/// after the top value are an error.
///
/// # Errors
///
/// Returns an error if the text is malformed or violates a limit.
pub fn parse_with_limits(text: &str, limits: &Limits) -> Result<Value, Error> {
    parser::parse_root(text, limits)
}

/// Parses JSON text that must be a single object, under default limits
///
/// # Errors
///
/// Returns an error if the text is malformed, is not an object, or
/// violates a limit.
pub fn parse_object(text: &str) -> Result<Object, Error> {
    parse_object_with_limits(text, &Limits::default())
}

/// Parses JSON text that must be a single object, under the given limits
///
/// # Errors
///
/// Returns an error if the text is malformed, is not an object, or
/// violates a limit.
pub fn parse_object_with_limits(text: &str, limits: &Limits) -> Result<Object, Error> {
    parser::parse_object_root(text, limits)
}
