// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records flowing through a pipeline and the mode describing their representation.
use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

/// Representation of every record inside one pipeline.
///
/// A pipeline is either fully raw or fully structured for its whole lifetime. The mode is
/// decided at construction time and never inferred from the data itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Records are opaque byte chunks.
    #[default]
    Raw,

    /// Records are structured values, for example parsed log entries.
    Structured,
}

impl Mode {
    pub fn is_structured(&self) -> bool {
        matches!(self, Mode::Structured)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Raw => write!(f, "raw"),
            Mode::Structured => write!(f, "structured"),
        }
    }
}

/// Unit of data flowing through a pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Raw(Vec<u8>),
    Structured(Value),
}

impl Record {
    pub fn mode(&self) -> Mode {
        match self {
            Record::Raw(_) => Mode::Raw,
            Record::Structured(_) => Mode::Structured,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Record::Raw(bytes) => Some(bytes),
            Record::Structured(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Record::Raw(_) => None,
            Record::Structured(value) => Some(value),
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Record::Raw(bytes) => Some(bytes),
            Record::Structured(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Record::Raw(_) => None,
            Record::Structured(value) => Some(value),
        }
    }

    /// Text form of this record, as seen by text-matching patterns.
    ///
    /// Raw chunks are decoded as UTF-8, replacing invalid sequences. Structured values are
    /// rendered as compact JSON, with plain strings returned without quotes.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Record::Raw(bytes) => String::from_utf8_lossy(bytes),
            Record::Structured(Value::String(text)) => Cow::Borrowed(text),
            Record::Structured(value) => Cow::Owned(value.to_string()),
        }
    }
}

impl From<Vec<u8>> for Record {
    fn from(bytes: Vec<u8>) -> Self {
        Record::Raw(bytes)
    }
}

impl From<&[u8]> for Record {
    fn from(bytes: &[u8]) -> Self {
        Record::Raw(bytes.to_vec())
    }
}

impl From<String> for Record {
    fn from(text: String) -> Self {
        Record::Raw(text.into_bytes())
    }
}

impl From<&str> for Record {
    fn from(text: &str) -> Self {
        Record::Raw(text.as_bytes().to_vec())
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record::Structured(value)
    }
}
