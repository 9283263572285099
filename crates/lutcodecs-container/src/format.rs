//! The on-disk layout of a container.
//!
//! ```text
//! offset 0      magic bytes b"LUTC"
//! offset 4      u8 format version
//! offset 5      u64 little-endian header length H
//! offset 13     H bytes of JSON header
//! offset 13 + H payload section
//! ```
//!
//! The payload section holds the encoded bytes of every variable, back to
//! back in declaration order. Each variable's header entry records where its
//! payload starts, relative to the start of the payload section.

use indexmap::IndexMap;
use lutcodecs::AnyArrayDType;
use serde::{Deserialize, Serialize};

use crate::Filter;

/// The magic bytes every container starts with
pub const MAGIC: [u8; 4] = *b"LUTC";

/// The container format version written by this crate
pub const VERSION: u8 = 1;

/// The length of the fixed-size preamble before the header
pub const PREAMBLE_LEN: usize = MAGIC.len() + 1 + 8;

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub groups: IndexMap<String, GroupHeader>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupHeader {
    pub attributes: IndexMap<String, AttributeValue>,
    pub dimensions: IndexMap<String, usize>,
    pub variables: IndexMap<String, VariableHeader>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableHeader {
    pub dtype: AnyArrayDType,
    pub dimensions: Vec<String>,
    pub filters: Vec<Filter>,
    pub payload: PayloadHeader,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadHeader {
    pub dtype: AnyArrayDType,
    pub shape: Vec<usize>,
    pub offset: u64,
    pub len: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// The value of a group attribute
pub enum AttributeValue {
    /// A single string
    Text(String),
    /// A single number
    Number(f64),
    /// A list of strings
    TextList(Vec<String>),
}

impl AttributeValue {
    #[must_use]
    /// Returns the list of strings if the attribute is a string list.
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(list) => Some(list),
            Self::Text(_) | Self::Number(_) => None,
        }
    }

    #[must_use]
    /// Returns the string if the attribute is a single string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) | Self::TextList(_) => None,
        }
    }

    #[must_use]
    /// Returns the number if the attribute is a single number.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(_) | Self::TextList(_) => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self {
        Self::Text(String::from(text))
    }
}

impl From<f64> for AttributeValue {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(list: Vec<String>) -> Self {
        Self::TextList(list)
    }
}
