//! Metadata values attached to the time vector and to channels.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata map: info key (e.g. `"Unit"`) to value.
pub type InfoMap = BTreeMap<String, InfoValue>;

/// A single metadata value.
///
/// Metadata is descriptive only (units, colors, descriptions) and never
/// takes part in numeric processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value, e.g. a point count.
    Integer(i64),
    /// Floating-point value.
    Number(f64),
    /// Free text, e.g. a unit.
    Text(String),
    /// Numeric list, e.g. an RGB color.
    List(Vec<f64>),
}

impl InfoValue {
    /// Return the text content, if this is a [`InfoValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer content, if this is a [`InfoValue::Integer`].
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Return the value as a float for [`InfoValue::Number`] and [`InfoValue::Integer`].
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::List(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&str> for InfoValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for InfoValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for InfoValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for InfoValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for InfoValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<f64>> for InfoValue {
    fn from(value: Vec<f64>) -> Self {
        Self::List(value)
    }
}
