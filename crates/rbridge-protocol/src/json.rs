//! proto3 JSON encodings that serde does not produce on its own.
//!
//! - 64-bit integers are written as decimal strings; bare numbers are still
//!   accepted on input.
//! - Non-finite doubles are written as `"NaN"`, `"Infinity"` and
//!   `"-Infinity"`; serde_json would otherwise emit `null`.

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

/// `#[serde(with = "crate::json::uint64")]`
pub mod uint64 {
    use super::*;

    pub fn serialize<S: Serializer>(n: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(n)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match NumberOrText::<u64>::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid uint64 `{s}`"))),
        }
    }
}

/// `#[serde(with = "crate::json::double")]`
pub mod double {
    use super::*;

    pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if n.is_nan() {
            serializer.serialize_str("NaN")
        } else if n.is_infinite() {
            serializer.serialize_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*n)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match NumberOrText::<f64>::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => other
                    .trim()
                    .parse()
                    .map_err(|_| de::Error::custom(format!("invalid double `{other}`"))),
            },
        }
    }
}

/// A double carried in an optional field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Double(pub f64);

impl Serialize for Double {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        double::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Double {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        double::deserialize(deserializer).map(Double)
    }
}
