/*
[INPUT]:  JSON scalars that carry numbers either quoted ("123.45") or bare (123.45)
[OUTPUT]: Canonical f64 / i64 values
[POS]:    Data layer - tolerant numeric decoding shared by every result type
[UPDATE]: When the exchange starts encoding another numeric field differently
*/

//! Bitstamp is inconsistent, field by field and release by release, about
//! quoting numbers. Every numeric field of every result shape goes through
//! the visitors below so call sites never special-case the encoding.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::http::{BitstampError, Result};

/// Decode the textual form of a JSON scalar into an `f64`.
///
/// Surrounding quote characters are stripped unconditionally.
pub fn decode_f64(raw: &str) -> Result<f64> {
    let trimmed = raw.trim_matches('"');
    trimmed
        .parse::<f64>()
        .map_err(|err| BitstampError::malformed(format!("invalid float {trimmed:?}: {err}"), raw))
}

/// Decode the textual form of a JSON scalar into an `i64`.
pub fn decode_i64(raw: &str) -> Result<i64> {
    let trimmed = raw.trim_matches('"');
    trimmed
        .parse::<i64>()
        .map_err(|err| BitstampError::malformed(format!("invalid integer {trimmed:?}: {err}"), raw))
}

/// `f64` that deserializes from a JSON string or a JSON number
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Float(pub f64);

impl From<Float> for f64 {
    fn from(value: Float) -> Self {
        value.0
    }
}

/// `i64` that deserializes from a JSON string or a JSON number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Integer(pub i64);

impl From<Integer> for i64 {
    fn from(value: Integer) -> Self {
        value.0
    }
}

struct FloatVisitor;

impl Visitor<'_> for FloatVisitor {
    type Value = Float;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a string containing a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Float, E> {
        decode_f64(v).map(Float).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Float, E> {
        Ok(Float(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Float, E> {
        Ok(Float(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Float, E> {
        Ok(Float(v as f64))
    }
}

struct IntegerVisitor;

impl Visitor<'_> for IntegerVisitor {
    type Value = Integer;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer or a string containing an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Integer, E> {
        decode_i64(v).map(Integer).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Integer, E> {
        Ok(Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Integer, E> {
        i64::try_from(v)
            .map(Integer)
            .map_err(|_| E::custom(format!("integer {v} out of range")))
    }
}

impl<'de> Deserialize<'de> for Float {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }
}

impl<'de> Deserialize<'de> for Integer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(IntegerVisitor)
    }
}

pub fn deserialize_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Float::deserialize(deserializer).map(f64::from)
}

pub fn deserialize_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Integer::deserialize(deserializer).map(i64::from)
}

/// Absent and `null` both decode to `None`
pub fn deserialize_option_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Integer>::deserialize(deserializer).map(|value| value.map(i64::from))
}
