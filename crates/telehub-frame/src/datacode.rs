//! Datacodes: the byte width and numeric interpretation of a value.
//!
//! | symbol | meaning |
//! |---|---|
//! | `0` | no encoding, the token is the value |
//! | `B` / `b` | 1-byte unsigned / signed |
//! | `H` / `h` | 2-byte unsigned / signed |
//! | `L` / `l` | 4-byte unsigned / signed |
//! | `f` | 4-byte IEEE float |
//!
//! Multi-byte values are little-endian, one token per byte.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FrameError;

/// Encoding symbol for one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Datacode {
    /// `0`: pass the numeric token through unchanged.
    #[default]
    Raw,
    /// `B`
    U8,
    /// `b`
    I8,
    /// `H`
    U16,
    /// `h`
    I16,
    /// `L`
    U32,
    /// `l`
    I32,
    /// `f`
    F32,
}

impl Datacode {
    /// Every symbol accepted in settings and node tables.
    pub const ALL: [Datacode; 8] = [
        Datacode::Raw,
        Datacode::I8,
        Datacode::U8,
        Datacode::I16,
        Datacode::U16,
        Datacode::I32,
        Datacode::U32,
        Datacode::F32,
    ];

    /// The single-character symbol.
    pub fn symbol(self) -> char {
        match self {
            Datacode::Raw => '0',
            Datacode::U8 => 'B',
            Datacode::I8 => 'b',
            Datacode::U16 => 'H',
            Datacode::I16 => 'h',
            Datacode::U32 => 'L',
            Datacode::I32 => 'l',
            Datacode::F32 => 'f',
        }
    }

    /// Bytes consumed per value. Zero for [`Datacode::Raw`].
    pub fn width(self) -> usize {
        match self {
            Datacode::Raw => 0,
            Datacode::U8 | Datacode::I8 => 1,
            Datacode::U16 | Datacode::I16 => 2,
            Datacode::U32 | Datacode::I32 | Datacode::F32 => 4,
        }
    }

    pub fn is_raw(self) -> bool {
        self == Datacode::Raw
    }

    /// Decode exactly [`width`](Self::width) little-endian bytes.
    pub fn decode(self, bytes: &[u8]) -> Result<Value, FrameError> {
        let err = || FrameError::Decode { code: self };
        if self.is_raw() || bytes.len() != self.width() {
            return Err(err());
        }

        let value = match self {
            Datacode::U8 => Value::Int(i64::from(bytes[0])),
            Datacode::I8 => Value::Int(i64::from(bytes[0] as i8)),
            Datacode::U16 => Value::Int(i64::from(u16::from_le_bytes(
                bytes.try_into().map_err(|_| err())?,
            ))),
            Datacode::I16 => Value::Int(i64::from(i16::from_le_bytes(
                bytes.try_into().map_err(|_| err())?,
            ))),
            Datacode::U32 => Value::Int(i64::from(u32::from_le_bytes(
                bytes.try_into().map_err(|_| err())?,
            ))),
            Datacode::I32 => Value::Int(i64::from(i32::from_le_bytes(
                bytes.try_into().map_err(|_| err())?,
            ))),
            Datacode::F32 => Value::Float(f64::from(f32::from_le_bytes(
                bytes.try_into().map_err(|_| err())?,
            ))),
            Datacode::Raw => return Err(err()),
        };
        Ok(value)
    }
}

impl fmt::Display for Datacode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Datacode {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Datacode::Raw),
            "B" => Ok(Datacode::U8),
            "b" => Ok(Datacode::I8),
            "H" => Ok(Datacode::U16),
            "h" => Ok(Datacode::I16),
            "L" => Ok(Datacode::U32),
            "l" => Ok(Datacode::I32),
            "f" => Ok(Datacode::F32),
            other => Err(FrameError::UnknownDatacode(other.to_string())),
        }
    }
}

impl Serialize for Datacode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.symbol().to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatacodeRepr {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for Datacode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match DatacodeRepr::deserialize(deserializer)? {
            DatacodeRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            DatacodeRepr::Number(0) => Ok(Datacode::Raw),
            DatacodeRepr::Number(n) => Err(serde::de::Error::custom(format!(
                "unknown datacode {n}"
            ))),
        }
    }
}

/// A decoded numeric reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    /// Interpret a plain numeric token: integer when whole, float otherwise.
    ///
    /// `nan` and `inf` spellings are not numbers here.
    pub fn from_token(token: &str) -> Option<Value> {
        let number: f64 = token.parse().ok().filter(|n: &f64| n.is_finite())?;
        Some(Value::from_f64(number))
    }

    /// Integer when `number` is whole and fits, float otherwise.
    pub fn from_f64(number: f64) -> Value {
        if number.is_finite() && number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
            Value::Int(number as i64)
        } else {
            Value::Float(number)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_symbols() {
        assert_eq!(Datacode::Raw.width(), 0);
        assert_eq!(Datacode::I8.width(), 1);
        assert_eq!(Datacode::U8.width(), 1);
        assert_eq!(Datacode::I16.width(), 2);
        assert_eq!(Datacode::U16.width(), 2);
        assert_eq!(Datacode::I32.width(), 4);
        assert_eq!(Datacode::U32.width(), 4);
        assert_eq!(Datacode::F32.width(), 4);
    }

    #[test]
    fn symbols_parse_back() {
        for code in Datacode::ALL {
            let parsed: Datacode = code.symbol().to_string().parse().unwrap();
            assert_eq!(parsed, code);
        }
        assert!(matches!(
            "x".parse::<Datacode>(),
            Err(FrameError::UnknownDatacode(_))
        ));
    }

    #[test]
    fn signed_and_unsigned_interpretation() {
        assert_eq!(Datacode::U8.decode(&[0xFF]).unwrap(), Value::Int(255));
        assert_eq!(Datacode::I8.decode(&[0xFF]).unwrap(), Value::Int(-1));
        assert_eq!(Datacode::U16.decode(&[0, 230]).unwrap(), Value::Int(58880));
        assert_eq!(Datacode::I16.decode(&[0, 230]).unwrap(), Value::Int(-6656));
        assert_eq!(Datacode::I16.decode(&[23, 45]).unwrap(), Value::Int(11543));
        assert_eq!(
            Datacode::U32.decode(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            Value::Int(4_294_967_295)
        );
        assert_eq!(
            Datacode::I32.decode(&[0xFE, 0xFF, 0xFF, 0xFF]).unwrap(),
            Value::Int(-2)
        );
    }

    #[test]
    fn float_decodes_ieee754() {
        let bytes = 21.5f32.to_le_bytes();
        assert_eq!(Datacode::F32.decode(&bytes).unwrap(), Value::Float(21.5));
    }

    #[test]
    fn wrong_width_is_rejected() {
        assert!(Datacode::I16.decode(&[1]).is_err());
        assert!(Datacode::Raw.decode(&[]).is_err());
    }

    #[test]
    fn plain_tokens_keep_integers_exact() {
        assert_eq!(Value::from_token("23"), Some(Value::Int(23)));
        assert_eq!(Value::from_token("23.0"), Some(Value::Int(23)));
        assert_eq!(Value::from_token("-4.25"), Some(Value::Float(-4.25)));
        assert_eq!(Value::from_token("abc"), None);
    }

    #[test]
    fn deserializes_from_text_or_zero() {
        let code: Datacode = serde_json::from_str("\"h\"").unwrap();
        assert_eq!(code, Datacode::I16);
        let code: Datacode = serde_json::from_str("0").unwrap();
        assert_eq!(code, Datacode::Raw);
        assert!(serde_json::from_str::<Datacode>("\"q\"").is_err());
    }
}
