use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datacode::Value;

/// One undelimited line taken from a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// The line without its delimiter.
    pub line: String,
    /// Timestamp supplied by the transport; `None` means "now".
    pub timestamp: Option<f64>,
}

impl RawFrame {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            timestamp: None,
        }
    }

    pub fn at(line: impl Into<String>, timestamp: f64) -> Self {
        Self {
            line: line.into(),
            timestamp: Some(timestamp),
        }
    }
}

/// A validated, decoded frame ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFrame {
    /// Name of the reader that produced the frame.
    pub reader: String,
    /// Unix seconds, rounded to hundredths unless supplied by the source.
    pub timestamp: f64,
    pub node: u32,
    pub values: Vec<Value>,
    /// Signal strength reported by the radio, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_quality: Option<i32>,
    /// Per-reader increasing reference number.
    pub reference: u64,
}

impl DecodedFrame {
    /// Flatten to `[timestamp, node, values.., signal_quality?, reference]`.
    pub fn to_row(&self) -> Vec<Value> {
        let mut row = Vec::with_capacity(self.values.len() + 4);
        row.push(Value::Float(self.timestamp));
        row.push(Value::Int(i64::from(self.node)));
        row.extend(self.values.iter().copied());
        if let Some(signal) = self.signal_quality {
            row.push(Value::Int(i64::from(signal)));
        }
        row.push(Value::Int(self.reference as i64));
        row
    }
}

/// Reader-level flag that suppresses input, output or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseMode {
    #[default]
    Off,
    /// Drop frames before decoding.
    In,
    /// Decode frames but do not emit them.
    Out,
    /// Both `In` and `Out`.
    All,
}

impl PauseMode {
    pub fn blocks_input(self) -> bool {
        matches!(self, PauseMode::All | PauseMode::In)
    }

    pub fn blocks_output(self) -> bool {
        matches!(self, PauseMode::All | PauseMode::Out)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PauseMode::Off => "off",
            PauseMode::In => "in",
            PauseMode::Out => "out",
            PauseMode::All => "all",
        }
    }
}

impl fmt::Display for PauseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PauseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(PauseMode::Off),
            "in" => Ok(PauseMode::In),
            "out" => Ok(PauseMode::Out),
            "all" => Ok(PauseMode::All),
            other => Err(format!("invalid pause mode {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_layout_with_signal() {
        let frame = DecodedFrame {
            reader: "rfm".to_string(),
            timestamp: 1.5,
            node: 10,
            values: vec![Value::Int(23), Value::Int(45)],
            signal_quality: Some(-62),
            reference: 7,
        };
        assert_eq!(
            frame.to_row(),
            vec![
                Value::Float(1.5),
                Value::Int(10),
                Value::Int(23),
                Value::Int(45),
                Value::Int(-62),
                Value::Int(7)
            ]
        );
    }

    #[test]
    fn row_layout_without_signal() {
        let frame = DecodedFrame {
            reader: "ser".to_string(),
            timestamp: 2.0,
            node: 3,
            values: vec![Value::Float(0.5)],
            signal_quality: None,
            reference: 1,
        };
        assert_eq!(frame.to_row().len(), 4);
    }

    #[test]
    fn pause_modes() {
        assert!(PauseMode::All.blocks_input() && PauseMode::All.blocks_output());
        assert!(PauseMode::In.blocks_input() && !PauseMode::In.blocks_output());
        assert!(!PauseMode::Out.blocks_input() && PauseMode::Out.blocks_output());
        assert!(!PauseMode::Off.blocks_input() && !PauseMode::Off.blocks_output());
        assert_eq!("ALL".parse::<PauseMode>(), Ok(PauseMode::All));
        assert!("sometimes".parse::<PauseMode>().is_err());
    }
}
