//! Runtime settings contract shared by every reader.
//!
//! Settings arrive as a loosely-typed key/value map (from the hub
//! configuration or a control message). Each key is checked against its
//! predicate; valid changes are committed, invalid values are logged and
//! the previous value stays in force. A key missing from the map falls back
//! to its default.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;
use serde_json::Value;
use telehub_frame::{Datacode, DecodeSettings, PauseMode};
use tracing::{debug, warn};

use crate::error::ReaderError;

/// Candidate settings as received, before validation.
pub type SettingsMap = BTreeMap<String, Value>;

/// Generic settings every reader understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub pause: PauseMode,
    /// Seconds between periodic actions. Zero disables them.
    pub interval: u64,
    /// Default datacode for nodes without a table entry.
    pub datacode: Datacode,
    /// Socket frames carry their own timestamp as the first token.
    pub timestamped: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pause: PauseMode::Off,
            interval: 0,
            datacode: Datacode::Raw,
            timestamped: false,
        }
    }
}

impl Settings {
    pub fn decode_settings(&self) -> DecodeSettings {
        DecodeSettings {
            pause: self.pause,
            datacode: self.datacode,
        }
    }

    /// Apply the generic keys of `candidate`, using `defaults` for missing ones.
    pub fn apply(
        &mut self,
        reader: &str,
        defaults: &Settings,
        candidate: &SettingsMap,
        report: &mut SettingsReport,
    ) {
        apply_key(
            reader,
            "pause",
            candidate,
            defaults.pause,
            parse_pause,
            &mut self.pause,
            report,
        );
        apply_key(
            reader,
            "interval",
            candidate,
            defaults.interval,
            parse_uint,
            &mut self.interval,
            report,
        );
        apply_key(
            reader,
            "datacode",
            candidate,
            defaults.datacode,
            parse_datacode,
            &mut self.datacode,
            report,
        );
        apply_key(
            reader,
            "timestamped",
            candidate,
            defaults.timestamped,
            parse_bool,
            &mut self.timestamped,
            report,
        );
    }
}

/// Outcome of one settings application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsReport {
    /// Keys whose committed value changed.
    pub changed: Vec<&'static str>,
    /// Keys whose candidate failed validation, with the offending value.
    pub rejected: Vec<(String, String)>,
}

impl SettingsReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn changed(&self, key: &str) -> bool {
        self.changed.iter().any(|k| *k == key)
    }

    pub(crate) fn accept(&mut self, key: &'static str) {
        self.changed.push(key);
    }

    pub(crate) fn reject(&mut self, reader: &str, key: &str, value: &Value) {
        let err = ReaderError::SettingRejected {
            reader: reader.to_string(),
            key: key.to_string(),
            value: display_value(value),
        };
        warn!(reader, key, "{err}");
        self.rejected.push((key.to_string(), display_value(value)));
    }
}

/// Resolve one key: missing means default, invalid means keep, equal means skip.
///
/// Returns `true` when the slot was updated.
pub(crate) fn apply_key<T: PartialEq + Debug>(
    reader: &str,
    key: &'static str,
    candidate: &SettingsMap,
    default: T,
    parse: impl Fn(&Value) -> Option<T>,
    slot: &mut T,
    report: &mut SettingsReport,
) -> bool {
    let value = match candidate.get(key) {
        None => default,
        Some(raw) => match parse(raw) {
            Some(value) => value,
            None => {
                report.reject(reader, key, raw);
                return false;
            }
        },
    };
    if *slot == value {
        return false;
    }
    debug!(reader, key, ?value, "setting changed");
    *slot = value;
    report.accept(key);
    true
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `off`, `in`, `out` or `all`, case-insensitive.
pub fn parse_pause(value: &Value) -> Option<PauseMode> {
    value.as_str()?.parse().ok()
}

/// A non-negative integer given as a number or a decimal string.
pub fn parse_uint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        }
        _ => None,
    }
}

/// `true`/`false` as a boolean or a case-insensitive string.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// One of `0 b B h H l L f`; `0` may also be given as a number.
pub fn parse_datacode(value: &Value) -> Option<Datacode> {
    match value {
        Value::Number(n) if n.as_u64() == Some(0) => Some(Datacode::Raw),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list of non-negative integers, as an array or a comma-separated string.
pub fn parse_uint_list(value: &Value) -> Option<Vec<u64>> {
    match value {
        Value::Array(items) => items.iter().map(parse_uint).collect(),
        Value::String(s) => {
            if s.trim().is_empty() {
                return Some(Vec::new());
            }
            s.split(',')
                .map(|part| parse_uint(&Value::String(part.to_string())))
                .collect()
        }
        _ => None,
    }
}
