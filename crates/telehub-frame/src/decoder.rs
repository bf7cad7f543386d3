use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::datacode::{Datacode, Value};
use crate::error::{FrameError, Result};
use crate::frame::{DecodedFrame, PauseMode, RawFrame};
use crate::nodes::{CodecFacts, NodeEncoding};
use crate::validate::FrameValidator;

/// The slice of reader settings the decode pipeline consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeSettings {
    pub pause: PauseMode,
    /// Reader default used when the node table has no entry.
    pub datacode: Datacode,
}

/// Current Unix time rounded to hundredths of a second.
pub fn now_timestamp() -> f64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    (secs * 100.0).round() / 100.0
}

/// Turns raw lines into [`DecodedFrame`]s for one reader.
///
/// Owns the reader's reference counter; every frame that gets past the
/// input pause check consumes one reference number, accepted or not.
pub struct FrameDecoder {
    reader: String,
    counter: u64,
    codec: Arc<dyn CodecFacts>,
}

impl FrameDecoder {
    pub fn new(reader: impl Into<String>, codec: Arc<dyn CodecFacts>) -> Self {
        Self {
            reader: reader.into(),
            counter: 0,
            codec,
        }
    }

    /// Run the full pipeline on one raw frame.
    ///
    /// Returns `None` when the frame is paused, rejected or suppressed on
    /// output. Rejections are logged with the frame's reference number.
    pub fn decode(
        &mut self,
        raw: &RawFrame,
        settings: &DecodeSettings,
        validator: &dyn FrameValidator,
    ) -> Option<DecodedFrame> {
        if settings.pause.blocks_input() {
            return None;
        }

        self.counter += 1;
        let reference = self.counter;
        let timestamp = raw.timestamp.unwrap_or_else(now_timestamp);

        debug!(reader = %self.reader, reference, timestamp, frame = %raw.line, "new frame");

        let tokens: Vec<String> = raw.line.split_whitespace().map(str::to_string).collect();
        let result = validator
            .validate(reference, tokens)
            .and_then(|validated| {
                let (node, values) = self.decode_tokens(&validated.tokens, settings.datacode)?;
                Ok((node, values, validated.signal_quality))
            });

        let (node, values, signal_quality) = match result {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(
                    reader = %self.reader,
                    reference,
                    frame = %raw.line,
                    reason = %err,
                    "discarded frame"
                );
                return None;
            }
        };

        debug!(reader = %self.reader, reference, timestamp, node, ?values, "decoded frame");
        if let Some(signal) = signal_quality {
            debug!(reader = %self.reader, reference, signal, "signal quality");
        }

        if settings.pause.blocks_output() {
            return None;
        }

        Some(DecodedFrame {
            reader: self.reader.clone(),
            timestamp,
            node,
            values,
            signal_quality,
            reference,
        })
    }

    /// Decode validated tokens (`node v1 .. vn`) into a node id and values.
    pub fn decode_tokens(
        &self,
        tokens: &[String],
        default_code: Datacode,
    ) -> Result<(u32, Vec<Value>)> {
        let (node_token, payload) = tokens.split_first().ok_or(FrameError::TooShort)?;
        let node = parse_node(node_token)?;

        let values = match self.codec.node_encoding(node) {
            Some(NodeEncoding::PerValue(codes)) => decode_per_value(payload, &codes)?,
            Some(NodeEncoding::Single(code)) => decode_single(payload, code)?,
            None => decode_single(payload, default_code)?,
        };
        Ok((node, values))
    }

    /// References handed out so far.
    pub fn frames_seen(&self) -> u64 {
        self.counter
    }

    pub fn reader(&self) -> &str {
        &self.reader
    }
}

fn parse_node(token: &str) -> Result<u32> {
    let invalid = || FrameError::InvalidNode {
        token: token.to_string(),
    };
    let number: f64 = token.parse().map_err(|_| invalid())?;
    if number.fract() != 0.0 || number < 0.0 || number > f64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(number as u32)
}

fn decode_single(payload: &[String], code: Datacode) -> Result<Vec<Value>> {
    if code.is_raw() {
        return payload
            .iter()
            .map(|token| {
                Value::from_token(token).ok_or_else(|| FrameError::NonNumeric {
                    token: token.clone(),
                })
            })
            .collect();
    }

    if payload.len() % code.width() != 0 {
        return Err(FrameError::NotMultiple {
            len: payload.len(),
            code,
        });
    }

    let bytes = payload_bytes(payload, code)?;
    bytes
        .chunks_exact(code.width())
        .map(|chunk| code.decode(chunk))
        .collect()
}

fn decode_per_value(payload: &[String], codes: &[Datacode]) -> Result<Vec<Value>> {
    let expected: usize = codes.iter().map(|c| c.width()).sum();
    if payload.len() != expected {
        return Err(FrameError::LengthMismatch {
            len: payload.len(),
            expected,
            codes: codes.iter().map(|c| c.symbol()).collect(),
        });
    }

    let mut values = Vec::with_capacity(codes.len());
    let mut pos = 0usize;
    for &code in codes {
        let size = code.width();
        let bytes = payload_bytes(&payload[pos..pos + size], code)?;
        values.push(code.decode(&bytes)?);
        pos += size;
    }
    Ok(values)
}

/// Each payload token must be one byte value (0-255).
fn payload_bytes(tokens: &[String], code: Datacode) -> Result<Vec<u8>> {
    tokens
        .iter()
        .map(|t| t.parse::<u8>().map_err(|_| FrameError::Decode { code }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeTable;
    use crate::validate::{validate_generic, GenericValidator, Validated};

    fn decoder(table: NodeTable) -> FrameDecoder {
        FrameDecoder::new("test", Arc::new(table))
    }

    fn raw(line: &str) -> RawFrame {
        RawFrame::at(line, 1_700_000_000.25)
    }

    fn settings(code: Datacode) -> DecodeSettings {
        DecodeSettings {
            pause: PauseMode::Off,
            datacode: code,
        }
    }

    #[test]
    fn plain_values_without_datacode() {
        let mut dec = decoder(NodeTable::new());
        let frame = dec
            .decode(&raw("10 23 45"), &settings(Datacode::Raw), &GenericValidator)
            .unwrap();
        assert_eq!(frame.node, 10);
        assert_eq!(frame.values, vec![Value::Int(23), Value::Int(45)]);
        assert_eq!(frame.timestamp, 1_700_000_000.25);
        assert_eq!(frame.signal_quality, None);
        assert_eq!(frame.reference, 1);
    }

    #[test]
    fn plain_values_keep_fractions() {
        let mut dec = decoder(NodeTable::new());
        let frame = dec
            .decode(&raw("4 1.5 -2"), &settings(Datacode::Raw), &GenericValidator)
            .unwrap();
        assert_eq!(frame.values, vec![Value::Float(1.5), Value::Int(-2)]);
    }

    #[test]
    fn single_short_frames_are_rejected() {
        let mut dec = decoder(NodeTable::new());
        for line in ["", "10", "   "] {
            assert!(dec
                .decode(&raw(line), &settings(Datacode::Raw), &GenericValidator)
                .is_none());
        }
    }

    #[test]
    fn non_numeric_frames_are_rejected() {
        let mut dec = decoder(NodeTable::new());
        assert!(dec
            .decode(&raw("10 abc 4"), &settings(Datacode::Raw), &GenericValidator)
            .is_none());
        assert!(dec
            .decode(&raw("x 1 4"), &settings(Datacode::Raw), &GenericValidator)
            .is_none());
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut dec = decoder(NodeTable::new());
        assert!(dec
            .decode(&raw("10 nan inf"), &settings(Datacode::Raw), &GenericValidator)
            .is_none());
        assert!(dec
            .decode(&raw("10 1 -inf"), &settings(Datacode::Raw), &GenericValidator)
            .is_none());
    }

    #[test]
    fn fractional_node_is_rejected() {
        let dec = decoder(NodeTable::new());
        let err = dec
            .decode_tokens(&["1.5".to_string(), "2".to_string()], Datacode::Raw)
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidNode { .. }));
    }

    #[test]
    fn reader_datacode_two_byte_signed() {
        let mut dec = decoder(NodeTable::new());
        let frame = dec
            .decode(&raw("10 0 230"), &settings(Datacode::I16), &GenericValidator)
            .unwrap();
        assert_eq!(frame.values, vec![Value::Int(-6656)]);
    }

    #[test]
    fn odd_payload_for_two_byte_code_is_rejected() {
        let dec = decoder(NodeTable::new());
        let tokens: Vec<String> = ["10", "230"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            dec.decode_tokens(&tokens, Datacode::I16),
            Err(FrameError::NotMultiple {
                len: 1,
                code: Datacode::I16
            })
        );
    }

    #[test]
    fn single_code_value_count_is_len_over_width() {
        let dec = decoder(NodeTable::new().with_datacode(5, Datacode::U32));
        let tokens: Vec<String> = "5 1 0 0 0 2 0 0 0 255 255 255 255"
            .split(' ')
            .map(str::to_string)
            .collect();
        let (node, values) = dec.decode_tokens(&tokens, Datacode::Raw).unwrap();
        assert_eq!(node, 5);
        assert_eq!(
            values,
            vec![Value::Int(1), Value::Int(2), Value::Int(4_294_967_295)]
        );
    }

    #[test]
    fn node_single_code_overrides_reader_default() {
        let dec = decoder(NodeTable::new().with_datacode(7, Datacode::Raw));
        let tokens: Vec<String> = ["7", "300", "1.25"].iter().map(|s| s.to_string()).collect();
        let (_, values) = dec.decode_tokens(&tokens, Datacode::I16).unwrap();
        assert_eq!(values, vec![Value::Int(300), Value::Float(1.25)]);
    }

    #[test]
    fn per_value_list_requires_exact_length() {
        let dec = decoder(
            NodeTable::new().with_datacodes(10, vec![Datacode::I16, Datacode::U8, Datacode::I8]),
        );
        let short: Vec<String> = "10 1 0 2".split(' ').map(str::to_string).collect();
        assert!(matches!(
            dec.decode_tokens(&short, Datacode::Raw),
            Err(FrameError::LengthMismatch {
                len: 3,
                expected: 4,
                ..
            })
        ));

        let long: Vec<String> = "10 1 0 2 3 4".split(' ').map(str::to_string).collect();
        assert!(dec.decode_tokens(&long, Datacode::Raw).is_err());

        let exact: Vec<String> = "10 1 0 2 255".split(' ').map(str::to_string).collect();
        let (_, values) = dec.decode_tokens(&exact, Datacode::Raw).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(-1)]);
    }

    #[test]
    fn out_of_range_byte_rejects_whole_frame() {
        let dec = decoder(NodeTable::new());
        let tokens: Vec<String> = "10 0 256".split(' ').map(str::to_string).collect();
        assert_eq!(
            dec.decode_tokens(&tokens, Datacode::U16),
            Err(FrameError::Decode {
                code: Datacode::U16
            })
        );
        let tokens: Vec<String> = "10 1.5 2".split(' ').map(str::to_string).collect();
        assert!(dec.decode_tokens(&tokens, Datacode::U16).is_err());
    }

    #[test]
    fn float_datacode() {
        let dec = decoder(NodeTable::new().with_datacode(9, Datacode::F32));
        let mut tokens = vec!["9".to_string()];
        tokens.extend(21.5f32.to_le_bytes().iter().map(|b| b.to_string()));
        let (_, values) = dec.decode_tokens(&tokens, Datacode::Raw).unwrap();
        assert_eq!(values, vec![Value::Float(21.5)]);
    }

    #[test]
    fn pause_in_skips_before_reference_assignment() {
        let mut dec = decoder(NodeTable::new());
        let paused = DecodeSettings {
            pause: PauseMode::In,
            datacode: Datacode::Raw,
        };
        assert!(dec.decode(&raw("1 2"), &paused, &GenericValidator).is_none());
        let paused_all = DecodeSettings {
            pause: PauseMode::All,
            ..paused
        };
        assert!(dec.decode(&raw("1 2"), &paused_all, &GenericValidator).is_none());
        assert_eq!(dec.frames_seen(), 0);
    }

    #[test]
    fn pause_out_decodes_but_suppresses() {
        let mut dec = decoder(NodeTable::new());
        let paused = DecodeSettings {
            pause: PauseMode::Out,
            datacode: Datacode::Raw,
        };
        assert!(dec.decode(&raw("1 2"), &paused, &GenericValidator).is_none());
        assert_eq!(dec.frames_seen(), 1);

        let frame = dec
            .decode(&raw("1 2"), &settings(Datacode::Raw), &GenericValidator)
            .unwrap();
        assert_eq!(frame.reference, 2);
    }

    #[test]
    fn references_increase_across_rejections() {
        let mut dec = decoder(NodeTable::new());
        let s = settings(Datacode::Raw);
        let a = dec.decode(&raw("1 2"), &s, &GenericValidator).unwrap();
        assert!(dec.decode(&raw("bad"), &s, &GenericValidator).is_none());
        let b = dec.decode(&raw("1 3"), &s, &GenericValidator).unwrap();
        assert_eq!((a.reference, b.reference), (1, 3));
    }

    #[test]
    fn missing_timestamp_uses_rounded_now() {
        let mut dec = decoder(NodeTable::new());
        let frame = dec
            .decode(&RawFrame::new("1 2"), &settings(Datacode::Raw), &GenericValidator)
            .unwrap();
        let hundredths = frame.timestamp * 100.0;
        assert!((hundredths - hundredths.round()).abs() < 1e-3);
        assert!(frame.timestamp > 1_600_000_000.0);
    }

    struct SignalValidator;

    impl FrameValidator for SignalValidator {
        fn validate(&self, _reference: u64, mut tokens: Vec<String>) -> Result<Validated> {
            let signal = tokens.pop().and_then(|t| t.parse().ok());
            Ok(Validated {
                tokens: validate_generic(tokens)?,
                signal_quality: signal,
            })
        }
    }

    #[test]
    fn validator_signal_is_attached() {
        let mut dec = decoder(NodeTable::new());
        let frame = dec
            .decode(&raw("3 4 -70"), &settings(Datacode::Raw), &SignalValidator)
            .unwrap();
        assert_eq!(frame.values, vec![Value::Int(4)]);
        assert_eq!(frame.signal_quality, Some(-70));
    }
}
