use crate::datacode::Value;
use crate::error::{FrameError, Result};

/// Tokens that passed validation, plus anything the transport extracted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Validated {
    /// Node id followed by the payload tokens.
    pub tokens: Vec<String>,
    /// Signal strength stripped from the frame by the transport.
    pub signal_quality: Option<i32>,
}

/// Structural checks applied to a tokenized frame before decoding.
///
/// Transports that embed protocol tokens override [`validate`](Self::validate),
/// strip what they own and then call [`validate_generic`].
pub trait FrameValidator {
    fn validate(&self, reference: u64, tokens: Vec<String>) -> Result<Validated> {
        let _ = reference;
        Ok(Validated {
            tokens: validate_generic(tokens)?,
            signal_quality: None,
        })
    }
}

/// Validator for transports that carry plain `node v1 v2 ...` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericValidator;

impl FrameValidator for GenericValidator {}

/// Require at least two tokens, all finite numbers.
pub fn validate_generic(tokens: Vec<String>) -> Result<Vec<String>> {
    if tokens.len() < 2 {
        return Err(FrameError::TooShort);
    }
    if let Some(bad) = tokens.iter().find(|t| Value::from_token(t).is_none()) {
        return Err(FrameError::NonNumeric { token: bad.clone() });
    }
    Ok(tokens)
}
