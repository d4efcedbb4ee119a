//! Payload rejection reasons
//!
//! Every inbound message that is not acted upon ends up as one of these and
//! gets logged at the bridge. None of them propagate further.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    /// Not valid JSON at all
    #[error("malformed json: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required sensor field is absent
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// A required sensor field is present but not a finite number
    #[error("field '{field}' is not a finite number (got {got})")]
    InvalidField { field: &'static str, got: String },

    /// Client message matches neither feed shape
    #[error("unrecognized command: {0}")]
    Unrecognized(String),
}

impl PayloadError {
    /// parse failures are errors, shape problems are warnings
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}
