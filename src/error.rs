//! Typed errors for each pipeline stage.
//!
//! Transport and fetch errors describe a whole API call. Decode and
//! extract errors describe a single capture or source unit; callers log
//! and skip those rather than failing the batch.

use thiserror::Error;

/// A single API call that did not produce a usable JSON body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is missing the `{0}` payload")]
    MissingPayload(&'static str),

    #[error("response payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Outcome of a retried fetch that never succeeded.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("giving up after {attempts} attempt(s): {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: TransportError,
    },
}

/// Why one captured exchange could not be turned into JSON.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("capture entry is malformed: {0}")]
    Exchange(serde_json::Error),

    #[error("body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why one source unit produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
