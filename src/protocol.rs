//! Host command protocol.
//!
//! Frames are ASCII lines beginning with `#`:
//!
//! | Host sends | Meaning                               | Controller answers       |
//! |------------|---------------------------------------|--------------------------|
//! | `#NN`      | set target to NN (0, or 10-50)        | `NN` once it is applied  |
//! | `#?`       | read the bolus temperature            | `#T.t`                   |
//!
//! Anything else is dropped without a reply.

use log::debug;

use crate::setpoint::Setpoint;
use crate::temperature::format_celsius;

/// Start of every frame.
pub const FRAME_MARKER: char = '#';
/// Follows the marker in a temperature query.
pub const QUERY_MARKER: char = '?';

/// Outcome of decoding one poll of the host link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// Nothing was pending this cycle.
    NoInput,
    /// `#?`: the host wants the current bolus temperature.
    Query,
    /// `#NN` with a legal value.
    SetpointRequest(i32),
    /// Malformed or out-of-range frame.
    Invalid(FrameError),
}

/// Why a frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The first non-blank character was not `#`.
    #[error("frame does not start with '#'")]
    MissingMarker,

    /// The frame bytes were not valid UTF-8.
    #[error("frame is not valid ASCII")]
    NotUtf8,

    /// The payload after `#` is not an integer.
    #[error("payload {0:?} is not a number")]
    NotNumeric(String),

    /// The payload is a number but neither 0 nor inside the active range.
    #[error("setpoint {0} out of range")]
    OutOfRange(i32),
}

/// Decode one raw frame from the host.
///
/// Surrounding whitespace is trimmed before the marker is inspected. An empty
/// (or all-blank) frame is treated as no input rather than as an error.
pub fn parse(raw: &[u8]) -> ParseResult {
    let Ok(text) = std::str::from_utf8(raw) else {
        debug!("dropping frame {:x?}: not utf-8", raw);
        return ParseResult::Invalid(FrameError::NotUtf8);
    };

    let text = text.trim();
    if text.is_empty() {
        return ParseResult::NoInput;
    }

    let result = parse_frame(text);
    if let ParseResult::Invalid(err) = &result {
        debug!("dropping frame {:?}: {}", text, err);
    }
    result
}

fn parse_frame(text: &str) -> ParseResult {
    let Some(payload) = text.strip_prefix(FRAME_MARKER) else {
        return ParseResult::Invalid(FrameError::MissingMarker);
    };

    if payload.starts_with(QUERY_MARKER) {
        return ParseResult::Query;
    }

    match payload.parse::<i32>() {
        Ok(value) if Setpoint::is_valid(value) => ParseResult::SetpointRequest(value),
        Ok(value) => ParseResult::Invalid(FrameError::OutOfRange(value)),
        Err(_) => ParseResult::Invalid(FrameError::NotNumeric(payload.to_string())),
    }
}

/// Reply line for a `#?` query.
pub fn format_temperature_reply(celsius: f32) -> String {
    format!("{}{}", FRAME_MARKER, format_celsius(celsius))
}

/// Acknowledgement line for an applied setpoint.
pub fn format_echo(setpoint: Setpoint) -> String {
    setpoint.to_string()
}
