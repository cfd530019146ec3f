//! Inbound payload decoding.

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;

use crate::Result;
use crate::error::WsError;

/// Outer wire shape: a JSON object that may carry a nested JSON-encoded
/// string under `body`.
#[derive(Debug, Deserialize)]
struct Envelope<'a> {
    #[serde(default, borrow)]
    body: Option<Cow<'a, str>>,
}

/// Decode an inbound payload.
///
/// The payload must be JSON. When a `body` field is present it must hold a
/// JSON-encoded string, which is decoded to validate the frame; the nested
/// value itself is not delivered separately — consumers read `body` off the
/// returned outer value. A frame failing either decode is not dispatched.
pub fn decode(payload: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(payload).map_err(WsError::MessageParse)?;

    let envelope: Envelope<'_> = serde_json::from_str(payload).map_err(WsError::MessageParse)?;
    if let Some(body) = envelope.body {
        let _: Value = serde_json::from_str(&body).map_err(WsError::MessageParse)?;
    }

    Ok(value)
}
