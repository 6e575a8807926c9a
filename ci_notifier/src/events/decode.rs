//! Pub/Sub payload decoding: base64 → UTF-8 JSON → [`BuildEvent`].

use base64::Engine;

use super::BuildEvent;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("malformed payload: not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("malformed payload: not a build event: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded event together with the JSON text it was decoded from.
/// The raw text is archived as-is so fields this service ignores survive.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub event: BuildEvent,
    pub raw: String,
}

/// Decode the `data` field of a Pub/Sub message.
pub fn decode_event(data: &str) -> Result<DecodedEvent, DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
    let text = std::str::from_utf8(&bytes)?;
    decode_json(text)
}

/// Decode an already base64-decoded build resource.
pub fn decode_json(text: &str) -> Result<DecodedEvent, DecodeError> {
    let event: BuildEvent = serde_json::from_str(text)?;
    Ok(DecodedEvent {
        event,
        raw: text.to_string(),
    })
}
