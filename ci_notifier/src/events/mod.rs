//! Inbound Cloud Build events.
//!
//! A build event arrives as base64-encoded JSON inside a Pub/Sub message.
//! Decoding never validates the status or the repo identity; that is left to
//! the notification filter so unknown fields and values never abort processing.

pub mod build;
pub mod decode;

pub use build::{BuildEvent, BuildStatus};
pub use decode::{decode_event, decode_json, DecodeError, DecodedEvent};
