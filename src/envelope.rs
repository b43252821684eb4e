//! Inbound message envelope.
//!
//! The broker subscription lives outside this crate; whatever receives the
//! raw payload hands it to
//! [`AdmissionDispatcher::handle_message`](crate::AdmissionDispatcher::handle_message),
//! which parses this envelope and routes by method.

use serde::Deserialize;
use serde_json::Value;

/// A `{method, data}` message from the inbound broker topic.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Requested operation; only `"create"` is routed.
    pub method: String,
    /// Opaque payload forwarded to the booking collaborator untouched.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Parses a raw JSON payload.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
