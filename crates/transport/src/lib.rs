//! Transport adapter contract
//!
//! The telephony adapters — the call-control socket client and the
//! media-streaming endpoint — live outside this workspace. This crate
//! defines the boundary they program against: inbound call events
//! pushed into the engine and the outbound audio send primitive.
//!
//! Wire framing (JSON envelopes, base64 payloads, mu-law decode of the
//! inbound leg) is the adapter's concern; the engine only ever sees
//! decoded PCM16 in and transcoded wire bytes out.

pub mod traits;

pub use traits::{AudioSink, CallEvent};

use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("connection closed")]
    Closed,
}

impl From<TransportError> for phone_agent_core::Error {
    fn from(err: TransportError) -> Self {
        phone_agent_core::Error::Transport(err.to_string())
    }
}
