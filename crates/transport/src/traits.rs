//! Boundary traits between the engine and telephony adapters.

use async_trait::async_trait;

use phone_agent_core::AudioEncoding;

use crate::TransportError;

/// Inbound event from a transport adapter.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// A media stream attached for a new call.
    Started {
        /// Opaque call identifier from the telephony layer.
        call_uuid: String,
        /// Caller number as reported by signaling.
        phone: String,
        /// Sample rate of the decoded inbound audio.
        sample_rate: u32,
        /// Encoding the wire expects on the outbound leg.
        encoding: AudioEncoding,
    },
    /// Decoded PCM16 audio at the call's inbound rate.
    Audio {
        call_uuid: String,
        chunk: Vec<u8>,
    },
    /// The call hung up or the stream dropped.
    Ended { call_uuid: String },
}

/// Outbound audio delivery to the remote leg.
///
/// The engine hands over fully transcoded wire bytes at real-time
/// cadence; implementations only frame them for their protocol.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn send_audio(&self, frame: &[u8]) -> Result<(), TransportError>;
}
