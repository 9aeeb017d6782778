//! Per-call identity carried through the pipeline.

use serde::{Deserialize, Serialize};

use crate::audio::AudioEncoding;

/// Identifiers issued by the call registry when a call starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIds {
    /// Registry id for this call session.
    pub call_id: String,
    /// Registry id for the caller profile.
    pub caller_id: String,
}

/// One phone call as seen by the turn-taking engine.
///
/// Owned exclusively by the call's turn controller from stream attach
/// until hangup.
#[derive(Debug, Clone)]
pub struct CallSession {
    /// Opaque call identifier from the telephony layer.
    pub call_uuid: String,
    /// Caller number (or hash of it) as reported by the transport.
    pub phone: String,
    /// Identifiers issued by the registry at call start.
    pub ids: CallIds,
    /// Inbound sample rate for this leg (8000 or 16000 Hz).
    pub sample_rate: u32,
    /// Outbound wire encoding for this leg.
    pub encoding: AudioEncoding,
}
