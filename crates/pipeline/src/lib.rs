//! Per-call turn-taking engine
//!
//! This crate provides the core audio processing for a telephone agent:
//! - Endpoint detection (speech onset and end-of-utterance)
//! - Turn lifecycle with barge-in cancellation
//! - Bounded admission to shared inference resources
//! - Outbound transcoding and real-time pacing

pub mod brain;
pub mod endpoint;
pub mod outbound;
pub mod reflex;
pub mod scheduler;
pub mod stt;
pub mod tts;
pub mod turn;

// Endpoint exports
pub use endpoint::{DetectorConfig, EndpointDetector, EndpointEvent, EnergyModel, SpeechModel};
#[cfg(feature = "onnx")]
pub use endpoint::SileroModel;

// Scheduler exports
pub use scheduler::{ResourcePool, ResourcePools};

// Collaborator exports
pub use brain::{Brain, BrainReply, Response, SimulatedBrain};
pub use reflex::ReflexStore;
pub use stt::{SimulatedTranscriber, Transcriber};
pub use tts::{SimulatedSynthesizer, Synthesizer};

// Outbound exports
pub use outbound::{mulaw, OutboundConfig, OutboundStream, StreamOutcome, StreamResampler};

// Turn exports
pub use turn::{Engines, TurnConfig, TurnController, TurnOutcome};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("endpoint detector error: {0}")]
    Endpoint(String),

    #[error("speech model error: {0}")]
    Model(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("reasoning error: {0}")]
    Reasoning(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("transcode error: {0}")]
    Transcode(String),

    #[error("reflex asset error: {0}")]
    Asset(String),

    #[error("outbound send failed: {0}")]
    Send(String),

    #[error("resource pool closed")]
    PoolClosed,

    #[error("cancelled")]
    Cancelled,
}

impl From<PipelineError> for phone_agent_core::Error {
    fn from(err: PipelineError) -> Self {
        phone_agent_core::Error::Pipeline(err.to_string())
    }
}
