//! Endpoint detection
//!
//! Classifies the inbound audio stream into speech and non-speech and
//! emits discrete events: speech onset (the barge-in signal) and
//! completed utterances ready for transcription.

mod detector;
mod model;
#[cfg(feature = "onnx")]
mod silero;

pub use detector::{DetectorConfig, EndpointDetector, EndpointEvent};
pub use model::{EnergyModel, SpeechModel};
#[cfg(feature = "onnx")]
pub use silero::SileroModel;
