//! Transcription collaborator contract.

use async_trait::async_trait;

use crate::PipelineError;

/// Speech-to-text over a finalized utterance.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe linear PCM16 audio at `sample_rate`.
    ///
    /// Garbled or empty input yields an empty (or very short) string;
    /// the turn controller treats that as "no utterance".
    async fn transcribe(&self, pcm: &[u8], sample_rate: u32) -> Result<String, PipelineError>;
}

/// Fixed-response transcriber for development and tests.
pub struct SimulatedTranscriber {
    text: String,
}

impl SimulatedTranscriber {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Transcriber for SimulatedTranscriber {
    async fn transcribe(&self, pcm: &[u8], _sample_rate: u32) -> Result<String, PipelineError> {
        if pcm.is_empty() {
            return Ok(String::new());
        }
        Ok(self.text.clone())
    }
}
