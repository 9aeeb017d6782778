//! Synthesis collaborator contract.

use async_trait::async_trait;

use crate::PipelineError;

/// Text-to-speech synthesis.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` as a normalized waveform in [-1, 1] at
    /// `sample_rate`, or `None` when nothing can be rendered.
    async fn synthesize(
        &self,
        text: &str,
        sample_rate: u32,
    ) -> Result<Option<Vec<f32>>, PipelineError>;
}

/// Tone generator standing in for a real synthesis backend.
pub struct SimulatedSynthesizer {
    /// Tone frequency in Hz.
    freq: f32,
    /// Rendered duration per input character, in ms.
    ms_per_char: u32,
}

impl SimulatedSynthesizer {
    pub fn new() -> Self {
        Self {
            freq: 440.0,
            ms_per_char: 50,
        }
    }
}

impl Default for SimulatedSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for SimulatedSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        sample_rate: u32,
    ) -> Result<Option<Vec<f32>>, PipelineError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let samples =
            text.chars().count() * (sample_rate as usize * self.ms_per_char as usize / 1000);
        let step = 2.0 * std::f32::consts::PI * self.freq / sample_rate as f32;
        Ok(Some(
            (0..samples).map(|i| (i as f32 * step).sin() * 0.5).collect(),
        ))
    }
}
