//! Speech probability models for the endpoint detector.

use crate::PipelineError;

/// Frame-level speech probability model.
///
/// Implementations may carry recurrent state across windows; `reset`
/// zeroes it. One instance serves exactly one call and is only ever
/// driven from that call's ingestion task.
pub trait SpeechModel: Send {
    /// Score one analysis window of normalized f32 samples in [0, 1].
    fn predict(&mut self, window: &[f32]) -> Result<f32, PipelineError>;

    /// Clear any recurrent state.
    fn reset(&mut self);
}

/// Stateless energy-based stand-in for the ONNX model.
///
/// Maps the window's RMS level onto a pseudo-probability. Used by
/// [`EndpointDetector::simple`](super::EndpointDetector::simple) in
/// builds without the `onnx` feature and throughout the test suites.
pub struct EnergyModel {
    /// RMS level that maps to probability 1.0.
    full_scale: f32,
}

impl EnergyModel {
    pub fn new() -> Self {
        Self { full_scale: 0.25 }
    }
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechModel for EnergyModel {
    fn predict(&mut self, window: &[f32]) -> Result<f32, PipelineError> {
        if window.is_empty() {
            return Ok(0.0);
        }
        let rms =
            (window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32).sqrt();
        Ok((rms / self.full_scale).min(1.0))
    }

    fn reset(&mut self) {}
}
