//! Windowed endpoint detection state machine.
//!
//! Consumes raw PCM16 bytes in arbitrary chunk sizes, scores complete
//! analysis windows with a speech probability model, and turns the
//! window classifications into discrete events.

use phone_agent_core::audio;

use super::model::{EnergyModel, SpeechModel};
use crate::PipelineError;

/// Endpoint detector tuning.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Inbound sample rate (8000 or 16000 Hz).
    pub sample_rate: u32,
    /// Speech probability threshold.
    pub threshold: f32,
    /// Energy floor (mean absolute i16 amplitude) required alongside
    /// the probability threshold. Suppresses line-noise false
    /// positives at low thresholds.
    pub min_energy: f32,
    /// Energy level that classifies a window as speech on its own,
    /// recovering speech the model under-scores.
    pub force_energy: f32,
    /// Continuous non-speech run that ends an utterance, in ms.
    pub silence_ms: u32,
    /// Hard cap on utterance duration, in ms.
    pub max_utterance_ms: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            threshold: 0.5,
            min_energy: 250.0,
            force_energy: 2500.0,
            silence_ms: 600,
            max_utterance_ms: 10_000,
        }
    }
}

/// Discrete event from the endpoint detector.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointEvent {
    /// Speech onset while the line was quiet. Interrupts an active
    /// turn; never starts one.
    BargeIn,
    /// A completed utterance: linear PCM16 at the detector rate.
    Utterance(Vec<u8>),
}

/// Per-call endpoint detector.
///
/// Holds the partial-window buffer, the in-progress speech buffer and
/// the model's recurrent state. Only the call's ingestion task touches
/// an instance.
pub struct EndpointDetector {
    config: DetectorConfig,
    model: Box<dyn SpeechModel>,
    window_bytes: usize,
    max_silence_windows: u32,
    max_utterance_bytes: usize,
    buffer: Vec<u8>,
    speech_buffer: Vec<u8>,
    in_speech: bool,
    silence_windows: u32,
}

impl EndpointDetector {
    /// Silero operates on fixed windows: 512 samples at 16 kHz and 256
    /// at 8 kHz, 32 ms either way.
    fn window_samples(sample_rate: u32) -> Option<usize> {
        match sample_rate {
            16000 => Some(512),
            8000 => Some(256),
            _ => None,
        }
    }

    pub fn new(
        config: DetectorConfig,
        model: Box<dyn SpeechModel>,
    ) -> Result<Self, PipelineError> {
        let window_samples = Self::window_samples(config.sample_rate).ok_or_else(|| {
            PipelineError::Endpoint(format!(
                "unsupported sample rate: {} (use 8000 or 16000)",
                config.sample_rate
            ))
        })?;
        let window_ms = (window_samples as u32 * 1000) / config.sample_rate;
        let max_silence_windows = (config.silence_ms / window_ms).max(1);
        let max_utterance_bytes =
            config.max_utterance_ms as usize * config.sample_rate as usize / 1000 * 2;

        Ok(Self {
            config,
            model,
            window_bytes: window_samples * 2,
            max_silence_windows,
            max_utterance_bytes,
            buffer: Vec::new(),
            speech_buffer: Vec::new(),
            in_speech: false,
            silence_windows: 0,
        })
    }

    /// Detector backed by the energy stand-in model (no ONNX needed).
    pub fn simple(config: DetectorConfig) -> Result<Self, PipelineError> {
        Self::new(config, Box::new(EnergyModel::new()))
    }

    /// Feed raw PCM16 bytes; chunk sizes are arbitrary.
    ///
    /// Partial analysis windows are buffered internally and only
    /// complete windows are scored. At most one event is returned per
    /// call, with speech onset taking precedence over a finalized
    /// utterance.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Option<EndpointEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut barge_in = false;
        let mut utterance = None;

        while self.buffer.len() >= self.window_bytes {
            let window: Vec<u8> = self.buffer.drain(..self.window_bytes).collect();
            if let Some(done) = self.process_window(&window, &mut barge_in) {
                utterance = Some(done);
            }
        }

        if barge_in {
            Some(EndpointEvent::BargeIn)
        } else {
            utterance.map(EndpointEvent::Utterance)
        }
    }

    fn process_window(&mut self, window: &[u8], barge_in: &mut bool) -> Option<Vec<u8>> {
        let energy = audio::mean_abs_amplitude(window);
        let samples = audio::pcm16_to_f32(window);
        let prob = match self.model.predict(&samples) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("speech model failed, scoring window as silence: {e}");
                0.0
            }
        };

        // Hybrid policy: the model decides, gated by an energy floor,
        // with a high-energy override for windows it under-scores.
        let is_speech = (prob > self.config.threshold && energy > self.config.min_energy)
            || energy > self.config.force_energy;

        if is_speech {
            if !self.in_speech {
                self.in_speech = true;
                *barge_in = true;
                self.speech_buffer.clear();
            }
            self.speech_buffer.extend_from_slice(window);
            self.silence_windows = 0;
        } else if self.in_speech {
            self.speech_buffer.extend_from_slice(window);
            self.silence_windows += 1;
            if self.silence_windows > self.max_silence_windows {
                return Some(self.finalize());
            }
        } else {
            return None;
        }

        if self.speech_buffer.len() >= self.max_utterance_bytes {
            return Some(self.finalize());
        }
        None
    }

    /// Hand off the accumulated utterance and reset for the next one.
    fn finalize(&mut self) -> Vec<u8> {
        self.in_speech = false;
        self.silence_windows = 0;
        self.model.reset();
        std::mem::take(&mut self.speech_buffer)
    }

    /// Clear all buffers and the model's recurrent state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.speech_buffer.clear();
        self.in_speech = false;
        self.silence_windows = 0;
        self.model.reset();
    }

    /// Analysis window size in bytes.
    pub fn window_bytes(&self) -> usize {
        self.window_bytes
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One analysis window of constant-amplitude "speech".
    fn speech_window(detector: &EndpointDetector, amplitude: i16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(detector.window_bytes());
        for _ in 0..detector.window_bytes() / 2 {
            bytes.extend_from_slice(&amplitude.to_le_bytes());
        }
        bytes
    }

    fn silence_window(detector: &EndpointDetector) -> Vec<u8> {
        vec![0u8; detector.window_bytes()]
    }

    fn windows_to_endpoint(detector: &EndpointDetector) -> u32 {
        detector.max_silence_windows + 1
    }

    struct FailingModel;

    impl SpeechModel for FailingModel {
        fn predict(&mut self, _window: &[f32]) -> Result<f32, PipelineError> {
            Err(PipelineError::Model("inference exploded".to_string()))
        }
        fn reset(&mut self) {}
    }

    struct FixedModel(f32);

    impl SpeechModel for FixedModel {
        fn predict(&mut self, _window: &[f32]) -> Result<f32, PipelineError> {
            Ok(self.0)
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn test_silence_never_emits() {
        let mut detector = EndpointDetector::simple(DetectorConfig::default()).unwrap();
        let silence = silence_window(&detector);
        for _ in 0..200 {
            assert_eq!(detector.process_chunk(&silence), None);
        }
    }

    #[test]
    fn test_burst_then_silence_emits_barge_in_then_utterance() {
        let mut detector = EndpointDetector::simple(DetectorConfig::default()).unwrap();
        let speech = speech_window(&detector, 8000);
        let silence = silence_window(&detector);

        // Rising edge emits the barge-in signal.
        assert_eq!(detector.process_chunk(&speech), Some(EndpointEvent::BargeIn));

        // Speech continues without further events.
        let speech_windows = 16;
        for _ in 0..speech_windows - 1 {
            assert_eq!(detector.process_chunk(&speech), None);
        }

        // Endpoint fires after the configured silence run.
        let mut utterance = None;
        for _ in 0..windows_to_endpoint(&detector) {
            assert!(utterance.is_none());
            if let Some(EndpointEvent::Utterance(bytes)) = detector.process_chunk(&silence) {
                utterance = Some(bytes);
            }
        }

        // The utterance holds the burst plus the consumed silence run.
        let bytes = utterance.expect("no utterance emitted");
        let expected =
            (speech_windows + windows_to_endpoint(&detector) as usize) * detector.window_bytes();
        assert_eq!(bytes.len(), expected);

        // Further silence stays quiet.
        for _ in 0..50 {
            assert_eq!(detector.process_chunk(&silence), None);
        }
    }

    #[test]
    fn test_max_duration_force_cut() {
        let config = DetectorConfig {
            // 10 windows of 32 ms at 16 kHz
            max_utterance_ms: 320,
            ..DetectorConfig::default()
        };
        let mut detector = EndpointDetector::simple(config).unwrap();
        let speech = speech_window(&detector, 8000);

        assert_eq!(detector.process_chunk(&speech), Some(EndpointEvent::BargeIn));

        let mut cut = None;
        for i in 0..20 {
            if let Some(EndpointEvent::Utterance(bytes)) = detector.process_chunk(&speech) {
                cut = Some((i, bytes));
                break;
            }
        }
        let (at, bytes) = cut.expect("cap never fired");
        assert_eq!(bytes.len(), 10 * detector.window_bytes());
        assert_eq!(at, 8, "cut should land exactly at the cap boundary");

        // State reset: continued speech reads as a fresh onset.
        assert_eq!(detector.process_chunk(&speech), Some(EndpointEvent::BargeIn));
    }

    #[test]
    fn test_model_failure_falls_back_to_energy_force() {
        let mut detector =
            EndpointDetector::new(DetectorConfig::default(), Box::new(FailingModel)).unwrap();
        // Above the force threshold, so the window still classifies as
        // speech with the model down.
        let speech = speech_window(&detector, 8000);
        assert_eq!(detector.process_chunk(&speech), Some(EndpointEvent::BargeIn));
    }

    #[test]
    fn test_probability_without_energy_is_suppressed() {
        // A model that is certain it hears speech in pure silence.
        let mut detector =
            EndpointDetector::new(DetectorConfig::default(), Box::new(FixedModel(0.99))).unwrap();
        let silence = silence_window(&detector);
        for _ in 0..100 {
            assert_eq!(detector.process_chunk(&silence), None);
        }
    }

    #[test]
    fn test_partial_windows_are_buffered() {
        let mut detector = EndpointDetector::simple(DetectorConfig::default()).unwrap();
        let speech = speech_window(&detector, 8000);

        // Feed the first window in awkward 100-byte slices; nothing
        // fires until the window completes.
        let mut events = Vec::new();
        for chunk in speech.chunks(100) {
            if let Some(event) = detector.process_chunk(chunk) {
                events.push(event);
            }
        }
        assert_eq!(events, vec![EndpointEvent::BargeIn]);
    }

    #[test]
    fn test_unsupported_rate_rejected() {
        let config = DetectorConfig {
            sample_rate: 44100,
            ..DetectorConfig::default()
        };
        assert!(EndpointDetector::simple(config).is_err());
    }

    #[test]
    fn test_8khz_window_size() {
        let config = DetectorConfig {
            sample_rate: 8000,
            ..DetectorConfig::default()
        };
        let detector = EndpointDetector::simple(config).unwrap();
        assert_eq!(detector.window_bytes(), 512);
    }
}
