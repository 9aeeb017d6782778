//! Pipeline settings.

use serde::{Deserialize, Serialize};

/// Combined pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Endpoint detector tuning.
    #[serde(default)]
    pub detector: DetectorSettings,

    /// Turn lifecycle tuning.
    #[serde(default)]
    pub turn: TurnSettings,

    /// Outbound framing and pacing.
    #[serde(default)]
    pub outbound: OutboundSettings,

    /// Resource pool sizes.
    #[serde(default)]
    pub pools: PoolSettings,
}

/// Endpoint detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Speech probability threshold (0.0 - 1.0).
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Energy floor (mean abs i16 amplitude) required alongside the
    /// probability threshold.
    #[serde(default = "default_min_energy")]
    pub min_energy: f32,

    /// Energy level that classifies a window as speech on its own.
    #[serde(default = "default_force_energy")]
    pub force_energy: f32,

    /// Continuous non-speech run that ends an utterance (ms).
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u32,

    /// Hard cap on utterance duration (ms).
    #[serde(default = "default_max_utterance_ms")]
    pub max_utterance_ms: u32,
}

fn default_threshold() -> f32 {
    0.5
}
fn default_min_energy() -> f32 {
    250.0
}
fn default_force_energy() -> f32 {
    2500.0
}
fn default_silence_ms() -> u32 {
    600
}
fn default_max_utterance_ms() -> u32 {
    10_000
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_energy: default_min_energy(),
            force_energy: default_force_energy(),
            silence_ms: default_silence_ms(),
            max_utterance_ms: default_max_utterance_ms(),
        }
    }
}

/// Turn lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnSettings {
    /// Transcripts shorter than this abort the turn.
    #[serde(default = "default_min_transcript_chars")]
    pub min_transcript_chars: usize,

    /// Sample rate requested from the synthesizer.
    #[serde(default = "default_synthesis_rate")]
    pub synthesis_rate: u32,
}

fn default_min_transcript_chars() -> usize {
    2
}
fn default_synthesis_rate() -> u32 {
    16000
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            min_transcript_chars: default_min_transcript_chars(),
            synthesis_rate: default_synthesis_rate(),
        }
    }
}

/// Outbound settings.
///
/// The wire encoding itself is declared per call by the transport
/// adapter; only the pacing cadence is configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundSettings {
    /// Wall-clock duration of one wire chunk (ms).
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,
}

fn default_chunk_ms() -> u32 {
    20
}

impl Default for OutboundSettings {
    fn default() -> Self {
        Self {
            chunk_ms: default_chunk_ms(),
        }
    }
}

/// Resource pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Concurrency bound for GPU-resident model invocation.
    #[serde(default = "default_gpu_slots")]
    pub gpu_slots: usize,

    /// Concurrency bound for CPU-bound inference work.
    #[serde(default = "default_cpu_slots")]
    pub cpu_slots: usize,
}

fn default_gpu_slots() -> usize {
    3
}
fn default_cpu_slots() -> usize {
    6
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            gpu_slots: default_gpu_slots(),
            cpu_slots: default_cpu_slots(),
        }
    }
}
