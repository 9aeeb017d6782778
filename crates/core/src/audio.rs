//! PCM audio primitives shared across the pipeline.
//!
//! All inbound audio is 16-bit little-endian linear PCM; synthesis
//! output is a normalized f32 waveform. The conversions here are the
//! only place those representations meet.

use serde::{Deserialize, Serialize};

/// Outbound wire encoding for a call leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit little-endian linear PCM.
    Pcm16,
    /// 8-bit G.711 mu-law (narrowband telephony).
    Mulaw,
}

impl AudioEncoding {
    /// Wire bytes for one millisecond of audio at `sample_rate`.
    pub fn bytes_per_ms(&self, sample_rate: u32) -> usize {
        let samples = sample_rate as usize / 1000;
        match self {
            AudioEncoding::Pcm16 => samples * 2,
            AudioEncoding::Mulaw => samples,
        }
    }
}

/// Decode little-endian 16-bit PCM bytes into normalized f32 samples.
///
/// A trailing odd byte is ignored.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect()
}

/// Encode normalized f32 samples as little-endian 16-bit PCM bytes,
/// clamping out-of-range values.
pub fn f32_samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Convert a synthesized waveform to 16-bit PCM bytes.
///
/// Returns `None` when the waveform is empty or effectively silent, so
/// callers drop the response instead of streaming silence to the
/// caller.
pub fn f32_to_pcm16(wave: &[f32]) -> Option<Vec<u8>> {
    if wave.is_empty() || wave.iter().all(|s| s.abs() < 1e-5) {
        return None;
    }
    Some(f32_samples_to_pcm16(wave))
}

/// Mean absolute amplitude of a 16-bit PCM byte window, in i16 units.
pub fn mean_abs_amplitude(bytes: &[u8]) -> f32 {
    let mut sum: u64 = 0;
    let mut count: u32 = 0;
    for b in bytes.chunks_exact(2) {
        sum += (i16::from_le_bytes([b[0], b[1]]) as i64).unsigned_abs();
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    sum as f32 / count as f32
}
