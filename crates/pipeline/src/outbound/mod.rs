//! Outbound transcoding and pacing.
//!
//! Bridges synthesis output (linear PCM at the synthesis rate) to the
//! call's wire format and delivers it at real-time cadence: fixed
//! wall-clock chunks with an inter-chunk delay, so playback is smooth
//! rather than bursty.

pub mod mulaw;
mod resample;

pub use resample::StreamResampler;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use phone_agent_core::audio::{self, AudioEncoding};
use phone_agent_transport::AudioSink;

use crate::PipelineError;

/// Narrowband wire rate for mu-law legs.
const NARROWBAND_RATE: u32 = 8000;

/// Outbound framing and pacing parameters.
#[derive(Debug, Clone)]
pub struct OutboundConfig {
    /// Wall-clock duration of one wire chunk, in ms.
    pub chunk_ms: u32,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self { chunk_ms: 20 }
    }
}

/// What ended an outbound stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every chunk was delivered.
    Completed,
    /// The owning turn was cancelled mid-stream; the remainder was
    /// discarded, not drained.
    Cancelled,
}

/// One paced outbound stream, owned by a single turn.
///
/// Resampler state persists across `write` calls within the stream so
/// chunk boundaries do not introduce conversion artifacts.
pub struct OutboundStream {
    encoding: AudioEncoding,
    resampler: Option<StreamResampler>,
    sink: Arc<dyn AudioSink>,
    chunk_bytes: usize,
    chunk_duration: Duration,
    wire_buffer: Vec<u8>,
    sent_chunks: u64,
}

impl OutboundStream {
    /// `input_rate` is the rate of the PCM16 handed to `write` (the
    /// synthesis rate). Mu-law legs are downsampled to 8 kHz; raw PCM
    /// legs pass through at the input rate.
    pub fn new(
        encoding: AudioEncoding,
        input_rate: u32,
        config: &OutboundConfig,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self, PipelineError> {
        let (wire_rate, resampler) = match encoding {
            AudioEncoding::Mulaw if input_rate != NARROWBAND_RATE => (
                NARROWBAND_RATE,
                Some(StreamResampler::new(input_rate, NARROWBAND_RATE)?),
            ),
            AudioEncoding::Mulaw => (NARROWBAND_RATE, None),
            AudioEncoding::Pcm16 => (input_rate, None),
        };
        let chunk_bytes = encoding.bytes_per_ms(wire_rate) * config.chunk_ms as usize;

        Ok(Self {
            encoding,
            resampler,
            sink,
            chunk_bytes: chunk_bytes.max(1),
            chunk_duration: Duration::from_millis(config.chunk_ms as u64),
            wire_buffer: Vec::new(),
            sent_chunks: 0,
        })
    }

    /// Transcode `pcm` (16-bit LE at the input rate) and pace out
    /// every complete chunk.
    pub async fn write(
        &mut self,
        pcm: &[u8],
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, PipelineError> {
        let wire = self.transcode(pcm)?;
        self.wire_buffer.extend_from_slice(&wire);
        self.pace(false, cancel).await
    }

    /// Flush the resampler tail and drain the remaining buffer.
    pub async fn finish(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, PipelineError> {
        if let Some(resampler) = self.resampler.as_mut() {
            let tail = resampler.flush()?;
            if !tail.is_empty() {
                let encoded = encode_wire(self.encoding, &tail);
                self.wire_buffer.extend_from_slice(&encoded);
            }
        }
        self.pace(true, cancel).await
    }

    /// Chunks delivered so far on this stream.
    pub fn sent_chunks(&self) -> u64 {
        self.sent_chunks
    }

    fn transcode(&mut self, pcm: &[u8]) -> Result<Vec<u8>, PipelineError> {
        match self.resampler.as_mut() {
            Some(resampler) => {
                let samples = audio::pcm16_to_f32(pcm);
                let low = resampler.process(&samples)?;
                Ok(encode_wire(self.encoding, &low))
            }
            None => match self.encoding {
                AudioEncoding::Mulaw => Ok(mulaw::encode(pcm)),
                AudioEncoding::Pcm16 => Ok(pcm.to_vec()),
            },
        }
    }

    async fn pace(
        &mut self,
        drain_tail: bool,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, PipelineError> {
        while self.wire_buffer.len() >= self.chunk_bytes
            || (drain_tail && !self.wire_buffer.is_empty())
        {
            if cancel.is_cancelled() {
                self.wire_buffer.clear();
                return Ok(StreamOutcome::Cancelled);
            }

            let take = self.chunk_bytes.min(self.wire_buffer.len());
            let chunk: Vec<u8> = self.wire_buffer.drain(..take).collect();
            self.sink
                .send_audio(&chunk)
                .await
                .map_err(|e| PipelineError::Send(e.to_string()))?;
            self.sent_chunks += 1;

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.wire_buffer.clear();
                    return Ok(StreamOutcome::Cancelled);
                }
                _ = tokio::time::sleep(self.chunk_duration) => {}
            }
        }
        Ok(StreamOutcome::Completed)
    }
}

/// Post-resample float samples back to wire bytes.
fn encode_wire(encoding: AudioEncoding, samples: &[f32]) -> Vec<u8> {
    let pcm = audio::f32_samples_to_pcm16(samples);
    match encoding {
        AudioEncoding::Mulaw => mulaw::encode(&pcm),
        AudioEncoding::Pcm16 => pcm,
    }
}
