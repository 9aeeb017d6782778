//! Stateful sample-rate conversion for outbound streams.

use rubato::{FftFixedIn, Resampler};

use crate::PipelineError;

/// Streaming wrapper around rubato's fixed-input FFT resampler.
///
/// Inbound chunk sizes are arbitrary: samples accumulate in a buffer
/// and are processed in fixed blocks so the filter state carries
/// across chunk boundaries. `flush` drains the tail at stream end.
pub struct StreamResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self, PipelineError> {
        let chunk_size = 256;
        let resampler =
            FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1)
                .map_err(|e| PipelineError::Transcode(e.to_string()))?;

        Ok(Self {
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        })
    }

    /// Feed samples and return whatever complete blocks produce.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, PipelineError> {
        self.input_buffer.extend_from_slice(samples);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let frames = self
                .resampler
                .process(&[chunk], None)
                .map_err(|e| PipelineError::Transcode(e.to_string()))?;
            if let Some(first) = frames.into_iter().next() {
                output.extend_from_slice(&first);
            }
        }
        Ok(output)
    }

    /// Drain the remaining partial block at stream end.
    pub fn flush(&mut self) -> Result<Vec<f32>, PipelineError> {
        if self.input_buffer.is_empty() {
            return Ok(Vec::new());
        }
        let tail = [std::mem::take(&mut self.input_buffer)];
        let frames = self
            .resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| PipelineError::Transcode(e.to_string()))?;
        Ok(frames.into_iter().next().unwrap_or_default())
    }
}
