//! Silero VAD over ONNX Runtime.
//!
//! The model scores one analysis window at a time and carries LSTM
//! state (`h`/`c`, each `[2, 1, 64]`) between windows. State is zeroed
//! whenever the detector finalizes an utterance, never across calls —
//! each call owns its own instance.

use std::path::Path;

use ndarray::{arr1, Array2, Array3};
use ort::{GraphOptimizationLevel, Session};

use super::model::SpeechModel;
use crate::PipelineError;

const STATE_DIMS: (usize, usize, usize) = (2, 1, 64);

pub struct SileroModel {
    session: Session,
    sample_rate: i64,
    h: Array3<f32>,
    c: Array3<f32>,
}

impl SileroModel {
    /// Load the VAD model from disk for one call at `sample_rate`.
    pub fn load(model_path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::Model(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| PipelineError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        Ok(Self {
            session,
            sample_rate: sample_rate as i64,
            h: Array3::zeros(STATE_DIMS),
            c: Array3::zeros(STATE_DIMS),
        })
    }
}

impl SpeechModel for SileroModel {
    fn predict(&mut self, window: &[f32]) -> Result<f32, PipelineError> {
        let input = Array2::from_shape_vec((1, window.len()), window.to_vec())
            .map_err(|e| PipelineError::Model(e.to_string()))?;
        let sr = arr1(&[self.sample_rate]);

        let outputs = self
            .session
            .run(
                ort::inputs![
                    "input" => input.view(),
                    "sr" => sr.view(),
                    "h" => self.h.view(),
                    "c" => self.c.view(),
                ]
                .map_err(|e| PipelineError::Model(e.to_string()))?,
            )
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        let prob = outputs
            .get("output")
            .ok_or_else(|| PipelineError::Model("missing output tensor".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Model(e.to_string()))?
            .view()
            .iter()
            .copied()
            .next()
            .unwrap_or(0.0);

        let hn: Option<Vec<f32>> = outputs
            .get("hn")
            .and_then(|t| t.try_extract_tensor::<f32>().ok())
            .map(|t| t.view().iter().copied().collect());
        let cn: Option<Vec<f32>> = outputs
            .get("cn")
            .and_then(|t| t.try_extract_tensor::<f32>().ok())
            .map(|t| t.view().iter().copied().collect());
        drop(outputs);

        if let Some(data) = hn {
            if let Ok(state) = Array3::from_shape_vec(STATE_DIMS, data) {
                self.h = state;
            }
        }
        if let Some(data) = cn {
            if let Ok(state) = Array3::from_shape_vec(STATE_DIMS, data) {
                self.c = state;
            }
        }

        Ok(prob)
    }

    fn reset(&mut self) {
        self.h = Array3::zeros(STATE_DIMS);
        self.c = Array3::zeros(STATE_DIMS);
    }
}
