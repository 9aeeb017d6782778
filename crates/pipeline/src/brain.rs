//! Reasoning collaborator contract.

use async_trait::async_trait;

use crate::PipelineError;

/// How a turn should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Text to synthesize and speak.
    Spoken { text: String },
    /// Name of a pre-rendered audio asset to play directly, bypassing
    /// synthesis for low-latency common replies.
    Reflex { asset: String },
}

/// Reasoning output for one utterance.
#[derive(Debug, Clone)]
pub struct BrainReply {
    pub response: Response,
    /// Free-form line for the call log.
    pub log: Option<String>,
}

/// Response generation for a transcribed utterance.
///
/// Implementations must tolerate the caller abandoning the reply — a
/// barged-in or torn-down call never consumes the result.
#[async_trait]
pub trait Brain: Send + Sync {
    async fn respond(
        &self,
        call_id: &str,
        caller_id: &str,
        phone: &str,
        text: &str,
    ) -> Result<BrainReply, PipelineError>;
}

/// Echoing brain with a small reflex phrase table, for development and
/// tests.
#[derive(Default)]
pub struct SimulatedBrain {
    reflexes: Vec<(String, String)>,
}

impl SimulatedBrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer any transcript containing `phrase` with the named asset.
    pub fn with_reflex(mut self, phrase: &str, asset: &str) -> Self {
        self.reflexes.push((phrase.to_lowercase(), asset.to_string()));
        self
    }
}

#[async_trait]
impl Brain for SimulatedBrain {
    async fn respond(
        &self,
        call_id: &str,
        _caller_id: &str,
        _phone: &str,
        text: &str,
    ) -> Result<BrainReply, PipelineError> {
        let lowered = text.to_lowercase();
        for (phrase, asset) in &self.reflexes {
            if lowered.contains(phrase.as_str()) {
                return Ok(BrainReply {
                    response: Response::Reflex {
                        asset: asset.clone(),
                    },
                    log: Some(format!("reflex reply on call {call_id}")),
                });
            }
        }
        Ok(BrainReply {
            response: Response::Spoken {
                text: format!("You said: {text}"),
            },
            log: None,
        })
    }
}
