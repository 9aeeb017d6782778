//! Shared application state.

use std::sync::Arc;

use phone_agent_config::Settings;
use phone_agent_persistence::{CallRegistry, InMemoryCallRegistry};
use phone_agent_pipeline::{
    DetectorConfig, EndpointDetector, Engines, OutboundConfig, PipelineError, ReflexStore,
    ResourcePools, SimulatedBrain, SimulatedSynthesizer, SimulatedTranscriber, TurnConfig,
};

use crate::calls::{CallManager, DetectorFactory};
use crate::ServerError;

/// Process-wide state: settings plus the init-once engines.
///
/// Everything here is constructed before the process accepts its
/// first call and treated as immutable afterwards; calls share it by
/// reference.
pub struct AppState {
    pub settings: Settings,
    pub engines: Arc<Engines>,
    pub pools: Arc<ResourcePools>,
    pub registry: Arc<InMemoryCallRegistry>,
    pub calls: Arc<CallManager>,
}

impl AppState {
    /// Build everything the calls share.
    ///
    /// Failures here are fatal by design: a process that cannot load
    /// its models or assets must not accept calls at all.
    pub fn initialize(settings: Settings) -> Result<Self, ServerError> {
        settings
            .validate()
            .map_err(|e| ServerError::Startup(e.to_string()))?;

        // Probe the detection model now so a broken path fails the
        // process instead of the first caller.
        #[cfg(feature = "onnx")]
        {
            phone_agent_pipeline::SileroModel::load(&settings.models.vad, 16000)
                .map_err(|e| ServerError::Startup(format!("endpoint model: {e}")))?;
            tracing::info!(path = %settings.models.vad, "endpoint model loaded");
        }
        #[cfg(not(feature = "onnx"))]
        tracing::warn!("built without the onnx feature; using the energy stand-in detector");

        let reflexes = match settings.models.reflex_dir.as_deref() {
            Some(dir) => ReflexStore::load_dir(dir)
                .map_err(|e| ServerError::Startup(format!("reflex assets: {e}")))?,
            None => {
                tracing::info!("no reflex directory configured, fast path disabled");
                ReflexStore::empty()
            }
        };

        let engines = Arc::new(Engines {
            // External services implement these traits in production;
            // the simulated backends keep the process callable end to
            // end without them.
            stt: Arc::new(SimulatedTranscriber::new("what are the fees")),
            brain: Arc::new(SimulatedBrain::new().with_reflex("thank you", "ack")),
            tts: Arc::new(SimulatedSynthesizer::new()),
            reflexes: Arc::new(reflexes),
        });

        let pools = Arc::new(ResourcePools::new(
            settings.pipeline.pools.gpu_slots,
            settings.pipeline.pools.cpu_slots,
        ));

        let registry = Arc::new(InMemoryCallRegistry::new());

        let turn_config = TurnConfig {
            min_transcript_chars: settings.pipeline.turn.min_transcript_chars,
            synthesis_rate: settings.pipeline.turn.synthesis_rate,
            outbound: OutboundConfig {
                chunk_ms: settings.pipeline.outbound.chunk_ms,
            },
        };

        let calls = Arc::new(CallManager::new(
            engines.clone(),
            pools.clone(),
            registry.clone() as Arc<dyn CallRegistry>,
            detector_factory(&settings),
            turn_config,
        ));

        Ok(Self {
            settings,
            engines,
            pools,
            registry,
            calls,
        })
    }
}

fn detector_config(
    settings: &phone_agent_config::DetectorSettings,
    sample_rate: u32,
) -> DetectorConfig {
    DetectorConfig {
        sample_rate,
        threshold: settings.threshold,
        min_energy: settings.min_energy,
        force_energy: settings.force_energy,
        silence_ms: settings.silence_ms,
        max_utterance_ms: settings.max_utterance_ms,
    }
}

/// Per-call detector construction, bound to the loaded model path.
#[cfg(feature = "onnx")]
fn detector_factory(settings: &Settings) -> DetectorFactory {
    let detector = settings.pipeline.detector.clone();
    let vad_path = settings.models.vad.clone();
    Arc::new(move |sample_rate: u32| -> Result<EndpointDetector, PipelineError> {
        let model = phone_agent_pipeline::SileroModel::load(&vad_path, sample_rate)?;
        EndpointDetector::new(detector_config(&detector, sample_rate), Box::new(model))
    })
}

/// Per-call detector construction (energy stand-in model).
#[cfg(not(feature = "onnx"))]
fn detector_factory(settings: &Settings) -> DetectorFactory {
    let detector = settings.pipeline.detector.clone();
    Arc::new(move |sample_rate: u32| -> Result<EndpointDetector, PipelineError> {
        EndpointDetector::simple(detector_config(&detector, sample_rate))
    })
}
