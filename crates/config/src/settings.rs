//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, PipelineSettings};

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Model and asset paths.
    #[serde(default)]
    pub models: ModelPaths,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    /// Validate settings before the process starts accepting calls.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let detector = &self.pipeline.detector;
        if !(0.0..=1.0).contains(&detector.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.detector.threshold".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }
        if !(100..=5000).contains(&detector.silence_ms) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.detector.silence_ms".to_string(),
                message: "must be between 100 and 5000".to_string(),
            });
        }
        if detector.max_utterance_ms < 1000 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.detector.max_utterance_ms".to_string(),
                message: "must be at least 1000".to_string(),
            });
        }
        if detector.force_energy < detector.min_energy {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.detector.force_energy".to_string(),
                message: "must not be below min_energy".to_string(),
            });
        }

        let pools = &self.pipeline.pools;
        if pools.gpu_slots == 0 || pools.cpu_slots == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.pools".to_string(),
                message: "pool sizes must be at least 1".to_string(),
            });
        }

        if !(10..=60).contains(&self.pipeline.outbound.chunk_ms) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.outbound.chunk_ms".to_string(),
                message: "must be between 10 and 60".to_string(),
            });
        }

        if self.pipeline.turn.synthesis_rate < 8000 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.turn.synthesis_rate".to_string(),
                message: "must be at least 8000".to_string(),
            });
        }

        Ok(())
    }
}

/// Model and asset paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPaths {
    /// Endpoint detection model.
    #[serde(default = "default_vad_path")]
    pub vad: String,

    /// Directory of pre-rendered reflex assets (raw PCM16 at the
    /// synthesis rate). Unset disables the reflex fast path.
    #[serde(default)]
    pub reflex_dir: Option<String>,
}

fn default_vad_path() -> String {
    "models/silero_vad.onnx".to_string()
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            vad: default_vad_path(),
            reflex_dir: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Log level for the env-filter default.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines.
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`PHONE_AGENT` prefix, `__` separator)
/// 2. `config/{env}.yaml` (if an environment name is given)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{env_name}")).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("PHONE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
