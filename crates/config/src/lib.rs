//! Configuration for the phone agent
//!
//! Layered settings: built-in defaults, optional YAML files under
//! `config/`, then `PHONE_AGENT`-prefixed environment variables.

mod pipeline;
mod settings;

pub use pipeline::{
    DetectorSettings, OutboundSettings, PipelineSettings, PoolSettings, TurnSettings,
};
pub use settings::{load_settings, ModelPaths, ObservabilitySettings, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

impl From<ConfigError> for phone_agent_core::Error {
    fn from(err: ConfigError) -> Self {
        phone_agent_core::Error::Config(err.to_string())
    }
}
