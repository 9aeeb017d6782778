//! Workspace-level error type.

use thiserror::Error;

/// Aggregate error for the phone agent workspace.
///
/// The member crates define their own error enums and convert into
/// this at the boundaries where a single type is needed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
