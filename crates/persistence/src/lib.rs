//! Call registration layer
//!
//! Tracks the minimal identifiers the engine needs per call: a caller
//! profile keyed by hashed phone number and a call-session record.
//! The in-memory registry is the default backend; a database-backed
//! one implements the same trait.

pub mod registry;

pub use registry::{CallRegistry, InMemoryCallRegistry};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("call not found: {0}")]
    CallNotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<PersistenceError> for phone_agent_core::Error {
    fn from(err: PersistenceError) -> Self {
        phone_agent_core::Error::Persistence(err.to_string())
    }
}
