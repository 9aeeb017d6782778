//! Process wiring for the phone agent
//!
//! Builds the shared engines once at startup, routes transport events
//! to per-call ingestion tasks and owns graceful shutdown. The
//! telephony adapters themselves are external; they drive the
//! [`CallManager`] with [`phone_agent_transport::CallEvent`]s.

pub mod calls;
pub mod state;

pub use calls::CallManager;
pub use state::AppState;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("startup failed: {0}")]
    Startup(String),

    #[error("call error: {0}")]
    Call(String),

    #[error("unknown call: {0}")]
    UnknownCall(String),
}
