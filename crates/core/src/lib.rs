//! Core types for the phone agent
//!
//! This crate provides foundational types used across all other crates:
//! - PCM audio conversions and the outbound encoding flag
//! - Call identity types
//! - Error types

pub mod audio;
pub mod call;
pub mod error;

pub use audio::{f32_to_pcm16, mean_abs_amplitude, pcm16_to_f32, AudioEncoding};
pub use call::{CallIds, CallSession};
pub use error::{Error, Result};
