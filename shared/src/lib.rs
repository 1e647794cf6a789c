//! Shared types for the streaming conformance harness
//!
//! Contains only the types used by both the harness and the cluster it drives,
//! plus the logging bootstrap every binary goes through.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
