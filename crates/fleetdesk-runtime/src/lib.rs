//! # Fleetdesk Runtime
//!
//! Builds the session manager, request gateway, realtime connection and
//! transfer queue from one [`Config`](fleetdesk_config::Config) and wires
//! them together. Nothing is looked up globally: callers hold the
//! [`Runtime`] and reach every component through it.

pub mod error;
pub mod runtime;

pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeParts};
