//! # Fleetdesk Config
//!
//! Configuration for the fleetdesk runtime: request timeout and retry,
//! realtime reconnect policy, transfer concurrency, token storage and logging.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
