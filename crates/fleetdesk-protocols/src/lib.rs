//! # Fleetdesk Protocols
//!
//! Shared definitions for the fleetdesk runtime crates: the error taxonomy,
//! session and profile types, and the seam traits through which the request
//! gateway and the realtime connection read (and, in one case, invalidate)
//! the session without owning it.

pub mod credentials;
pub mod error;
pub mod types;

pub use credentials::{CredentialSource, SessionInvalidator, StaticCredential};
pub use error::*;
pub use types::*;
