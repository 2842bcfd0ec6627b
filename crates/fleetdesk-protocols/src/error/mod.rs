//! Error types for the fleetdesk runtime.

mod kind;
mod auth;
mod request;
mod realtime;
mod transfer;
mod storage;

pub use kind::*;
pub use auth::*;
pub use request::*;
pub use realtime::*;
pub use transfer::*;
pub use storage::*;
