//! # Fleetdesk Session
//!
//! Owns the authentication token and its lifecycle.
//!
//! - [`TokenStore`]: durable holder of the credential and cached profile,
//!   keyed by fixed names ([`FileTokenStore`], [`MemoryTokenStore`]).
//! - [`AuthApi`]: the login, verify and logout endpoints ([`HttpAuthApi`]).
//! - [`SessionManager`]: the single writer of session state, with a
//!   change-notification registry.

mod api;
mod file_store;
mod manager;
mod memory_store;
mod store;

pub use api::{AuthApi, HttpAuthApi, LoginGrant};
pub use file_store::FileTokenStore;
pub use manager::SessionManager;
pub use memory_store::MemoryTokenStore;
pub use store::{StoreKeys, StoredCredentials, TokenStore};
