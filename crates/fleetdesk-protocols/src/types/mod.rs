//! Shared data types.

mod session;
mod user;

pub use session::*;
pub use user::*;
