//! # Fleetdesk Gateway
//!
//! Every outbound REST call goes through [`RequestGateway`]: the session's
//! bearer credential is injected, each attempt is bounded by a timeout, and
//! transient failures are retried under a [`RetryPolicy`]. Responses are
//! normalized into an [`Envelope`].
//!
//! A 401 is never retried. The gateway invalidates the session through
//! [`SessionInvalidator`](fleetdesk_protocols::SessionInvalidator) and then
//! returns [`RequestError::Unauthorized`](fleetdesk_protocols::RequestError).

mod envelope;
mod gateway;
mod retry;

pub use envelope::{Envelope, parse_envelope};
pub use gateway::{RequestGateway, RequestOptions};
pub use retry::{RetryPolicy, is_retryable};
