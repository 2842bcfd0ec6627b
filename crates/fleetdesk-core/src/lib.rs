//! # Fleetdesk Core
//!
//! Callback registries shared by the session manager, the realtime
//! connection and the transfer queue.
//!
//! Every registration returns a [`Subscription`]. Disposing it is the only
//! way to remove the callback; dropping it leaves the callback registered.

pub mod registry;

pub use registry::{ListenerSet, RefCounts, Release, Subscription, TopicRegistry};
