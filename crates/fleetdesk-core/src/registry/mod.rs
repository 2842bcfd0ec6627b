//! Registry implementations.

mod dispatch;
mod listeners;
mod refcount;
mod subscription;
mod topics;

pub use listeners::ListenerSet;
pub use refcount::{RefCounts, Release};
pub use subscription::Subscription;
pub use topics::TopicRegistry;
