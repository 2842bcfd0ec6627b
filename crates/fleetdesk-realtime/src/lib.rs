//! # Fleetdesk Realtime
//!
//! One physical realtime connection shared by every feature of the console.
//!
//! - [`ConnectionManager`] drives the connection state machine, reconnects
//!   with backoff, dispatches inbound events by topic and reference-counts
//!   channel joins.
//! - [`Connector`] is the transport seam. [`WebSocketConnector`] is the real
//!   transport; [`MemoryConnector`] is an in-process one for tests and demos.

mod backoff;
mod manager;
mod memory;
mod message;
mod state;
mod transport;
mod websocket;

pub use backoff::ReconnectPolicy;
pub use manager::ConnectionManager;
pub use memory::{MemoryConnector, MemoryServer};
pub use message::{ControlMessage, InboundEvent, parse_inbound};
pub use state::{ConnectionEvent, ConnectionState, ConnectionStatus};
pub use transport::{ConnectRequest, Connector, FrameSink, FrameStream, TransportPair};
pub use websocket::WebSocketConnector;
