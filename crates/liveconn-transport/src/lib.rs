//! # Live Connections Transport
//!
//! Message-oriented transports, the bootstrap HTTP client and identity
//! persistence used by the Live Connections client.

#![warn(missing_docs)]

/// Transport abstraction shared by all transports
pub mod transport;

/// WebSocket transport
pub mod websocket;

/// In-memory transport
pub mod loopback;

/// Area and user allocation over HTTP
pub mod bootstrap;

/// Area → user identity persistence
pub mod store;

/// Transport-specific error types
pub mod error;

pub use transport::{
    CloseInfo, Connector, ReadyState, TransportEvent, TransportEvents, TransportHandle,
};
pub use websocket::WsConnector;
pub use loopback::{LoopbackConnector, LoopbackPeer};
pub use bootstrap::{AreaBootstrap, HttpBootstrap};
pub use store::{IdentityStore, JsonFileStore, MemoryStore};
pub use error::TransportError;
