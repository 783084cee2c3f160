//! # Live Connections
//!
//! Client for the Live Connections shared pointer protocol.
//!
//! Participants of an *area* see each other's pointers move in real time.
//! The client authenticates over a binary WebSocket protocol, decodes the
//! length-prefixed frames the server sends, hands them to registered
//! handlers and forwards local pointer moves at a throttled rate.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use liveconn_proto as proto;
pub use liveconn_transport as transport;

/// Error types for the Live Connections client
pub mod error;

/// Client configuration
pub mod config;

/// Local participant identity
pub mod user;

/// Outbound send guards
pub mod guard;

/// Message handlers and deferred dispatch
pub mod dispatch;

/// Connection session state machine
pub mod session;

/// Pointer event throttling
pub mod throttle;

/// Client orchestration
pub mod client;

pub use error::{AuthError, ConnectionError, LiveConnError};
pub use config::{ClientConfig, LogMode};
pub use user::{User, UserHandle, AUTH_OK};
pub use guard::{NotAuthenticated, SendGuard};
pub use dispatch::{Dispatcher, Handler, Handlers};
pub use session::{ConnectionSession, SendOutcome, SessionState};
pub use throttle::{PointerPosition, PointerThrottle, ThrottleOutcome};
pub use client::{area_from_path, Client, Identity};

/// Result type alias for Live Connections operations
pub type Result<T> = std::result::Result<T, LiveConnError>;
