//! # Live Connections Protocol
//!
//! Binary frame layout, message types and the frame stream decoder shared by
//! the Live Connections client.

#![warn(missing_docs)]

/// Frame structure and layout constants
pub mod frame;

/// Message types and the tag registry
pub mod message;

/// Frame codec and payload field helpers
pub mod codec;

/// Splitting transport messages into frames
pub mod stream;

/// Error types for protocol operations
pub mod error;

pub use frame::{Frame, FrameHeader, RawFrame};
pub use message::{AuthUser, Message, MessageKind, MessageRegistry, MouseMove};
pub use codec::FrameCodec;
pub use stream::{FrameStream, FrameStreamDecoder, MessageStream};
pub use error::ProtocolError;
