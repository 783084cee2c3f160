//! Frame structure and layout constants
//!
//! Wire layout of one frame, all integers little-endian:
//!
//! ```text
//! [u16 size][i8 type][payload: size - 1 bytes]
//! ```
//!
//! `size` counts the type byte plus the payload, so a well-formed frame always
//! declares `size >= 1`.

use bytes::Bytes;

/// Width of the `u16` size prefix (also used for string length prefixes)
pub const SIZE_PREFIX_LEN: usize = 2;

/// Width of the `i8` type tag
pub const TYPE_LEN: usize = 1;

/// Width of a frame header (size prefix + type tag)
pub const HEADER_LEN: usize = SIZE_PREFIX_LEN + TYPE_LEN;

/// Width of an `f32` coordinate
pub const COORD_LEN: usize = 4;

/// Largest value the size prefix can hold
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// One protocol frame: a type tag and its payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Type tag
    pub frame_type: i8,
    /// Frame payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(frame_type: i8, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Size the frame declares on the wire (type byte + payload)
    pub fn declared_size(&self) -> usize {
        self.payload.len() + TYPE_LEN
    }

    /// Number of bytes the frame occupies on the wire
    pub fn wire_len(&self) -> usize {
        SIZE_PREFIX_LEN + self.declared_size()
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared size (type byte + payload length), zero only when malformed
    pub size: u16,
    /// Type tag
    pub frame_type: i8,
    /// Absolute offset of the first payload byte
    pub payload_offset: usize,
}

impl FrameHeader {
    /// Payload length implied by the declared size; zero for a zero size
    pub fn payload_len(&self) -> usize {
        usize::from(self.size).saturating_sub(TYPE_LEN)
    }

    /// Absolute offset one past the last byte of this frame
    pub fn frame_end(&self) -> usize {
        self.payload_offset + self.payload_len()
    }
}

/// A frame as scanned out of an inbound buffer, before payload decoding
///
/// `tail` starts at the frame's payload offset. Unless the scan ran in strict
/// mode it extends to the end of the whole transport message, so it may hold
/// bytes of the frames that follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Type tag
    pub frame_type: i8,
    /// Declared size (type byte + payload length)
    pub size: u16,
    /// Buffer slice starting at the payload offset
    pub tail: Bytes,
}

impl RawFrame {
    /// Payload length implied by the declared size; zero for a zero size
    pub fn payload_len(&self) -> usize {
        usize::from(self.size).saturating_sub(TYPE_LEN)
    }

    /// The frame's own payload bytes, bounded by the declared size
    ///
    /// Returns `None` when the tail is shorter than the declared payload.
    pub fn bounded_payload(&self) -> Option<&[u8]> {
        self.tail.get(..self.payload_len())
    }
}
