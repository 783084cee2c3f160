//! Splitting one transport message into its frames
//!
//! A single inbound transport message may pack several frames back to back.
//! [`FrameStreamDecoder`] scans such a buffer lazily, one header at a time, and
//! stops for good at the first protocol error. Nothing is carried over between
//! buffers: every transport message gets its own scan.

use crate::frame::RawFrame;
use crate::message::{Message, MessageRegistry};
use crate::{FrameCodec, ProtocolError};
use bytes::Bytes;
use std::iter::FusedIterator;

/// Stateless scanner producing one [`FrameStream`] per inbound buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStreamDecoder {
    /// Header codec
    codec: FrameCodec,
    /// Bound every payload slice to its frame's declared size
    strict: bool,
}

impl FrameStreamDecoder {
    /// Create a decoder with the compatible, unbounded-tail behaviour
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that truncates each payload to `size - 1` bytes
    pub fn strict() -> Self {
        Self::new().with_strict(true)
    }

    /// Toggle strict payload bounds
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether payload slices are bounded to their frame
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Scan `buf` for raw frames
    pub fn frames(&self, buf: Bytes) -> FrameStream {
        FrameStream {
            codec: self.codec,
            strict: self.strict,
            buf,
            offset: 0,
            watermark: 0,
            done: false,
        }
    }

    /// Scan `buf` and decode every frame into a message
    pub fn messages(&self, buf: Bytes) -> MessageStream {
        MessageStream {
            frames: self.frames(buf),
        }
    }
}

/// Lazy, finite, non-restartable scan over one buffer
///
/// Yields `Err` at most once; the iterator is exhausted afterwards.
#[derive(Debug)]
pub struct FrameStream {
    codec: FrameCodec,
    strict: bool,
    buf: Bytes,
    /// Start of the next frame header
    offset: usize,
    /// End of the most recently scanned frame
    watermark: usize,
    done: bool,
}

impl FrameStream {
    /// Bytes consumed by the frames scanned so far
    pub fn consumed(&self) -> usize {
        self.watermark
    }

    fn step(&mut self) -> Result<RawFrame, ProtocolError> {
        let header = self.codec.decode_header(&self.buf, self.offset)?;
        MessageRegistry::lookup_inbound(header.frame_type)?;

        let end = header.frame_end();
        if end > self.buf.len() {
            return Err(ProtocolError::Truncated {
                needed: end - self.offset,
                available: self.buf.len() - self.offset,
            });
        }

        self.watermark = end;
        self.offset = end;

        let tail = if self.strict {
            self.buf.slice(header.payload_offset..end)
        } else {
            self.buf.slice(header.payload_offset..)
        };

        Ok(RawFrame {
            frame_type: header.frame_type,
            size: header.size,
            tail,
        })
    }
}

impl Iterator for FrameStream {
    type Item = Result<RawFrame, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.offset >= self.buf.len() {
            self.done = true;
            return None;
        }

        let result = self.step();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl FusedIterator for FrameStream {}

/// Scan over one buffer yielding decoded messages
///
/// Payload decode errors end the scan the same way header errors do.
#[derive(Debug)]
pub struct MessageStream {
    frames: FrameStream,
}

impl MessageStream {
    /// Bytes consumed by the frames scanned so far
    pub fn consumed(&self) -> usize {
        self.frames.consumed()
    }
}

impl Iterator for MessageStream {
    type Item = Result<Message, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.frames.next()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e)),
        };

        let result = MessageRegistry::decode(&raw);
        if result.is_err() {
            self.frames.done = true;
        }
        Some(result)
    }
}

impl FusedIterator for MessageStream {}
