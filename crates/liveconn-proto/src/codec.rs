//! Frame codec and payload field helpers

use crate::frame::{
    Frame, FrameHeader, COORD_LEN, HEADER_LEN, MAX_FRAME_SIZE, SIZE_PREFIX_LEN, TYPE_LEN,
};
use crate::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Frame codec for encoding frames and decoding frame headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    /// Maximum declared frame size allowed
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a new frame codec accepting any size the prefix can express
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Create a new frame codec with a custom max frame size
    ///
    /// The limit is capped at what a `u16` size prefix can express.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
        }
    }

    /// Maximum declared frame size this codec will encode
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a type tag and payload into one frame
    pub fn encode(&self, frame_type: i8, payload: &[u8]) -> Result<Bytes, ProtocolError> {
        let size = payload.len() + TYPE_LEN;
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        let mut buf = BytesMut::with_capacity(SIZE_PREFIX_LEN + size);
        buf.put_u16_le(size as u16);
        buf.put_i8(frame_type);
        buf.put_slice(payload);

        Ok(buf.freeze())
    }

    /// Encode a frame value
    pub fn encode_frame(&self, frame: &Frame) -> Result<Bytes, ProtocolError> {
        self.encode(frame.frame_type, &frame.payload)
    }

    /// Read the header of the frame starting at `offset`
    pub fn decode_header(&self, buf: &[u8], offset: usize) -> Result<FrameHeader, ProtocolError> {
        let mut rest = buf.get(offset..).unwrap_or_default();

        ensure(rest, SIZE_PREFIX_LEN)?;
        let size = rest.get_u16_le();
        if size == 0 {
            return Err(ProtocolError::ZeroSizeFrame);
        }

        ensure(rest, TYPE_LEN)?;
        let frame_type = rest.get_i8();

        Ok(FrameHeader {
            size,
            frame_type,
            payload_offset: offset + HEADER_LEN,
        })
    }

    /// Decode exactly one frame from the start of `buf`, bounded by its size
    pub fn decode_frame(&self, buf: &[u8]) -> Result<Frame, ProtocolError> {
        let header = self.decode_header(buf, 0)?;
        let end = header.frame_end();
        if end > buf.len() {
            return Err(ProtocolError::truncated(end, buf.len()));
        }

        Ok(Frame::new(
            header.frame_type,
            Bytes::copy_from_slice(&buf[header.payload_offset..end]),
        ))
    }
}

/// Append a `u16`-length-prefixed UTF-8 string
pub fn put_str(buf: &mut BytesMut, value: &str) -> Result<(), ProtocolError> {
    let len = value.len();
    if len > usize::from(u16::MAX) {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: usize::from(u16::MAX),
        });
    }

    buf.put_u16_le(len as u16);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Append a little-endian `f32`
pub fn put_f32(buf: &mut BytesMut, value: f32) {
    buf.put_f32_le(value);
}

/// Read a little-endian `u16`
pub fn get_u16(buf: &mut &[u8]) -> Result<u16, ProtocolError> {
    ensure(buf, SIZE_PREFIX_LEN)?;
    Ok(buf.get_u16_le())
}

/// Read a little-endian `f32`
pub fn get_f32(buf: &mut &[u8]) -> Result<f32, ProtocolError> {
    ensure(buf, COORD_LEN)?;
    Ok(buf.get_f32_le())
}

/// Read a `u16`-length-prefixed UTF-8 string
pub fn get_str(buf: &mut &[u8]) -> Result<String, ProtocolError> {
    let len = usize::from(get_u16(buf)?);
    ensure(buf, len)?;

    let value = std::str::from_utf8(&buf[..len])
        .map_err(|e| ProtocolError::MalformedString(e.to_string()))?
        .to_owned();
    buf.advance(len);

    Ok(value)
}

fn ensure(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        return Err(ProtocolError::truncated(needed, buf.len()));
    }
    Ok(())
}
