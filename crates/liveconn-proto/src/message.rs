//! Message types and the tag registry

use crate::codec::{get_f32, get_str, put_f32, put_str, FrameCodec};
use crate::frame::{RawFrame, COORD_LEN, SIZE_PREFIX_LEN};
use crate::ProtocolError;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Message kinds known to the protocol, with their wire tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum MessageKind {
    /// Client credentials, sent once after the transport opens
    AuthUser = 1,
    /// Another participant moved their pointer
    MouseMove = 2,
    /// Participants currently in the area
    UsersOnline = 3,
    /// Server acknowledgement of `AuthUser`
    AuthOk = 4,
    /// Last known pointer position of a participant
    InitMouseCoords = 5,
}

impl MessageKind {
    /// Wire tag of this kind
    pub fn tag(self) -> i8 {
        self as i8
    }

    /// Whether the server ever sends this kind
    pub fn is_inbound(self) -> bool {
        self != Self::AuthUser
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthUser => "auth_user",
            Self::MouseMove => "mouse_move",
            Self::UsersOnline => "users_online",
            Self::AuthOk => "auth_ok",
            Self::InitMouseCoords => "init_mouse_coords",
        };
        f.write_str(name)
    }
}

impl TryFrom<i8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: i8) -> Result<Self, Self::Error> {
        MessageRegistry::lookup(tag).map(|entry| entry.kind)
    }
}

/// Pointer position of one participant
#[derive(Debug, Clone, PartialEq)]
pub struct MouseMove {
    /// Participant the position belongs to
    pub sender_name: String,
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl MouseMove {
    /// Create a pointer position
    pub fn new(sender_name: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            sender_name: sender_name.into(),
            x,
            y,
        }
    }

    fn encode_payload(&self) -> Result<Bytes, ProtocolError> {
        let mut buf =
            BytesMut::with_capacity(SIZE_PREFIX_LEN + self.sender_name.len() + 2 * COORD_LEN);
        put_str(&mut buf, &self.sender_name)?;
        put_f32(&mut buf, self.x);
        put_f32(&mut buf, self.y);
        Ok(buf.freeze())
    }

    fn decode_payload(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        let sender_name = get_str(&mut buf)?;
        if sender_name.is_empty() {
            return Err(ProtocolError::MalformedString(
                "empty sender name".to_string(),
            ));
        }
        let x = get_f32(&mut buf)?;
        let y = get_f32(&mut buf)?;

        Ok(Self { sender_name, x, y })
    }
}

/// Area and user identifiers presented to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Area identifier
    pub area: String,
    /// User identifier within the area
    pub user: String,
}

impl AuthUser {
    /// Create credentials
    pub fn new(area: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            user: user.into(),
        }
    }

    fn encode_payload(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(
            2 * SIZE_PREFIX_LEN + self.area.len() + self.user.len(),
        );
        put_str(&mut buf, &self.area)?;
        put_str(&mut buf, &self.user)?;
        Ok(buf.freeze())
    }
}

/// Decoded protocol message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Outbound credentials
    AuthUser(AuthUser),
    /// Pointer moved
    MouseMove(MouseMove),
    /// Participants online; the payload format is not defined yet
    UsersOnline(Vec<String>),
    /// Authentication acknowledgement text, `"ok"` on success
    AuthOk(String),
    /// Initial pointer position
    InitMouseCoords(MouseMove),
}

impl Message {
    /// Kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::AuthUser(_) => MessageKind::AuthUser,
            Self::MouseMove(_) => MessageKind::MouseMove,
            Self::UsersOnline(_) => MessageKind::UsersOnline,
            Self::AuthOk(_) => MessageKind::AuthOk,
            Self::InitMouseCoords(_) => MessageKind::InitMouseCoords,
        }
    }

    /// Encode this message's payload (without the frame header)
    pub fn encode_payload(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Self::AuthUser(auth) => auth.encode_payload(),
            Self::MouseMove(pos) | Self::InitMouseCoords(pos) => pos.encode_payload(),
            Self::UsersOnline(_) => Ok(Bytes::new()),
            Self::AuthOk(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
        }
    }

    /// Encode this message as a complete frame
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        MessageRegistry::encode(self)
    }
}

type DecodeFn = fn(&RawFrame) -> Result<Message, ProtocolError>;

/// One row of the tag table
#[derive(Clone, Copy)]
pub struct RegistryEntry {
    /// Message kind stored under the tag
    pub kind: MessageKind,
    decode: Option<DecodeFn>,
}

impl RegistryEntry {
    /// Whether inbound frames of this kind can be decoded
    pub fn is_decodable(&self) -> bool {
        self.decode.is_some()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("kind", &self.kind)
            .field("decodable", &self.is_decodable())
            .finish()
    }
}

static ENTRIES: [RegistryEntry; 5] = [
    RegistryEntry {
        kind: MessageKind::AuthUser,
        decode: None,
    },
    RegistryEntry {
        kind: MessageKind::MouseMove,
        decode: Some(decode_mouse_move),
    },
    RegistryEntry {
        kind: MessageKind::UsersOnline,
        decode: Some(decode_users_online),
    },
    RegistryEntry {
        kind: MessageKind::AuthOk,
        decode: Some(decode_auth_ok),
    },
    RegistryEntry {
        kind: MessageKind::InitMouseCoords,
        decode: Some(decode_init_mouse_coords),
    },
];

/// Static map from wire tag to payload (de)serializer
pub struct MessageRegistry;

impl MessageRegistry {
    /// Find the table row for a tag
    pub fn lookup(tag: i8) -> Result<&'static RegistryEntry, ProtocolError> {
        ENTRIES
            .iter()
            .find(|entry| entry.kind.tag() == tag)
            .ok_or(ProtocolError::UnknownType(tag))
    }

    /// Find the row for a tag the client can receive
    ///
    /// Encode-only kinds are reported as unknown.
    pub fn lookup_inbound(tag: i8) -> Result<&'static RegistryEntry, ProtocolError> {
        Self::lookup(tag)
            .ok()
            .filter(|entry| entry.is_decodable())
            .ok_or(ProtocolError::UnknownType(tag))
    }

    /// Decode a scanned frame into a message
    pub fn decode(frame: &RawFrame) -> Result<Message, ProtocolError> {
        let entry = Self::lookup_inbound(frame.frame_type)?;
        match entry.decode {
            Some(decode) => decode(frame),
            None => Err(ProtocolError::UnknownType(frame.frame_type)),
        }
    }

    /// Encode a message as a complete frame
    pub fn encode(message: &Message) -> Result<Bytes, ProtocolError> {
        let payload = message.encode_payload()?;
        FrameCodec::new().encode(message.kind().tag(), &payload)
    }
}

fn decode_mouse_move(frame: &RawFrame) -> Result<Message, ProtocolError> {
    MouseMove::decode_payload(&frame.tail).map(Message::MouseMove)
}

fn decode_init_mouse_coords(frame: &RawFrame) -> Result<Message, ProtocolError> {
    MouseMove::decode_payload(&frame.tail).map(Message::InitMouseCoords)
}

fn decode_users_online(_frame: &RawFrame) -> Result<Message, ProtocolError> {
    Ok(Message::UsersOnline(Vec::new()))
}

// AuthOk text has no length prefix of its own, so it is the one reader that
// has to honour the declared size.
fn decode_auth_ok(frame: &RawFrame) -> Result<Message, ProtocolError> {
    let payload = frame
        .bounded_payload()
        .ok_or_else(|| ProtocolError::Truncated {
            needed: frame.payload_len(),
            available: frame.tail.len(),
        })?;
    let text = std::str::from_utf8(payload)
        .map_err(|e| ProtocolError::MalformedString(e.to_string()))?;

    Ok(Message::AuthOk(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HEADER_LEN;
    use proptest::prelude::*;

    fn scan_single(encoded: &Bytes) -> RawFrame {
        let header = FrameCodec::new().decode_header(encoded, 0).unwrap();
        RawFrame {
            frame_type: header.frame_type,
            size: header.size,
            tail: encoded.slice(header.payload_offset..),
        }
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(MessageKind::AuthUser.tag(), 1);
        assert_eq!(MessageKind::MouseMove.tag(), 2);
        assert_eq!(MessageKind::UsersOnline.tag(), 3);
        assert_eq!(MessageKind::AuthOk.tag(), 4);
        assert_eq!(MessageKind::InitMouseCoords.tag(), 5);

        assert_eq!(MessageKind::try_from(5), Ok(MessageKind::InitMouseCoords));
        assert_eq!(MessageKind::try_from(6), Err(ProtocolError::UnknownType(6)));
        assert_eq!(MessageKind::try_from(-3), Err(ProtocolError::UnknownType(-3)));
    }

    #[test]
    fn test_auth_user_is_encode_only() {
        assert!(MessageRegistry::lookup(1).is_ok());
        assert_eq!(
            MessageRegistry::lookup_inbound(1).unwrap_err(),
            ProtocolError::UnknownType(1)
        );

        let encoded = Message::AuthUser(AuthUser::new("a", "b")).to_frame().unwrap();
        let raw = scan_single(&encoded);
        assert_eq!(MessageRegistry::decode(&raw), Err(ProtocolError::UnknownType(1)));
    }

    #[test]
    fn test_auth_user_declared_size() {
        let encoded = Message::AuthUser(AuthUser::new("abc", "xy")).to_frame().unwrap();

        // type + areaLen + "abc" + userLen + "xy"
        let expected_size = 1 + 2 + 3 + 2 + 2;
        assert_eq!(u16::from_le_bytes([encoded[0], encoded[1]]), expected_size);
        assert_eq!(encoded[2] as i8, MessageKind::AuthUser.tag());
        assert_eq!(&encoded[3..5], &[3, 0]);
        assert_eq!(&encoded[5..8], b"abc");
        assert_eq!(&encoded[8..10], &[2, 0]);
        assert_eq!(&encoded[10..], b"xy");
        assert_eq!(encoded.len(), 2 + expected_size as usize);
    }

    #[test]
    fn test_mouse_move_roundtrip_exact() {
        let message = Message::MouseMove(MouseMove::new("bob", 1.5, 2.25));
        let encoded = message.to_frame().unwrap();

        match MessageRegistry::decode(&scan_single(&encoded)).unwrap() {
            Message::MouseMove(pos) => {
                assert_eq!(pos.sender_name, "bob");
                assert_eq!(pos.x, 1.5);
                assert_eq!(pos.y, 2.25);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_init_mouse_coords_shares_layout() {
        let pos = MouseMove::new("al", 3.0, 4.0);
        let moved = Message::MouseMove(pos.clone()).to_frame().unwrap();
        let init = Message::InitMouseCoords(pos.clone()).to_frame().unwrap();

        assert_eq!(moved[HEADER_LEN..], init[HEADER_LEN..]);
        assert_ne!(moved[2], init[2]);
        assert_eq!(
            MessageRegistry::decode(&scan_single(&init)).unwrap(),
            Message::InitMouseCoords(pos)
        );
    }

    #[test]
    fn test_mouse_move_reads_past_declared_size() {
        // Declared size covers only the type byte; the reader still finds its
        // fields in the rest of the buffer.
        let full = Message::MouseMove(MouseMove::new("al", 0.0, 0.0)).to_frame().unwrap();
        let raw = RawFrame {
            frame_type: 2,
            size: 1,
            tail: full.slice(HEADER_LEN..),
        };

        assert_eq!(
            MessageRegistry::decode(&raw).unwrap(),
            Message::MouseMove(MouseMove::new("al", 0.0, 0.0))
        );
    }

    #[test]
    fn test_mouse_move_empty_name_rejected() {
        let encoded = FrameCodec::new()
            .encode(2, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
            .unwrap();

        assert!(matches!(
            MessageRegistry::decode(&scan_single(&encoded)),
            Err(ProtocolError::MalformedString(_))
        ));
    }

    #[test]
    fn test_mouse_move_truncated() {
        let encoded = FrameCodec::new().encode(2, &[2, 0, b'a', b'l', 0, 0]).unwrap();

        assert!(matches!(
            MessageRegistry::decode(&scan_single(&encoded)),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_auth_ok_bounded_to_its_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Message::AuthOk("ok".to_string()).to_frame().unwrap());
        buf.extend_from_slice(
            &Message::MouseMove(MouseMove::new("al", 0.0, 0.0)).to_frame().unwrap(),
        );
        let buf = buf.freeze();

        assert_eq!(
            MessageRegistry::decode(&scan_single(&buf)).unwrap(),
            Message::AuthOk("ok".to_string())
        );
    }

    #[test]
    fn test_auth_ok_invalid_utf8() {
        let encoded = FrameCodec::new().encode(4, &[0xFF, 0xFE]).unwrap();

        assert!(matches!(
            MessageRegistry::decode(&scan_single(&encoded)),
            Err(ProtocolError::MalformedString(_))
        ));
    }

    #[test]
    fn test_users_online_is_empty() {
        let encoded = FrameCodec::new().encode(3, b"whatever").unwrap();

        assert_eq!(
            MessageRegistry::decode(&scan_single(&encoded)).unwrap(),
            Message::UsersOnline(Vec::new())
        );
    }

    #[test]
    fn test_unknown_tag() {
        let encoded = FrameCodec::new().encode(42, b"").unwrap();

        assert_eq!(
            MessageRegistry::decode(&scan_single(&encoded)),
            Err(ProtocolError::UnknownType(42))
        );
    }

    proptest! {
        #[test]
        fn test_pointer_roundtrip_properties(
            name in "[a-zA-Z0-9]{1,32}",
            x in any::<f32>().prop_filter("finite", |v| v.is_finite()),
            y in any::<f32>().prop_filter("finite", |v| v.is_finite()),
            init in any::<bool>()
        ) {
            let pos = MouseMove::new(name, x, y);
            let message = if init {
                Message::InitMouseCoords(pos)
            } else {
                Message::MouseMove(pos)
            };

            let encoded = message.to_frame().unwrap();
            let decoded = MessageRegistry::decode(&scan_single(&encoded)).unwrap();
            prop_assert_eq!(decoded, message);
        }

        #[test]
        fn test_auth_ok_roundtrip_properties(text in "\\PC{0,64}") {
            let message = Message::AuthOk(text);
            let encoded = message.to_frame().unwrap();
            let decoded = MessageRegistry::decode(&scan_single(&encoded)).unwrap();
            prop_assert_eq!(decoded, message);
        }
    }
}
