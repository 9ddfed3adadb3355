use std::fmt;

pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_MAX_ACCUMULATION_MS: u64 = 25;
pub const DEFAULT_PING_DELAY_MS: u64 = 5000;
pub const DEFAULT_LATENCY_WINDOW: usize = 10;

/// Capacity reserved up front by every [`FrameEncoder`](super::codec::FrameEncoder).
pub const ENCODE_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;

pub const MAX_TEXT_UNITS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Ping = 0,
    UserPacket = 1,
    RoomInfo = 2,
    ClientId = 3,
    Error = 4,
    CloseReason = 5,
    Auth = 6,
}

impl FrameKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Ping),
            1 => Some(Self::UserPacket),
            2 => Some(Self::RoomInfo),
            3 => Some(Self::ClientId),
            4 => Some(Self::Error),
            5 => Some(Self::CloseReason),
            6 => Some(Self::Auth),
            _ => None,
        }
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }
}

pub const EVENT_TAG_NUMERIC: u8 = 0;
pub const EVENT_TAG_NAMED: u8 = 1;
pub const PAYLOAD_TAG_BYTES: u8 = 0;
pub const PAYLOAD_TAG_TEXT: u8 = 1;

/// Identifies which handler a user packet is routed to.
///
/// Numeric keys cost one byte on the wire; named keys cost two bytes per
/// UTF-16 code unit plus a length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKey {
    Numeric(u8),
    Named(String),
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Numeric(id) => write!(f, "#{}", id),
            EventKey::Named(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Conversion used by `send`/`broadcast`/`on_message` so callers can pass
/// plain integers or strings. Integers outside 0..=255 are rejected here,
/// before any byte is encoded.
pub trait IntoEventKey {
    fn into_event_key(self) -> Result<EventKey, CodecError>;
}

impl IntoEventKey for EventKey {
    fn into_event_key(self) -> Result<EventKey, CodecError> {
        Ok(self)
    }
}

impl IntoEventKey for &EventKey {
    fn into_event_key(self) -> Result<EventKey, CodecError> {
        Ok(self.clone())
    }
}

impl IntoEventKey for &str {
    fn into_event_key(self) -> Result<EventKey, CodecError> {
        Ok(EventKey::Named(self.to_owned()))
    }
}

impl IntoEventKey for String {
    fn into_event_key(self) -> Result<EventKey, CodecError> {
        Ok(EventKey::Named(self))
    }
}

impl IntoEventKey for u8 {
    fn into_event_key(self) -> Result<EventKey, CodecError> {
        Ok(EventKey::Numeric(self))
    }
}

macro_rules! numeric_event_key {
    ($($ty:ty),*) => {
        $(
            impl IntoEventKey for $ty {
                fn into_event_key(self) -> Result<EventKey, CodecError> {
                    u8::try_from(self).map(EventKey::Numeric).map_err(|_| {
                        CodecError::EventIdOutOfRange(i64::try_from(self).unwrap_or(i64::MAX))
                    })
                }
            }
        )*
    };
}

numeric_event_key!(u16, u32, u64, usize, i8, i16, i32, i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Consumes the rest of the frame on decode, so it is always the last field.
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Bytes(_) => None,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ping,
    UserPacket { event: EventKey, payload: Payload },
    RoomInfo { room_id: String },
    ClientId { session_id: u32 },
    Error { message: String },
    CloseReason { reason: String },
    Auth { credential: String },
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Ping => FrameKind::Ping,
            Frame::UserPacket { .. } => FrameKind::UserPacket,
            Frame::RoomInfo { .. } => FrameKind::RoomInfo,
            Frame::ClientId { .. } => FrameKind::ClientId,
            Frame::Error { .. } => FrameKind::Error,
            Frame::CloseReason { .. } => FrameKind::CloseReason,
            Frame::Auth { .. } => FrameKind::Auth,
        }
    }

    pub fn user(event: EventKey, payload: impl Into<Payload>) -> Self {
        Frame::UserPacket {
            event,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedFrame {
    #[error("empty frame")]
    Empty,
    #[error("truncated frame: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unknown frame kind tag {0}")]
    UnknownKind(u8),
    #[error("unknown event tag {0}")]
    UnknownEventTag(u8),
    #[error("unknown payload tag {0}")]
    UnknownPayloadTag(u8),
    #[error("text is not valid UTF-16")]
    InvalidText,
    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] MalformedFrame),
    #[error("event id {0} is outside 0..=255")]
    EventIdOutOfRange(i64),
    #[error("text of {0} code units exceeds the u16 length prefix")]
    TextTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip() {
        for tag in 0..=6u8 {
            let kind = FrameKind::from_tag(tag).unwrap();
            assert_eq!(kind.tag(), tag);
        }
        assert_eq!(FrameKind::from_tag(7), None);
        assert_eq!(FrameKind::from_tag(255), None);
    }

    #[test]
    fn numeric_event_keys_are_range_checked() {
        assert_eq!(5u32.into_event_key(), Ok(EventKey::Numeric(5)));
        assert_eq!(255i32.into_event_key(), Ok(EventKey::Numeric(255)));
        assert_eq!(256u32.into_event_key(), Err(CodecError::EventIdOutOfRange(256)));
        assert_eq!((-1i32).into_event_key(), Err(CodecError::EventIdOutOfRange(-1)));
    }

    #[test]
    fn string_event_keys_are_named() {
        assert_eq!(
            "chat".into_event_key(),
            Ok(EventKey::Named("chat".to_string()))
        );
        assert_eq!(EventKey::Numeric(3).to_string(), "#3");
        assert_eq!(EventKey::Named("move".into()).to_string(), "\"move\"");
    }

    #[test]
    fn payload_accessors() {
        let text = Payload::from("hi");
        assert_eq!(text.as_text(), Some("hi"));
        assert_eq!(text.as_bytes(), None);

        let bytes = Payload::from(vec![1, 2, 3]);
        assert_eq!(bytes.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(bytes.as_text(), None);
    }
}
