use super::protocol::{
    CodecError, ENCODE_BUFFER_CAPACITY, EVENT_TAG_NAMED, EVENT_TAG_NUMERIC, EventKey, Frame,
    FrameKind, MAX_TEXT_UNITS, MalformedFrame, PAYLOAD_TAG_BYTES, PAYLOAD_TAG_TEXT, Payload,
};

/// Writes frames into one reusable scratch buffer.
///
/// The slice returned by [`FrameEncoder::encode`] borrows the encoder, so it
/// has to be handed to the transport (or copied) before the next encode.
pub struct FrameEncoder {
    buffer: Vec<u8>,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::with_capacity(ENCODE_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn encode(&mut self, frame: &Frame) -> Result<&[u8], CodecError> {
        self.buffer.clear();
        self.buffer.push(frame.kind().tag());

        match frame {
            Frame::Ping => {}
            Frame::UserPacket { event, payload } => {
                self.write_event(event)?;
                self.write_payload(payload)?;
            }
            Frame::RoomInfo { room_id } => self.write_text(room_id)?,
            Frame::ClientId { session_id } => self.write_u32(*session_id),
            Frame::Error { message } => self.write_text(message)?,
            Frame::CloseReason { reason } => self.write_text(reason)?,
            Frame::Auth { credential } => self.write_text(credential)?,
        }

        Ok(&self.buffer)
    }

    fn write_event(&mut self, event: &EventKey) -> Result<(), CodecError> {
        match event {
            EventKey::Numeric(id) => {
                self.buffer.push(EVENT_TAG_NUMERIC);
                self.buffer.push(*id);
            }
            EventKey::Named(name) => {
                self.buffer.push(EVENT_TAG_NAMED);
                self.write_text(name)?;
            }
        }
        Ok(())
    }

    fn write_payload(&mut self, payload: &Payload) -> Result<(), CodecError> {
        match payload {
            Payload::Bytes(bytes) => {
                self.buffer.push(PAYLOAD_TAG_BYTES);
                self.buffer.extend_from_slice(bytes);
            }
            Payload::Text(text) => {
                self.buffer.push(PAYLOAD_TAG_TEXT);
                self.write_text(text)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn write_text(&mut self, text: &str) -> Result<(), CodecError> {
        let units = text.encode_utf16().count();
        if units > MAX_TEXT_UNITS {
            return Err(CodecError::TextTooLong(units));
        }

        self.write_u16(units as u16);
        self.buffer.reserve(units * 2);
        for unit in text.encode_utf16() {
            self.write_u16(unit);
        }
        Ok(())
    }
}

/// Bounds-checked cursor over one received frame.
pub struct FrameReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], MalformedFrame> {
        if count > self.remaining() {
            return Err(MalformedFrame::Truncated {
                offset: self.position,
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, MalformedFrame> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, MalformedFrame> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, MalformedFrame> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_text(&mut self) -> Result<String, MalformedFrame> {
        let units = self.read_u16()? as usize;
        let bytes = self.take(units * 2)?;
        let code_units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&code_units).map_err(|_| MalformedFrame::InvalidText)
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.position..];
        self.position = self.data.len();
        rest
    }

    fn read_event(&mut self) -> Result<EventKey, MalformedFrame> {
        match self.read_u8()? {
            EVENT_TAG_NUMERIC => Ok(EventKey::Numeric(self.read_u8()?)),
            EVENT_TAG_NAMED => Ok(EventKey::Named(self.read_text()?)),
            tag => Err(MalformedFrame::UnknownEventTag(tag)),
        }
    }

    fn read_payload(&mut self) -> Result<Payload, MalformedFrame> {
        match self.read_u8()? {
            PAYLOAD_TAG_BYTES => Ok(Payload::Bytes(self.read_rest().to_vec())),
            PAYLOAD_TAG_TEXT => Ok(Payload::Text(self.read_text()?)),
            tag => Err(MalformedFrame::UnknownPayloadTag(tag)),
        }
    }

    pub fn read_frame(&mut self) -> Result<Frame, MalformedFrame> {
        if self.remaining() == 0 {
            return Err(MalformedFrame::Empty);
        }

        let tag = self.read_u8()?;
        let kind = FrameKind::from_tag(tag).ok_or(MalformedFrame::UnknownKind(tag))?;

        let frame = match kind {
            FrameKind::Ping => Frame::Ping,
            FrameKind::UserPacket => {
                let event = self.read_event()?;
                let payload = self.read_payload()?;
                Frame::UserPacket { event, payload }
            }
            FrameKind::RoomInfo => Frame::RoomInfo {
                room_id: self.read_text()?,
            },
            FrameKind::ClientId => Frame::ClientId {
                session_id: self.read_u32()?,
            },
            FrameKind::Error => Frame::Error {
                message: self.read_text()?,
            },
            FrameKind::CloseReason => Frame::CloseReason {
                reason: self.read_text()?,
            },
            FrameKind::Auth => Frame::Auth {
                credential: self.read_text()?,
            },
        };

        Ok(frame)
    }
}

/// Decodes one frame from the start of `data`, returning it with the number
/// of bytes consumed.
pub fn decode(data: &[u8]) -> Result<(Frame, usize), MalformedFrame> {
    let mut reader = FrameReader::new(data);
    let frame = reader.read_frame()?;
    Ok((frame, reader.position()))
}

/// Decodes a whole transport message, which must hold exactly one frame.
pub fn decode_message(data: &[u8]) -> Result<Frame, MalformedFrame> {
    let (frame, consumed) = decode(data)?;
    if consumed != data.len() {
        return Err(MalformedFrame::TrailingBytes(data.len() - consumed));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_encoder() -> FrameEncoder {
        FrameEncoder::with_capacity(256)
    }

    fn round_trip(frame: &Frame) -> Frame {
        let mut encoder = small_encoder();
        let bytes = encoder.encode(frame).unwrap().to_vec();
        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        decoded
    }

    #[test]
    fn default_encoder_reserves_scratch_space() {
        let encoder = FrameEncoder::new();
        assert!(encoder.capacity() >= 16 * 1024 * 1024);
    }

    #[test]
    fn numeric_event_with_text_payload() {
        let frame = Frame::user(EventKey::Numeric(5), "hi");
        let mut encoder = small_encoder();
        let bytes = encoder.encode(&frame).unwrap();

        assert_eq!(bytes, &[1, 0, 5, 1, 2, 0, b'h', 0, b'i', 0]);

        match decode(bytes).unwrap().0 {
            Frame::UserPacket {
                event: EventKey::Numeric(5),
                payload: Payload::Text(text),
            } => assert_eq!(text, "hi"),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn room_info_layout() {
        let frame = Frame::RoomInfo {
            room_id: "abc".to_string(),
        };
        let mut encoder = small_encoder();
        let bytes = encoder.encode(&frame).unwrap();

        assert_eq!(bytes[0], FrameKind::RoomInfo.tag());
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 3);
        assert_eq!(bytes.len(), 1 + 2 + 6);
        assert_eq!(decode(bytes).unwrap().0, frame);
    }

    #[test]
    fn ping_is_one_byte() {
        let mut encoder = small_encoder();
        assert_eq!(encoder.encode(&Frame::Ping).unwrap(), &[0]);
    }

    #[test]
    fn client_id_is_little_endian() {
        let mut encoder = small_encoder();
        let bytes = encoder
            .encode(&Frame::ClientId {
                session_id: 0x0403_0201,
            })
            .unwrap();
        assert_eq!(bytes, &[3, 1, 2, 3, 4]);
    }

    #[test]
    fn binary_payload_consumes_rest_of_frame() {
        let frame = Frame::user(EventKey::Named("blob".into()), vec![9, 8, 7, 6]);
        let decoded = round_trip(&frame);
        assert_eq!(decoded, frame);

        let empty = Frame::user(EventKey::Numeric(0), Vec::<u8>::new());
        assert_eq!(round_trip(&empty), empty);
    }

    #[test]
    fn non_ascii_text_counts_code_units() {
        let text = "héllo 🎲";
        let frame = Frame::Error {
            message: text.to_string(),
        };
        let mut encoder = small_encoder();
        let bytes = encoder.encode(&frame).unwrap();

        let units = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        assert_eq!(units, text.encode_utf16().count());
        assert_eq!(units, 8);
        assert_eq!(decode(bytes).unwrap().0, frame);
    }

    #[test]
    fn encoder_buffer_is_reused() {
        let mut encoder = small_encoder();
        let frame = Frame::user(EventKey::Numeric(1), "a long payload");
        let first = encoder.encode(&frame).unwrap().len();
        let second = encoder.encode(&Frame::Ping).unwrap().len();
        assert!(first > second);
        assert_eq!(second, 1);
    }

    #[test]
    fn text_over_u16_units_is_rejected() {
        let mut encoder = small_encoder();
        let huge = "x".repeat(MAX_TEXT_UNITS + 1);
        let result = encoder.encode(&Frame::CloseReason { reason: huge });
        assert_eq!(result, Err(CodecError::TextTooLong(MAX_TEXT_UNITS + 1)));
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(decode(&[]), Err(MalformedFrame::Empty));
        assert_eq!(decode(&[42]), Err(MalformedFrame::UnknownKind(42)));
        assert_eq!(decode(&[1, 7]), Err(MalformedFrame::UnknownEventTag(7)));
        assert_eq!(decode(&[1, 0, 3, 9]), Err(MalformedFrame::UnknownPayloadTag(9)));
        assert!(matches!(
            decode(&[1, 0]),
            Err(MalformedFrame::Truncated { offset: 2, needed: 1, remaining: 0 })
        ));
        assert!(matches!(decode(&[3, 1, 2]), Err(MalformedFrame::Truncated { .. })));
        // declares 4 code units, carries 1
        assert!(matches!(
            decode(&[2, 4, 0, b'a', 0]),
            Err(MalformedFrame::Truncated { .. })
        ));
        // user packet with no payload tag at all
        assert!(matches!(decode(&[1, 0, 3]), Err(MalformedFrame::Truncated { .. })));
    }

    #[test]
    fn lone_surrogate_is_invalid_text() {
        assert_eq!(
            decode(&[4, 1, 0, 0x00, 0xD8]),
            Err(MalformedFrame::InvalidText)
        );
    }

    #[test]
    fn decode_message_rejects_trailing_bytes() {
        assert_eq!(decode(&[0, 0, 0]).unwrap(), (Frame::Ping, 1));
        assert_eq!(decode_message(&[0, 0, 0]), Err(MalformedFrame::TrailingBytes(2)));
        assert_eq!(decode_message(&[0]), Ok(Frame::Ping));
    }

    fn arb_text() -> impl Strategy<Value = String> {
        prop::collection::vec(any::<char>(), 0..24).prop_map(|chars| chars.into_iter().collect())
    }

    fn arb_event() -> impl Strategy<Value = EventKey> {
        prop_oneof![
            any::<u8>().prop_map(EventKey::Numeric),
            arb_text().prop_map(EventKey::Named),
        ]
    }

    fn arb_payload() -> impl Strategy<Value = Payload> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..64).prop_map(Payload::Bytes),
            arb_text().prop_map(Payload::Text),
        ]
    }

    fn arb_frame() -> impl Strategy<Value = Frame> {
        prop_oneof![
            Just(Frame::Ping),
            (arb_event(), arb_payload())
                .prop_map(|(event, payload)| Frame::UserPacket { event, payload }),
            arb_text().prop_map(|room_id| Frame::RoomInfo { room_id }),
            any::<u32>().prop_map(|session_id| Frame::ClientId { session_id }),
            arb_text().prop_map(|message| Frame::Error { message }),
            arb_text().prop_map(|reason| Frame::CloseReason { reason }),
            arb_text().prop_map(|credential| Frame::Auth { credential }),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(frame in arb_frame()) {
            let mut encoder = small_encoder();
            let bytes = encoder.encode(&frame).unwrap().to_vec();
            let (decoded, consumed) = decode(&bytes).unwrap();
            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(decoded, frame);
        }

        #[test]
        fn prop_truncation_never_panics(frame in arb_frame(), cut in 0usize..64) {
            let mut encoder = small_encoder();
            let bytes = encoder.encode(&frame).unwrap().to_vec();
            let end = bytes.len().saturating_sub(cut);
            let _ = decode(&bytes[..end]);
        }
    }
}
