// ABOUTME: Wire codec for SMPP v3.4 PDUs: header handling, field primitives, and Pdu dispatch
// ABOUTME: decode(encode(p)) == p for every well-formed PDU; malformed bytes fail, never panic

use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::datatypes::{
    BindReceiver, BindReceiverResp, BindTransceiver, BindTransceiverResp, BindTransmitter,
    BindTransmitterResp, CommandId, CommandStatus, DeliverSm, DeliverSmResp, EnquireLink,
    EnquireLinkResp, FixedString, GenericNack, Outbind, SubmitSm, SubmitSmResp, Unbind, UnbindResp,
    RESPONSE_BIT,
};

/// Hard ceiling on command_length. Larger frames are rejected before any
/// allocation happens, bounding memory under adversarial input.
pub const MAX_PDU_SIZE: u32 = 65_536;

/// The 16-octet header common to every PDU.
///
/// `command_id` and `command_status` are kept raw here so that unknown
/// command ids and statuses survive decoding; typed conversions happen
/// where a concrete PDU is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Truncated { field: "header" });
        }

        let command_length = buf.get_u32();
        let command_id = buf.get_u32();
        let command_status = buf.get_u32();
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidLength {
                length: command_length,
            });
        }

        // sequence_number 0 is reserved; it never appears on the wire.
        if sequence_number == 0 {
            return Err(CodecError::ReservedSequence);
        }

        // Requests must carry command_status 0.
        if command_id & RESPONSE_BIT == 0 && command_status != 0 {
            return Err(CodecError::RequestStatusNotZero {
                command_id,
                status: command_status,
            });
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    /// Typed command_status; fails on values outside the v3.4 table.
    pub fn status(&self) -> Result<CommandStatus, CodecError> {
        CommandStatus::try_from(self.command_status)
            .map_err(|_| CodecError::InvalidStatus(self.command_status))
    }
}

/// Codec failures, with enough context to pick a command_status for the
/// generic_nack the session sends back.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("command_length {length} outside 16..={MAX_PDU_SIZE}")]
    InvalidLength { length: u32 },

    #[error("command_status {0:#010x} is not a v3.4 status code")]
    InvalidStatus(u32),

    #[error("request {command_id:#010x} carries non-zero status {status:#x}")]
    RequestStatusNotZero { command_id: u32, status: u32 },

    #[error("sequence_number 0 is reserved")]
    ReservedSequence,

    #[error("expected command_id {expected:?}, got {actual:#010x}")]
    UnexpectedCommandId { expected: CommandId, actual: u32 },

    #[error("PDU body truncated reading {field}")]
    Truncated { field: &'static str },

    #[error("{field} not NUL-terminated within its field bound")]
    UnterminatedCString { field: &'static str },

    #[error("field {field} invalid: {reason}")]
    Field { field: &'static str, reason: String },

    #[error("TLV {tag:#06x} invalid: {reason}")]
    Tlv { tag: u16, reason: &'static str },

    #[error("{count} trailing octets after PDU body")]
    TrailingBytes { count: usize },

    #[error("short_message is {length} octets, limit is 254")]
    MessageTooLong { length: usize },

    #[error("sm_length must be 0 when message_payload TLV is present")]
    PayloadConflict,
}

impl CodecError {
    /// The command_status a peer should see for this decode failure.
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::InvalidLength { .. } => CommandStatus::InvalidCommandLength,
            CodecError::UnexpectedCommandId { .. } => CommandStatus::InvalidCommandId,
            CodecError::MessageTooLong { .. } | CodecError::PayloadConflict => {
                CommandStatus::InvalidMsgLength
            }
            CodecError::Tlv { .. } => CommandStatus::InvalidOptionalParameterValue,
            _ => CommandStatus::SystemError,
        }
    }
}

/// Types that encode themselves as a complete PDU (header and body).
pub trait Encodable {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Total encoded size including the 16-octet header.
    fn encoded_size(&self) -> usize;

    /// Encode to a frozen buffer, patching command_length to the actual
    /// number of octets written.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode(&mut buf)?;
        let length = (buf.len() as u32).to_be_bytes();
        buf[0..4].copy_from_slice(&length);
        Ok(buf.freeze())
    }
}

/// Types that decode from a PDU body, given the already-parsed header.
pub trait Decodable: Sized {
    fn command_id() -> CommandId;

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != u32::from(Self::command_id()) {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

// Field primitives shared by the datatypes modules.

pub fn decode_u8(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Truncated { field });
    }
    Ok(buf.get_u8())
}

pub fn decode_u32(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Truncated { field });
    }
    Ok(buf.get_u32())
}

/// Decode a variable-length C-octet string into bounded storage. `N` is
/// the field maximum including the terminating NUL. Missing NUL within
/// the bound (or before the body ends) is an error.
pub fn decode_cstring<const N: usize>(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<FixedString<N>, CodecError> {
    let start = buf.position() as usize;
    let slice = *buf.get_ref();
    let window = &slice[start..slice.len().min(start + N)];

    let nul = window
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::UnterminatedCString { field })?;

    let value = FixedString::new(&window[..nul]).map_err(|e| CodecError::Field {
        field,
        reason: e.to_string(),
    })?;
    buf.set_position((start + nul + 1) as u64);
    Ok(value)
}

/// Encode a C-octet string: content octets then one NUL. Bounds were
/// enforced when the `FixedString` was built, so this cannot fail.
pub fn encode_cstring<const N: usize>(buf: &mut BytesMut, value: &FixedString<N>) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

/// Every PDU the engine speaks, as a tagged variant.
///
/// Session-layer dispatch matches on this enum instead of chaining on
/// command ids; ids outside the table land in `Unknown` with the raw
/// body preserved so the session can answer generic_nack
/// (InvalidCommandId) without losing the sequence number.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    BindTransmitter(BindTransmitter),
    BindTransmitterResp(BindTransmitterResp),
    BindReceiver(BindReceiver),
    BindReceiverResp(BindReceiverResp),
    BindTransceiver(BindTransceiver),
    BindTransceiverResp(BindTransceiverResp),
    Outbind(Outbind),
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResp),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResp),
    Unbind(Unbind),
    UnbindResp(UnbindResp),
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResp),
    GenericNack(GenericNack),
    Unknown {
        command_id: u32,
        command_status: u32,
        sequence_number: u32,
        body: Bytes,
    },
}

impl Pdu {
    /// Decode one complete PDU. The cursor must span exactly one frame
    /// (`command_length` octets); trailing octets are an error.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Pdu, CodecError> {
        let header = PduHeader::decode(buf)?;

        let body_len = header.command_length as usize - PduHeader::SIZE;
        if buf.remaining() < body_len {
            return Err(CodecError::Truncated { field: "body" });
        }

        let pdu = match CommandId::try_from(header.command_id) {
            Ok(CommandId::BindTransmitter) => {
                Pdu::BindTransmitter(BindTransmitter::decode(header, buf)?)
            }
            Ok(CommandId::BindTransmitterResp) => {
                Pdu::BindTransmitterResp(BindTransmitterResp::decode(header, buf)?)
            }
            Ok(CommandId::BindReceiver) => Pdu::BindReceiver(BindReceiver::decode(header, buf)?),
            Ok(CommandId::BindReceiverResp) => {
                Pdu::BindReceiverResp(BindReceiverResp::decode(header, buf)?)
            }
            Ok(CommandId::BindTransceiver) => {
                Pdu::BindTransceiver(BindTransceiver::decode(header, buf)?)
            }
            Ok(CommandId::BindTransceiverResp) => {
                Pdu::BindTransceiverResp(BindTransceiverResp::decode(header, buf)?)
            }
            Ok(CommandId::Outbind) => Pdu::Outbind(Outbind::decode(header, buf)?),
            Ok(CommandId::SubmitSm) => Pdu::SubmitSm(Box::new(SubmitSm::decode(header, buf)?)),
            Ok(CommandId::SubmitSmResp) => Pdu::SubmitSmResp(SubmitSmResp::decode(header, buf)?),
            Ok(CommandId::DeliverSm) => Pdu::DeliverSm(Box::new(DeliverSm::decode(header, buf)?)),
            Ok(CommandId::DeliverSmResp) => Pdu::DeliverSmResp(DeliverSmResp::decode(header, buf)?),
            Ok(CommandId::Unbind) => Pdu::Unbind(Unbind::decode(header, buf)?),
            Ok(CommandId::UnbindResp) => Pdu::UnbindResp(UnbindResp::decode(header, buf)?),
            Ok(CommandId::EnquireLink) => Pdu::EnquireLink(EnquireLink::decode(header, buf)?),
            Ok(CommandId::EnquireLinkResp) => {
                Pdu::EnquireLinkResp(EnquireLinkResp::decode(header, buf)?)
            }
            Ok(CommandId::GenericNack) => Pdu::GenericNack(GenericNack::decode(header, buf)?),
            Err(_) => {
                let body = buf.copy_to_bytes(body_len);
                tracing::warn!(
                    command_id = format_args!("{:#010x}", header.command_id),
                    "unknown command_id, preserving raw body"
                );
                Pdu::Unknown {
                    command_id: header.command_id,
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    body,
                }
            }
        };

        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(CodecError::TrailingBytes { count: remaining });
        }
        Ok(pdu)
    }

    /// Decode from a contiguous frame.
    pub fn from_bytes(frame: &[u8]) -> Result<Pdu, CodecError> {
        let mut cursor = Cursor::new(frame);
        Pdu::decode(&mut cursor)
    }

    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        match self {
            Pdu::BindTransmitter(p) => p.to_bytes(),
            Pdu::BindTransmitterResp(p) => p.to_bytes(),
            Pdu::BindReceiver(p) => p.to_bytes(),
            Pdu::BindReceiverResp(p) => p.to_bytes(),
            Pdu::BindTransceiver(p) => p.to_bytes(),
            Pdu::BindTransceiverResp(p) => p.to_bytes(),
            Pdu::Outbind(p) => p.to_bytes(),
            Pdu::SubmitSm(p) => p.to_bytes(),
            Pdu::SubmitSmResp(p) => p.to_bytes(),
            Pdu::DeliverSm(p) => p.to_bytes(),
            Pdu::DeliverSmResp(p) => p.to_bytes(),
            Pdu::Unbind(p) => p.to_bytes(),
            Pdu::UnbindResp(p) => p.to_bytes(),
            Pdu::EnquireLink(p) => p.to_bytes(),
            Pdu::EnquireLinkResp(p) => p.to_bytes(),
            Pdu::GenericNack(p) => p.to_bytes(),
            Pdu::Unknown {
                command_id,
                command_status,
                sequence_number,
                body,
            } => {
                let mut buf = BytesMut::with_capacity(PduHeader::SIZE + body.len());
                PduHeader {
                    command_length: (PduHeader::SIZE + body.len()) as u32,
                    command_id: *command_id,
                    command_status: *command_status,
                    sequence_number: *sequence_number,
                }
                .encode(&mut buf);
                buf.put_slice(body);
                Ok(buf.freeze())
            }
        }
    }

    /// Raw command_id, defined for every variant including `Unknown`.
    pub fn command_id(&self) -> u32 {
        match self {
            Pdu::BindTransmitter(_) => CommandId::BindTransmitter.into(),
            Pdu::BindTransmitterResp(_) => CommandId::BindTransmitterResp.into(),
            Pdu::BindReceiver(_) => CommandId::BindReceiver.into(),
            Pdu::BindReceiverResp(_) => CommandId::BindReceiverResp.into(),
            Pdu::BindTransceiver(_) => CommandId::BindTransceiver.into(),
            Pdu::BindTransceiverResp(_) => CommandId::BindTransceiverResp.into(),
            Pdu::Outbind(_) => CommandId::Outbind.into(),
            Pdu::SubmitSm(_) => CommandId::SubmitSm.into(),
            Pdu::SubmitSmResp(_) => CommandId::SubmitSmResp.into(),
            Pdu::DeliverSm(_) => CommandId::DeliverSm.into(),
            Pdu::DeliverSmResp(_) => CommandId::DeliverSmResp.into(),
            Pdu::Unbind(_) => CommandId::Unbind.into(),
            Pdu::UnbindResp(_) => CommandId::UnbindResp.into(),
            Pdu::EnquireLink(_) => CommandId::EnquireLink.into(),
            Pdu::EnquireLinkResp(_) => CommandId::EnquireLinkResp.into(),
            Pdu::GenericNack(_) => CommandId::GenericNack.into(),
            Pdu::Unknown { command_id, .. } => *command_id,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        match self {
            Pdu::BindTransmitter(p) => p.sequence_number,
            Pdu::BindTransmitterResp(p) => p.sequence_number,
            Pdu::BindReceiver(p) => p.sequence_number,
            Pdu::BindReceiverResp(p) => p.sequence_number,
            Pdu::BindTransceiver(p) => p.sequence_number,
            Pdu::BindTransceiverResp(p) => p.sequence_number,
            Pdu::Outbind(p) => p.sequence_number,
            Pdu::SubmitSm(p) => p.sequence_number,
            Pdu::SubmitSmResp(p) => p.sequence_number,
            Pdu::DeliverSm(p) => p.sequence_number,
            Pdu::DeliverSmResp(p) => p.sequence_number,
            Pdu::Unbind(p) => p.sequence_number,
            Pdu::UnbindResp(p) => p.sequence_number,
            Pdu::EnquireLink(p) => p.sequence_number,
            Pdu::EnquireLinkResp(p) => p.sequence_number,
            Pdu::GenericNack(p) => p.sequence_number,
            Pdu::Unknown {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    /// Stamp the sequence number, used by the session allocator just
    /// before a request is queued for the wire.
    pub fn set_sequence_number(&mut self, sequence: u32) {
        match self {
            Pdu::BindTransmitter(p) => p.sequence_number = sequence,
            Pdu::BindTransmitterResp(p) => p.sequence_number = sequence,
            Pdu::BindReceiver(p) => p.sequence_number = sequence,
            Pdu::BindReceiverResp(p) => p.sequence_number = sequence,
            Pdu::BindTransceiver(p) => p.sequence_number = sequence,
            Pdu::BindTransceiverResp(p) => p.sequence_number = sequence,
            Pdu::Outbind(p) => p.sequence_number = sequence,
            Pdu::SubmitSm(p) => p.sequence_number = sequence,
            Pdu::SubmitSmResp(p) => p.sequence_number = sequence,
            Pdu::DeliverSm(p) => p.sequence_number = sequence,
            Pdu::DeliverSmResp(p) => p.sequence_number = sequence,
            Pdu::Unbind(p) => p.sequence_number = sequence,
            Pdu::UnbindResp(p) => p.sequence_number = sequence,
            Pdu::EnquireLink(p) => p.sequence_number = sequence,
            Pdu::EnquireLinkResp(p) => p.sequence_number = sequence,
            Pdu::GenericNack(p) => p.sequence_number = sequence,
            Pdu::Unknown {
                sequence_number, ..
            } => *sequence_number = sequence,
        }
    }

    pub fn is_response(&self) -> bool {
        self.command_id() & RESPONSE_BIT != 0
    }

    /// Short name for logs and error messages.
    pub fn command_name(&self) -> &'static str {
        match self {
            Pdu::BindTransmitter(_) => "bind_transmitter",
            Pdu::BindTransmitterResp(_) => "bind_transmitter_resp",
            Pdu::BindReceiver(_) => "bind_receiver",
            Pdu::BindReceiverResp(_) => "bind_receiver_resp",
            Pdu::BindTransceiver(_) => "bind_transceiver",
            Pdu::BindTransceiverResp(_) => "bind_transceiver_resp",
            Pdu::Outbind(_) => "outbind",
            Pdu::SubmitSm(_) => "submit_sm",
            Pdu::SubmitSmResp(_) => "submit_sm_resp",
            Pdu::DeliverSm(_) => "deliver_sm",
            Pdu::DeliverSmResp(_) => "deliver_sm_resp",
            Pdu::Unbind(_) => "unbind",
            Pdu::UnbindResp(_) => "unbind_resp",
            Pdu::EnquireLink(_) => "enquire_link",
            Pdu::EnquireLinkResp(_) => "enquire_link_resp",
            Pdu::GenericNack(_) => "generic_nack",
            Pdu::Unknown { .. } => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = PduHeader {
            command_length: 16,
            command_id: CommandId::EnquireLink.into(),
            command_status: 0,
            sequence_number: 42,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), PduHeader::SIZE);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(PduHeader::decode(&mut cursor).unwrap(), header);
    }

    #[test]
    fn header_rejects_short_length() {
        let bytes = [
            0x00, 0x00, 0x00, 0x08, // command_length below header size
            0x00, 0x00, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            PduHeader::decode(&mut cursor),
            Err(CodecError::InvalidLength { length: 8 })
        ));
    }

    #[test]
    fn header_rejects_sequence_zero() {
        let bytes = [
            0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            PduHeader::decode(&mut cursor),
            Err(CodecError::ReservedSequence)
        ));
    }

    #[test]
    fn header_rejects_request_with_status() {
        let bytes = [
            0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x04, // submit_sm
            0x00, 0x00, 0x00, 0x08, // command_status must be 0 on requests
            0x00, 0x00, 0x00, 0x01,
        ];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            PduHeader::decode(&mut cursor),
            Err(CodecError::RequestStatusNotZero { .. })
        ));
    }

    #[test]
    fn cstring_roundtrip_at_maximum() {
        // system_id field: 16 octets including the NUL
        let value: FixedString<16> = "ABCDEFGHIJKLMNO".parse().unwrap();
        let mut buf = BytesMut::new();
        encode_cstring(&mut buf, &value);
        assert_eq!(buf.len(), 16);

        let frozen = buf.freeze();
        let mut cursor = Cursor::new(frozen.as_ref());
        let decoded: FixedString<16> = decode_cstring(&mut cursor, "system_id").unwrap();
        assert_eq!(decoded, value);
        assert_eq!(cursor.position(), 16);
    }

    #[test]
    fn cstring_decode_requires_terminator() {
        // 16 octets of content, no NUL within the field bound
        let bytes = [0x41u8; 16];
        let mut cursor = Cursor::new(&bytes[..]);
        let result: Result<FixedString<16>, _> = decode_cstring(&mut cursor, "system_id");
        assert!(matches!(
            result,
            Err(CodecError::UnterminatedCString { field: "system_id" })
        ));
    }

    #[test]
    fn cstring_empty_is_single_nul() {
        let value = FixedString::<16>::default();
        let mut buf = BytesMut::new();
        encode_cstring(&mut buf, &value);
        assert_eq!(buf.as_ref(), &[0x00]);
    }

    #[test]
    fn decode_unknown_command_preserves_body() {
        // 0x0000000A is reserved in the v3.4 table
        let mut frame = Vec::new();
        frame.extend_from_slice(&20u32.to_be_bytes());
        frame.extend_from_slice(&0x0000_000Au32.to_be_bytes());
        frame.extend_from_slice(&0u32.to_be_bytes());
        frame.extend_from_slice(&7u32.to_be_bytes());
        frame.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let pdu = Pdu::from_bytes(&frame).unwrap();
        match pdu {
            Pdu::Unknown {
                command_id,
                sequence_number,
                ref body,
                ..
            } => {
                assert_eq!(command_id, 0x0000_000A);
                assert_eq!(sequence_number, 7);
                assert_eq!(body.as_ref(), &[0xDE, 0xAD, 0xBE, 0xEF]);
            }
            other => panic!("expected Unknown, got {other:?}"),
        }

        // Unknown PDUs re-encode to the original bytes.
        let reencoded = pdu.to_bytes().unwrap();
        assert_eq!(reencoded.as_ref(), frame.as_slice());
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        // enquire_link claiming 16 octets but followed by 2 more in the frame
        let mut frame = Vec::new();
        frame.extend_from_slice(&16u32.to_be_bytes());
        frame.extend_from_slice(&0x0000_0015u32.to_be_bytes());
        frame.extend_from_slice(&0u32.to_be_bytes());
        frame.extend_from_slice(&1u32.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);

        assert!(matches!(
            Pdu::from_bytes(&frame),
            Err(CodecError::TrailingBytes { count: 2 })
        ));
    }
}
