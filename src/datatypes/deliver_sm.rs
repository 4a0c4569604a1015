// ABOUTME: deliver_sm request and response for SMSC-to-ESME message delivery
// ABOUTME: Shares the short-message body layout with submit_sm; only the direction differs

use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};

use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::submit_sm::{short_message_pdu, MAX_SHORT_MESSAGE};
use crate::datatypes::tlv::{find_tlv, tags, Tlv};
use crate::datatypes::{
    Address, CommandId, CommandStatus, NumericPlanIndicator, ServiceType, TimeString, TypeOfNumber,
};

short_message_pdu!(
    /// Deliver a short message to a bound receiver ESME (section 4.6.1).
    /// schedule_delivery_time and validity_period are NULL on delivery.
    DeliverSm,
    CommandId::DeliverSm
);

/// Response to deliver_sm (section 4.6.2). The message_id field is
/// unused and always encodes as a single NUL octet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliverSmResp {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl DeliverSmResp {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
        }
    }
}

impl Decodable for DeliverSmResp {
    fn command_id() -> CommandId {
        CommandId::DeliverSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        // message_id: C-octet string of max 1, i.e. the NUL alone.
        // Tolerate responses that omit it entirely.
        if buf.has_remaining() {
            let _ = decode_cstring::<1>(buf, "message_id")?;
        }
        Ok(Self {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for DeliverSmResp {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: self.encoded_size() as u32,
            command_id: CommandId::DeliverSmResp.into(),
            command_status: self.command_status.into(),
            sequence_number: self.sequence_number,
        }
        .encode(buf);
        buf.put_u8(0); // empty message_id
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 1
    }
}
