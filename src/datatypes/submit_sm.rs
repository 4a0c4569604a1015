// ABOUTME: submit_sm request and response, plus the shared short-message body layout
// ABOUTME: sm_length and the message_payload TLV are mutually exclusive in both directions

use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};

use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::tlv::{find_tlv, tags, Tlv};
use crate::datatypes::{
    Address, CommandId, CommandStatus, MessageId, NumericPlanIndicator, ServiceType, TimeString,
    TypeOfNumber,
};

/// Upper bound on the short_message field (section 5.2.21). Longer
/// payloads travel in the message_payload TLV with sm_length 0.
pub const MAX_SHORT_MESSAGE: usize = 254;

/// Body layout shared by submit_sm (section 4.4.1) and deliver_sm
/// (section 4.6.1): the two operations differ only in direction.
///
/// esm_class, protocol_id, priority_flag, registered_delivery,
/// replace_if_present_flag, data_coding and sm_default_msg_id are
/// carried as raw octets; the codec does not interpret or transcode
/// them.
macro_rules! short_message_pdu {
    ($(#[$meta:meta])* $pdu:ident, $command_id:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct $pdu {
            pub sequence_number: u32,
            pub service_type: ServiceType,
            pub source_addr_ton: TypeOfNumber,
            pub source_addr_npi: NumericPlanIndicator,
            pub source_addr: Address,
            pub dest_addr_ton: TypeOfNumber,
            pub dest_addr_npi: NumericPlanIndicator,
            pub destination_addr: Address,
            pub esm_class: u8,
            pub protocol_id: u8,
            pub priority_flag: u8,
            pub schedule_delivery_time: TimeString,
            pub validity_period: TimeString,
            pub registered_delivery: u8,
            pub replace_if_present_flag: u8,
            pub data_coding: u8,
            pub sm_default_msg_id: u8,
            pub short_message: Vec<u8>,
            /// Optional parameters in insertion order; unknown tags are
            /// preserved verbatim.
            pub tlvs: Vec<Tlv>,
        }

        impl $pdu {
            pub fn message_payload(&self) -> Option<&Tlv> {
                find_tlv(&self.tlvs, tags::MESSAGE_PAYLOAD)
            }

            /// The message octets, wherever they travel: short_message or
            /// the message_payload TLV.
            pub fn message_bytes(&self) -> &[u8] {
                match self.message_payload() {
                    Some(tlv) => &tlv.value,
                    None => &self.short_message,
                }
            }
        }

        impl Decodable for $pdu {
            fn command_id() -> CommandId {
                $command_id
            }

            fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                Self::validate_header(&header)?;

                let service_type = decode_cstring(buf, "service_type")?;
                let source_addr_ton = TypeOfNumber::try_from(decode_u8(buf, "source_addr_ton")?)
                    .map_err(|e| CodecError::Field {
                        field: "source_addr_ton",
                        reason: e.to_string(),
                    })?;
                let source_addr_npi =
                    NumericPlanIndicator::try_from(decode_u8(buf, "source_addr_npi")?).map_err(
                        |e| CodecError::Field {
                            field: "source_addr_npi",
                            reason: e.to_string(),
                        },
                    )?;
                let source_addr = decode_cstring(buf, "source_addr")?;
                let dest_addr_ton = TypeOfNumber::try_from(decode_u8(buf, "dest_addr_ton")?)
                    .map_err(|e| CodecError::Field {
                        field: "dest_addr_ton",
                        reason: e.to_string(),
                    })?;
                let dest_addr_npi =
                    NumericPlanIndicator::try_from(decode_u8(buf, "dest_addr_npi")?).map_err(
                        |e| CodecError::Field {
                            field: "dest_addr_npi",
                            reason: e.to_string(),
                        },
                    )?;
                let destination_addr = decode_cstring(buf, "destination_addr")?;
                let esm_class = decode_u8(buf, "esm_class")?;
                let protocol_id = decode_u8(buf, "protocol_id")?;
                let priority_flag = decode_u8(buf, "priority_flag")?;
                let schedule_delivery_time = decode_cstring(buf, "schedule_delivery_time")?;
                let validity_period = decode_cstring(buf, "validity_period")?;
                let registered_delivery = decode_u8(buf, "registered_delivery")?;
                let replace_if_present_flag = decode_u8(buf, "replace_if_present_flag")?;
                let data_coding = decode_u8(buf, "data_coding")?;
                let sm_default_msg_id = decode_u8(buf, "sm_default_msg_id")?;

                let sm_length = decode_u8(buf, "sm_length")? as usize;
                if buf.remaining() < sm_length {
                    return Err(CodecError::Truncated {
                        field: "short_message",
                    });
                }
                let mut short_message = vec![0u8; sm_length];
                buf.copy_to_slice(&mut short_message);

                let tlvs = Tlv::decode_all(buf)?;
                if find_tlv(&tlvs, tags::MESSAGE_PAYLOAD).is_some() && sm_length != 0 {
                    return Err(CodecError::PayloadConflict);
                }

                Ok(Self {
                    sequence_number: header.sequence_number,
                    service_type,
                    source_addr_ton,
                    source_addr_npi,
                    source_addr,
                    dest_addr_ton,
                    dest_addr_npi,
                    destination_addr,
                    esm_class,
                    protocol_id,
                    priority_flag,
                    schedule_delivery_time,
                    validity_period,
                    registered_delivery,
                    replace_if_present_flag,
                    data_coding,
                    sm_default_msg_id,
                    short_message,
                    tlvs,
                })
            }
        }

        impl Encodable for $pdu {
            fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
                if self.short_message.len() > MAX_SHORT_MESSAGE {
                    return Err(CodecError::MessageTooLong {
                        length: self.short_message.len(),
                    });
                }
                if self.message_payload().is_some() && !self.short_message.is_empty() {
                    return Err(CodecError::PayloadConflict);
                }

                PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $command_id.into(),
                    command_status: 0,
                    sequence_number: self.sequence_number,
                }
                .encode(buf);

                encode_cstring(buf, &self.service_type);
                buf.put_u8(self.source_addr_ton.into());
                buf.put_u8(self.source_addr_npi.into());
                encode_cstring(buf, &self.source_addr);
                buf.put_u8(self.dest_addr_ton.into());
                buf.put_u8(self.dest_addr_npi.into());
                encode_cstring(buf, &self.destination_addr);
                buf.put_u8(self.esm_class);
                buf.put_u8(self.protocol_id);
                buf.put_u8(self.priority_flag);
                encode_cstring(buf, &self.schedule_delivery_time);
                encode_cstring(buf, &self.validity_period);
                buf.put_u8(self.registered_delivery);
                buf.put_u8(self.replace_if_present_flag);
                buf.put_u8(self.data_coding);
                buf.put_u8(self.sm_default_msg_id);
                buf.put_u8(self.short_message.len() as u8);
                buf.put_slice(&self.short_message);

                for tlv in &self.tlvs {
                    tlv.validate()?;
                    tlv.encode(buf);
                }
                Ok(())
            }

            fn encoded_size(&self) -> usize {
                PduHeader::SIZE
                    + self.service_type.len() + 1
                    + 2
                    + self.source_addr.len() + 1
                    + 2
                    + self.destination_addr.len() + 1
                    + 3
                    + self.schedule_delivery_time.len() + 1
                    + self.validity_period.len() + 1
                    + 4
                    + 1
                    + self.short_message.len()
                    + self.tlvs.iter().map(Tlv::encoded_size).sum::<usize>()
            }
        }
    };
}

short_message_pdu!(
    /// Submit a short message to the SMSC (section 4.4.1).
    SubmitSm,
    CommandId::SubmitSm
);

pub(crate) use short_message_pdu;

/// Response to submit_sm carrying the SMSC-assigned message id
/// (section 4.4.2). Rejecting responses may omit the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitSmResp {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: MessageId,
}

impl SubmitSmResp {
    pub fn ok(sequence_number: u32, message_id: MessageId) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id,
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            message_id: MessageId::default(),
        }
    }
}

impl Decodable for SubmitSmResp {
    fn command_id() -> CommandId {
        CommandId::SubmitSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let message_id = if buf.has_remaining() {
            decode_cstring(buf, "message_id")?
        } else {
            MessageId::default()
        };
        Ok(Self {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

impl Encodable for SubmitSmResp {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: self.encoded_size() as u32,
            command_id: CommandId::SubmitSmResp.into(),
            command_status: self.command_status.into(),
            sequence_number: self.sequence_number,
        }
        .encode(buf);
        encode_cstring(buf, &self.message_id);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + self.message_id.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Pdu;
    use bytes::Bytes;

    fn sample() -> SubmitSm {
        SubmitSm {
            sequence_number: 5,
            source_addr: "1234".parse().unwrap(),
            source_addr_ton: TypeOfNumber::International,
            source_addr_npi: NumericPlanIndicator::Isdn,
            destination_addr: "5678".parse().unwrap(),
            dest_addr_ton: TypeOfNumber::International,
            dest_addr_npi: NumericPlanIndicator::Isdn,
            short_message: b"Hello".to_vec(),
            ..SubmitSm::default()
        }
    }

    #[test]
    fn submit_sm_wire_form() {
        let bytes = sample().to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            // 16 header + 1 service_type + 2 + 5 source + 2 + 5 dest
            // + 3 + 1 + 1 + 4 + 1 sm_length + 5 message = 46
            0x00, 0x00, 0x00, 0x2E, // command_length
            0x00, 0x00, 0x00, 0x04, // submit_sm
            0x00, 0x00, 0x00, 0x00, // status
            0x00, 0x00, 0x00, 0x05, // sequence
            0x00, // service_type: empty
            0x01, 0x01, // source ton/npi
            0x31, 0x32, 0x33, 0x34, 0x00, // "1234"
            0x01, 0x01, // dest ton/npi
            0x35, 0x36, 0x37, 0x38, 0x00, // "5678"
            0x00, 0x00, 0x00, // esm_class, protocol_id, priority_flag
            0x00, // schedule_delivery_time: empty
            0x00, // validity_period: empty
            0x00, 0x00, 0x00, 0x00, // registered_delivery..sm_default_msg_id
            0x05, // sm_length
            0x48, 0x65, 0x6C, 0x6C, 0x6F, // "Hello"
        ];
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn submit_sm_roundtrip() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();
        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::SubmitSm(decoded) => assert_eq!(*decoded, original),
            other => panic!("expected SubmitSm, got {other:?}"),
        }
    }

    #[test]
    fn roundtrip_with_tlvs_preserves_order() {
        let mut pdu = sample();
        pdu.tlvs = vec![
            Tlv::new(0x1501, vec![0xAA]), // unknown tag survives
            Tlv::new(tags::USER_MESSAGE_REFERENCE, vec![0x00, 0x09]),
        ];
        let bytes = pdu.to_bytes().unwrap();
        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::SubmitSm(decoded) => assert_eq!(decoded.tlvs, pdu.tlvs),
            other => panic!("expected SubmitSm, got {other:?}"),
        }
    }

    #[test]
    fn short_message_at_limit_roundtrips() {
        let mut pdu = sample();
        pdu.short_message = vec![0x41; MAX_SHORT_MESSAGE];
        let bytes = pdu.to_bytes().unwrap();
        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::SubmitSm(decoded) => {
                assert_eq!(decoded.short_message.len(), MAX_SHORT_MESSAGE)
            }
            other => panic!("expected SubmitSm, got {other:?}"),
        }
    }

    #[test]
    fn short_message_over_limit_is_rejected() {
        let mut pdu = sample();
        pdu.short_message = vec![0x41; MAX_SHORT_MESSAGE + 1];
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::MessageTooLong { length: 255 })
        ));
    }

    #[test]
    fn long_payload_travels_in_tlv() {
        let mut pdu = sample();
        pdu.short_message = Vec::new();
        pdu.tlvs = vec![Tlv::new(
            tags::MESSAGE_PAYLOAD,
            Bytes::from(vec![0x42; 1000]),
        )];
        let bytes = pdu.to_bytes().unwrap();
        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::SubmitSm(decoded) => {
                assert_eq!(decoded.short_message.len(), 0);
                assert_eq!(decoded.message_bytes().len(), 1000);
            }
            other => panic!("expected SubmitSm, got {other:?}"),
        }
    }

    #[test]
    fn payload_tlv_with_nonzero_sm_length_is_rejected() {
        let mut pdu = sample();
        pdu.tlvs = vec![Tlv::new(tags::MESSAGE_PAYLOAD, Bytes::from_static(b"x"))];
        // short_message still holds "Hello"
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::PayloadConflict)
        ));
    }

    #[test]
    fn submit_sm_resp_roundtrip() {
        let resp = SubmitSmResp::ok(5, "MSG_000001".parse().unwrap());
        let bytes = resp.to_bytes().unwrap();
        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::SubmitSmResp(decoded) => assert_eq!(decoded, resp),
            other => panic!("expected SubmitSmResp, got {other:?}"),
        }
    }

    #[test]
    fn submit_sm_resp_error_without_body() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&16u32.to_be_bytes());
        frame.extend_from_slice(&0x8000_0004u32.to_be_bytes());
        frame.extend_from_slice(&0x0000_0008u32.to_be_bytes()); // system error
        frame.extend_from_slice(&5u32.to_be_bytes());

        match Pdu::from_bytes(&frame).unwrap() {
            Pdu::SubmitSmResp(resp) => {
                assert_eq!(resp.command_status, CommandStatus::SystemError);
                assert!(resp.message_id.is_empty());
            }
            other => panic!("expected SubmitSmResp, got {other:?}"),
        }
    }
}
