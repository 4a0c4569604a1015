// ABOUTME: Tag-Length-Value optional parameters trailing the mandatory PDU body
// ABOUTME: Known tags are validated against the registry; unknown tags pass through verbatim

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use crate::codec::CodecError;

/// Recognized optional parameter tags (specification Table 5-26).
pub mod tags {
    pub const PAYLOAD_TYPE: u16 = 0x0019;
    pub const ADDITIONAL_STATUS_INFO_TEXT: u16 = 0x001D;
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    pub const MS_MSG_WAIT_FACILITIES: u16 = 0x0030;
    pub const PRIVACY_INDICATOR: u16 = 0x0201;
    pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
    pub const SOURCE_PORT: u16 = 0x020A;
    pub const DESTINATION_PORT: u16 = 0x020B;
    pub const SAR_MSG_REF_NUM: u16 = 0x020C;
    pub const LANGUAGE_INDICATOR: u16 = 0x020D;
    pub const SAR_TOTAL_SEGMENTS: u16 = 0x020E;
    pub const SAR_SEGMENT_SEQNUM: u16 = 0x020F;
    pub const SC_INTERFACE_VERSION: u16 = 0x0210;
    pub const NETWORK_ERROR_CODE: u16 = 0x0423;
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
    pub const DELIVERY_FAILURE_REASON: u16 = 0x0425;
    pub const MORE_MESSAGES_TO_SEND: u16 = 0x0426;
    pub const MESSAGE_STATE: u16 = 0x0427;
}

/// A single optional parameter: tag (u16 BE), length (u16 BE), value.
///
/// The wire length field always equals `value.len()`; it is derived on
/// encode rather than stored, so a TLV can never be emitted inconsistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u16,
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Encoded size: 2 octets tag, 2 octets length, value.
    pub fn encoded_size(&self) -> usize {
        4 + self.value.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tag);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::Tlv {
                tag: 0,
                reason: "truncated TLV header",
            });
        }
        let tag = buf.get_u16();
        let length = buf.get_u16() as usize;
        if buf.remaining() < length {
            return Err(CodecError::Tlv {
                tag,
                reason: "TLV value exceeds remaining body",
            });
        }
        let value = buf.copy_to_bytes(length);
        let tlv = Self { tag, value };
        tlv.validate()?;
        Ok(tlv)
    }

    /// Validate value-length constraints for recognized tags. Unknown
    /// tags are preserved verbatim and always pass.
    pub fn validate(&self) -> Result<(), CodecError> {
        let len = self.value.len();
        let ok = match self.tag {
            tags::USER_MESSAGE_REFERENCE
            | tags::SAR_MSG_REF_NUM
            | tags::SOURCE_PORT
            | tags::DESTINATION_PORT => len == 2,
            tags::SC_INTERFACE_VERSION
            | tags::SAR_TOTAL_SEGMENTS
            | tags::SAR_SEGMENT_SEQNUM
            | tags::MORE_MESSAGES_TO_SEND
            | tags::PAYLOAD_TYPE
            | tags::PRIVACY_INDICATOR
            | tags::LANGUAGE_INDICATOR
            | tags::MESSAGE_STATE
            | tags::DELIVERY_FAILURE_REASON
            | tags::MS_MSG_WAIT_FACILITIES => len == 1,
            tags::RECEIPTED_MESSAGE_ID => len <= 65,
            tags::NETWORK_ERROR_CODE => len == 3,
            // message_payload is bounded only by the frame size
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(CodecError::Tlv {
                tag: self.tag,
                reason: "value length outside the registered bound",
            })
        }
    }

    /// Decode all TLVs remaining in the body, strictly in wire order.
    pub fn decode_all(buf: &mut Cursor<&[u8]>) -> Result<Vec<Tlv>, CodecError> {
        let mut tlvs = Vec::new();
        while buf.has_remaining() {
            tlvs.push(Tlv::decode(buf)?);
        }
        Ok(tlvs)
    }
}

/// Find the first TLV with the given tag.
pub fn find_tlv(tlvs: &[Tlv], tag: u16) -> Option<&Tlv> {
    tlvs.iter().find(|t| t.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_basic() {
        let tlv = Tlv::new(0x0204, vec![0x00, 0x2A]);
        let mut buf = BytesMut::new();
        tlv.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x02, 0x04, 0x00, 0x02, 0x00, 0x2A]);
    }

    #[test]
    fn encode_empty_value() {
        let tlv = Tlv::new(0x1403, Bytes::new());
        let mut buf = BytesMut::new();
        tlv.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x14, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn decode_roundtrip() {
        let tlv = Tlv::new(tags::MESSAGE_PAYLOAD, &b"hello, payload"[..]);
        let mut buf = BytesMut::new();
        tlv.encode(&mut buf);

        let frozen = buf.freeze();
        let mut cursor = Cursor::new(frozen.as_ref());
        let decoded = Tlv::decode(&mut cursor).unwrap();
        assert_eq!(decoded, tlv);
        assert_eq!(cursor.position() as usize, frozen.len());
    }

    #[test]
    fn decode_all_preserves_order() {
        let a = Tlv::new(0x1501, vec![0x01]); // unknown tag, preserved
        let b = Tlv::new(tags::USER_MESSAGE_REFERENCE, vec![0x00, 0x07]);
        let mut buf = BytesMut::new();
        a.encode(&mut buf);
        b.encode(&mut buf);

        let frozen = buf.freeze();
        let mut cursor = Cursor::new(frozen.as_ref());
        let tlvs = Tlv::decode_all(&mut cursor).unwrap();
        assert_eq!(tlvs, vec![a, b]);
    }

    #[test]
    fn decode_truncated_value() {
        let bytes = [0x02u8, 0x04, 0x00, 0x05, 0x01]; // claims 5 octets, has 1
        let mut cursor = Cursor::new(&bytes[..]);
        let err = Tlv::decode(&mut cursor).unwrap_err();
        assert!(matches!(err, CodecError::Tlv { tag: 0x0204, .. }));
    }

    #[test]
    fn known_tag_length_enforced() {
        let bad = Tlv::new(tags::USER_MESSAGE_REFERENCE, vec![0x01]); // needs 2
        assert!(bad.validate().is_err());

        let good = Tlv::new(tags::USER_MESSAGE_REFERENCE, vec![0x00, 0x01]);
        assert!(good.validate().is_ok());
    }

    #[test]
    fn unknown_tag_passes_validation() {
        let tlv = Tlv::new(0x1600, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(tlv.validate().is_ok());
    }
}
