// ABOUTME: outbind PDU: an SMSC's request that the ESME open a bind (section 4.1.4)
// ABOUTME: Decode and encode only; no session state transition is attached to it

use std::io::Cursor;

use bytes::BytesMut;

use crate::codec::{
    decode_cstring, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{CommandId, Password, SystemId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outbind {
    pub sequence_number: u32,
    pub system_id: SystemId,
    pub password: Password,
}

impl Outbind {
    pub fn new(sequence_number: u32, system_id: SystemId, password: Password) -> Self {
        Self {
            sequence_number,
            system_id,
            password,
        }
    }
}

impl Decodable for Outbind {
    fn command_id() -> CommandId {
        CommandId::Outbind
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        Ok(Self {
            sequence_number: header.sequence_number,
            system_id: decode_cstring(buf, "system_id")?,
            password: decode_cstring(buf, "password")?,
        })
    }
}

impl Encodable for Outbind {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: self.encoded_size() as u32,
            command_id: CommandId::Outbind.into(),
            command_status: 0,
            sequence_number: self.sequence_number,
        }
        .encode(buf);
        encode_cstring(buf, &self.system_id);
        encode_cstring(buf, &self.password);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + self.system_id.len() + 1 + self.password.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Pdu;

    #[test]
    fn outbind_roundtrip() {
        let original = Outbind::new(
            789,
            "TEST".parse().unwrap(),
            "secret".parse().unwrap(),
        );
        let bytes = original.to_bytes().unwrap();
        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::Outbind(decoded) => assert_eq!(decoded, original),
            other => panic!("expected Outbind, got {other:?}"),
        }
    }

    #[test]
    fn outbind_wire_form() {
        let bytes = Outbind::new(1, "SMSC".parse().unwrap(), Password::default())
            .to_bytes()
            .unwrap();
        let expected = [
            0x00, 0x00, 0x00, 0x16, // 16 + 5 + 1
            0x00, 0x00, 0x00, 0x0B, // outbind
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, //
            0x53, 0x4D, 0x53, 0x43, 0x00, // "SMSC"
            0x00, // empty password
        ];
        assert_eq!(bytes.as_ref(), &expected);
    }
}
