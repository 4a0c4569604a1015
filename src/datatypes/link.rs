// ABOUTME: Header-only session PDUs: enquire_link, unbind, their responses, generic_nack

use crate::macros::header_only_pdu;

header_only_pdu!(
    /// Liveness probe exchanged in either direction (section 4.11.1).
    EnquireLink,
    crate::datatypes::CommandId::EnquireLink
);

header_only_pdu!(
    /// Acknowledges an enquire_link; always carries status 0.
    EnquireLinkResp,
    crate::datatypes::CommandId::EnquireLinkResp
);

header_only_pdu!(
    /// Request to release the bound session (section 4.2.1).
    Unbind,
    crate::datatypes::CommandId::Unbind
);

header_only_pdu!(
    /// Acknowledges an unbind request.
    UnbindResp,
    crate::datatypes::CommandId::UnbindResp
);

header_only_pdu!(
    /// Error acknowledgement for a PDU whose command_id or framing could
    /// not be understood (section 4.3.1). The sequence number echoes the
    /// offending PDU where it was recoverable.
    GenericNack,
    crate::datatypes::CommandId::GenericNack
);

impl GenericNack {
    pub fn invalid_command_id(sequence_number: u32) -> Self {
        Self::error(
            sequence_number,
            crate::datatypes::CommandStatus::InvalidCommandId,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decodable, Encodable, Pdu, PduHeader};
    use crate::datatypes::CommandStatus;
    use std::io::Cursor;

    #[test]
    fn enquire_link_wire_form() {
        let bytes = EnquireLink::new(42).to_bytes().unwrap();
        let expected = [
            0x00, 0x00, 0x00, 0x10, // command_length = 16
            0x00, 0x00, 0x00, 0x15, // enquire_link
            0x00, 0x00, 0x00, 0x00, // status
            0x00, 0x00, 0x00, 0x2A, // sequence 42
        ];
        assert_eq!(bytes.as_ref(), &expected);
    }

    #[test]
    fn unbind_roundtrip() {
        let original = Unbind::new(123);
        let bytes = original.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = Unbind::decode(header, &mut cursor).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn generic_nack_carries_error_status() {
        let nack = GenericNack::invalid_command_id(7);
        let bytes = nack.to_bytes().unwrap();

        match Pdu::from_bytes(&bytes).unwrap() {
            Pdu::GenericNack(decoded) => {
                assert_eq!(decoded.command_status, CommandStatus::InvalidCommandId);
                assert_eq!(decoded.sequence_number, 7);
            }
            other => panic!("expected GenericNack, got {other:?}"),
        }
    }

    #[test]
    fn empty_body_parses_at_minimum_length() {
        // command_length == 16 with no body is the minimum legal frame
        let frame = [
            0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x05,
        ];
        assert!(matches!(Pdu::from_bytes(&frame), Ok(Pdu::Unbind(_))));
    }
}
