// ABOUTME: SMPP v3.4 command identifiers for the PDU types this engine services
// ABOUTME: Bit 31 marks a response; the response id of request X is X | 0x80000000

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Mask for the response indicator bit in a command_id.
pub const RESPONSE_BIT: u32 = 0x8000_0000;

/// SMPP v3.4 command identifiers (specification Table 4-1).
///
/// Only the operations of the v3.4 session core are listed; ids outside
/// this table decode to `Pdu::Unknown` and are answered with
/// `generic_nack` carrying `InvalidCommandId`.
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    GenericNack = 0x8000_0000,

    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    BindTransmitter = 0x0000_0002,
    BindTransmitterResp = 0x8000_0002,

    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,
    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,

    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,

    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,

    /// SMSC-initiated request for the ESME to bind (decode-only here;
    /// no session transition is driven by it).
    Outbind = 0x0000_000B,

    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,
}

impl CommandId {
    /// Whether this id carries the response bit.
    pub fn is_response(self) -> bool {
        u32::from(self) & RESPONSE_BIT != 0
    }

    /// The response id paired with this request id. Meaningless for ids
    /// that already carry the response bit.
    pub fn response_id(self) -> u32 {
        u32::from(self) | RESPONSE_BIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_bit() {
        assert!(!CommandId::SubmitSm.is_response());
        assert!(CommandId::SubmitSmResp.is_response());
        assert!(CommandId::GenericNack.is_response());
        assert_eq!(
            CommandId::SubmitSm.response_id(),
            u32::from(CommandId::SubmitSmResp)
        );
        assert_eq!(
            CommandId::BindTransceiver.response_id(),
            u32::from(CommandId::BindTransceiverResp)
        );
    }

    #[test]
    fn reserved_ids_are_rejected() {
        assert!(CommandId::try_from(0x0000_000Au32).is_err());
        assert!(CommandId::try_from(0x0000_0103u32).is_err());
    }
}
