// ABOUTME: SMPP v3.4 command_status codes carried on response PDU headers
// ABOUTME: Requests carry 0; any other value on a request is a protocol error

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// SMPP v3.4 error status codes (specification Table 5-2).
///
/// Returned by the peer in the command_status field of a response
/// header. Requests must carry `Ok` (0).
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// No error (ESME_ROK)
    Ok = 0x0000_0000,
    /// Message length is invalid (ESME_RINVMSGLEN)
    InvalidMsgLength = 0x0000_0001,
    /// Command length is invalid (ESME_RINVCMDLEN)
    InvalidCommandLength = 0x0000_0002,
    /// Invalid command id (ESME_RINVCMDID)
    InvalidCommandId = 0x0000_0003,
    /// Incorrect bind status for given command (ESME_RINVBNDSTS)
    IncorrectBindStatus = 0x0000_0004,
    /// ESME already in bound state (ESME_RALYBND)
    AlreadyBound = 0x0000_0005,
    /// Invalid priority flag (ESME_RINVPRTFLG)
    InvalidPriorityFlag = 0x0000_0006,
    /// Invalid registered delivery flag (ESME_RINVREGDLVFLG)
    InvalidRegisteredDeliveryFlag = 0x0000_0007,
    /// System error (ESME_RSYSERR)
    SystemError = 0x0000_0008,
    /// Invalid source address (ESME_RINVSRCADR)
    InvalidSourceAddress = 0x0000_000A,
    /// Invalid destination address (ESME_RINVDSTADR)
    InvalidDestinationAddress = 0x0000_000B,
    /// Message id is invalid (ESME_RINVMSGID)
    InvalidMessageId = 0x0000_000C,
    /// Bind failed (ESME_RBINDFAIL)
    BindFailed = 0x0000_000D,
    /// Invalid password (ESME_RINVPASWD)
    InvalidPassword = 0x0000_000E,
    /// Invalid system_id (ESME_RINVSYSID)
    InvalidSystemId = 0x0000_000F,
    /// cancel_sm failed (ESME_RCANCELFAIL)
    CancelSmFailed = 0x0000_0011,
    /// replace_sm failed (ESME_RREPLACEFAIL)
    ReplaceSmFailed = 0x0000_0013,
    /// Message queue full (ESME_RMSGQFUL)
    MessageQueueFull = 0x0000_0014,
    /// Invalid service_type (ESME_RINVSERTYP)
    InvalidServiceType = 0x0000_0015,
    /// Invalid number of destinations (ESME_RINVNUMDESTS)
    InvalidNumberOfDestinations = 0x0000_0033,
    /// Invalid distribution list name (ESME_RINVDLNAME)
    InvalidDistributionListName = 0x0000_0034,
    /// Invalid destination flag (ESME_RINVDESTFLAG)
    InvalidDestinationFlag = 0x0000_0040,
    /// Invalid submit-with-replace request (ESME_RINVSUBREP)
    InvalidSubmitWithReplace = 0x0000_0042,
    /// Invalid esm_class field data (ESME_RINVESMCLASS)
    InvalidEsmClass = 0x0000_0043,
    /// Cannot submit to distribution list (ESME_RCNTSUBDL)
    CannotSubmitToDistributionList = 0x0000_0044,
    /// submit_sm failed (ESME_RSUBMITFAIL)
    SubmitFailed = 0x0000_0045,
    /// Invalid source address TON (ESME_RINVSRCTON)
    InvalidSourceTon = 0x0000_0048,
    /// Invalid source address NPI (ESME_RINVSRCNPI)
    InvalidSourceNpi = 0x0000_0049,
    /// Invalid destination address TON (ESME_RINVDSTTON)
    InvalidDestTon = 0x0000_0050,
    /// Invalid destination address NPI (ESME_RINVDSTNPI)
    InvalidDestNpi = 0x0000_0051,
    /// Invalid system_type field (ESME_RINVSYSTYP)
    InvalidSystemType = 0x0000_0053,
    /// Invalid replace_if_present flag (ESME_RINVREPFLAG)
    InvalidReplaceIfPresentFlag = 0x0000_0054,
    /// Invalid number of messages (ESME_RINVNUMMSGS)
    InvalidNumberOfMessages = 0x0000_0055,
    /// Throttling error, ESME exceeded its message limits (ESME_RTHROTTLED)
    Throttled = 0x0000_0058,
    /// Invalid scheduled delivery time (ESME_RINVSCHED)
    InvalidScheduledDeliveryTime = 0x0000_0061,
    /// Invalid validity period (ESME_RINVEXPIRY)
    InvalidValidityPeriod = 0x0000_0062,
    /// Predefined message invalid or not found (ESME_RINVDFTMSGID)
    InvalidPredefinedMessage = 0x0000_0063,
    /// ESME receiver temporary app error (ESME_RX_T_APPN)
    ReceiverTemporaryError = 0x0000_0064,
    /// ESME receiver permanent app error (ESME_RX_P_APPN)
    ReceiverPermanentError = 0x0000_0065,
    /// ESME receiver reject message error (ESME_RX_R_APPN)
    ReceiverRejectError = 0x0000_0066,
    /// query_sm request failed (ESME_RQUERYFAIL)
    QuerySmFailed = 0x0000_0067,
    /// Error in the optional part of the PDU body (ESME_RINVOPTPARSTREAM)
    InvalidOptionalParameters = 0x0000_00C0,
    /// Optional parameter not allowed (ESME_ROPTPARNOTALLWD)
    OptionalParameterNotAllowed = 0x0000_00C1,
    /// Invalid parameter length (ESME_RINVPARLEN)
    InvalidParameterLength = 0x0000_00C2,
    /// Expected optional parameter missing (ESME_RMISSINGOPTPARAM)
    MissingOptionalParameter = 0x0000_00C3,
    /// Invalid optional parameter value (ESME_RINVOPTPARAMVAL)
    InvalidOptionalParameterValue = 0x0000_00C4,
    /// Delivery failure, used for data_sm_resp (ESME_RDELIVERYFAILURE)
    DeliveryFailure = 0x0000_00FE,
    /// Unknown error (ESME_RUNKNOWNERR)
    UnknownError = 0x0000_00FF,
}

impl CommandStatus {
    pub fn is_ok(self) -> bool {
        self == CommandStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        assert_eq!(u32::from(CommandStatus::Ok), 0);
        assert_eq!(u32::from(CommandStatus::InvalidCommandId), 0x03);
        assert_eq!(u32::from(CommandStatus::IncorrectBindStatus), 0x04);
        assert_eq!(u32::from(CommandStatus::InvalidPassword), 0x0E);
        assert_eq!(u32::from(CommandStatus::Throttled), 0x58);
    }

    #[test]
    fn reserved_values_are_rejected() {
        assert!(CommandStatus::try_from(0x0000_0009u32).is_err());
        assert!(CommandStatus::try_from(0x0000_0100u32).is_err());
    }
}
