// ABOUTME: PDU domain types: field storage, enumerations, and one module per PDU family

mod bind;
mod command_id;
mod command_status;
mod deliver_sm;
mod fixed_string;
mod link;
mod numeric;
mod outbind;
mod submit_sm;
pub mod tlv;

pub use bind::{
    BindMode, BindReceiver, BindReceiverResp, BindRequest, BindTransceiver, BindTransceiverResp,
    BindTransmitter, BindTransmitterResp,
};
pub use command_id::{CommandId, RESPONSE_BIT};
pub use command_status::CommandStatus;
pub use deliver_sm::{DeliverSm, DeliverSmResp};
pub use fixed_string::{FixedString, FixedStringError};
pub use link::{EnquireLink, EnquireLinkResp, GenericNack, Unbind, UnbindResp};
pub use numeric::{InterfaceVersion, NumericPlanIndicator, TypeOfNumber};
pub use outbind::Outbind;
pub use submit_sm::{SubmitSm, SubmitSmResp, MAX_SHORT_MESSAGE};
pub use tlv::Tlv;

/// ESME or SMSC identity, max 15 octets plus NUL (section 5.2.1).
pub type SystemId = FixedString<16>;

/// Bind password, max 8 octets plus NUL (section 5.2.2).
pub type Password = FixedString<9>;

/// ESME classification, max 12 octets plus NUL (section 5.2.3).
pub type SystemType = FixedString<13>;

/// SME address filter served by the ESME (section 5.2.7).
pub type AddressRange = FixedString<41>;

/// SMS application service indicator (section 5.2.11).
pub type ServiceType = FixedString<6>;

/// Source or destination SME address (sections 5.2.8-5.2.9).
pub type Address = FixedString<21>;

/// SMSC-assigned message identifier (section 5.2.23).
pub type MessageId = FixedString<65>;

/// Absolute or relative SMPP time format (section 7.1).
pub type TimeString = FixedString<17>;
