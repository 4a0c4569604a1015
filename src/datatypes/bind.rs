// ABOUTME: bind_transmitter / bind_receiver / bind_transceiver requests and responses
// ABOUTME: The three pairs share one body layout; a local macro stamps out the variants

use std::io::Cursor;

use bytes::BytesMut;

use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::tlv::{tags, Tlv};
use crate::datatypes::{
    AddressRange, CommandId, CommandStatus, InterfaceVersion, NumericPlanIndicator, Password,
    SystemId, SystemType, TypeOfNumber,
};

/// The three bind modes of section 2.1: transmitter (submit only),
/// receiver (deliver only), transceiver (both).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindMode {
    Transmitter,
    Receiver,
    Transceiver,
}

// Request body: system_id C16, password C9, system_type C13,
// interface_version u8, addr_ton u8, addr_npi u8, address_range C41.
macro_rules! bind_request_pdu {
    ($(#[$meta:meta])* $pdu:ident, $command_id:expr, $mode:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct $pdu {
            pub sequence_number: u32,
            pub system_id: SystemId,
            pub password: Password,
            pub system_type: SystemType,
            pub interface_version: InterfaceVersion,
            pub addr_ton: TypeOfNumber,
            pub addr_npi: NumericPlanIndicator,
            pub address_range: AddressRange,
        }

        impl $pdu {
            pub fn mode(&self) -> BindMode {
                $mode
            }
        }

        impl Decodable for $pdu {
            fn command_id() -> CommandId {
                $command_id
            }

            fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                Self::validate_header(&header)?;

                let system_id = decode_cstring(buf, "system_id")?;
                let password = decode_cstring(buf, "password")?;
                let system_type = decode_cstring(buf, "system_type")?;
                let interface_version = InterfaceVersion::try_from(
                    decode_u8(buf, "interface_version")?,
                )
                .map_err(|e| CodecError::Field {
                    field: "interface_version",
                    reason: e.to_string(),
                })?;
                let addr_ton = TypeOfNumber::try_from(decode_u8(buf, "addr_ton")?).map_err(
                    |e| CodecError::Field {
                        field: "addr_ton",
                        reason: e.to_string(),
                    },
                )?;
                let addr_npi = NumericPlanIndicator::try_from(decode_u8(buf, "addr_npi")?)
                    .map_err(|e| CodecError::Field {
                        field: "addr_npi",
                        reason: e.to_string(),
                    })?;
                let address_range = decode_cstring(buf, "address_range")?;

                Ok(Self {
                    sequence_number: header.sequence_number,
                    system_id,
                    password,
                    system_type,
                    interface_version,
                    addr_ton,
                    addr_npi,
                    address_range,
                })
            }
        }

        impl Encodable for $pdu {
            fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
                PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $command_id.into(),
                    command_status: 0,
                    sequence_number: self.sequence_number,
                }
                .encode(buf);

                encode_cstring(buf, &self.system_id);
                encode_cstring(buf, &self.password);
                encode_cstring(buf, &self.system_type);
                buf.put_u8(self.interface_version.into());
                buf.put_u8(self.addr_ton.into());
                buf.put_u8(self.addr_npi.into());
                encode_cstring(buf, &self.address_range);
                Ok(())
            }

            fn encoded_size(&self) -> usize {
                PduHeader::SIZE
                    + self.system_id.len() + 1
                    + self.password.len() + 1
                    + self.system_type.len() + 1
                    + 3
                    + self.address_range.len() + 1
            }
        }
    };
}

// Response body: system_id C16, optional sc_interface_version TLV.
// A rejecting SMSC may send no body at all; that decodes to defaults.
macro_rules! bind_response_pdu {
    ($(#[$meta:meta])* $pdu:ident, $command_id:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $pdu {
            pub command_status: CommandStatus,
            pub sequence_number: u32,
            pub system_id: SystemId,
            pub sc_interface_version: Option<Tlv>,
        }

        impl $pdu {
            pub fn ok(sequence_number: u32, system_id: SystemId) -> Self {
                Self {
                    command_status: CommandStatus::Ok,
                    sequence_number,
                    system_id,
                    sc_interface_version: None,
                }
            }

            pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                    system_id: SystemId::default(),
                    sc_interface_version: None,
                }
            }
        }

        impl Decodable for $pdu {
            fn command_id() -> CommandId {
                $command_id
            }

            fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                Self::validate_header(&header)?;
                let command_status = header.status()?;

                use bytes::Buf;
                let (system_id, sc_interface_version) = if buf.has_remaining() {
                    let system_id = decode_cstring(buf, "system_id")?;
                    let tlv = if buf.has_remaining() {
                        let tlv = Tlv::decode(buf)?;
                        if tlv.tag != tags::SC_INTERFACE_VERSION {
                            return Err(CodecError::Tlv {
                                tag: tlv.tag,
                                reason: "only sc_interface_version is defined for bind responses",
                            });
                        }
                        Some(tlv)
                    } else {
                        None
                    };
                    (system_id, tlv)
                } else {
                    (SystemId::default(), None)
                };

                Ok(Self {
                    command_status,
                    sequence_number: header.sequence_number,
                    system_id,
                    sc_interface_version,
                })
            }
        }

        impl Encodable for $pdu {
            fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
                PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $command_id.into(),
                    command_status: self.command_status.into(),
                    sequence_number: self.sequence_number,
                }
                .encode(buf);

                encode_cstring(buf, &self.system_id);
                if let Some(ref tlv) = self.sc_interface_version {
                    tlv.encode(buf);
                }
                Ok(())
            }

            fn encoded_size(&self) -> usize {
                PduHeader::SIZE
                    + self.system_id.len() + 1
                    + self
                        .sc_interface_version
                        .as_ref()
                        .map_or(0, |tlv| tlv.encoded_size())
            }
        }
    };
}

use bytes::BufMut;

bind_request_pdu!(
    /// Bind as a transmitter ESME (section 4.1.1).
    BindTransmitter,
    CommandId::BindTransmitter,
    BindMode::Transmitter
);
bind_request_pdu!(
    /// Bind as a receiver ESME (section 4.1.3).
    BindReceiver,
    CommandId::BindReceiver,
    BindMode::Receiver
);
bind_request_pdu!(
    /// Bind as a transceiver ESME (section 4.2.5).
    BindTransceiver,
    CommandId::BindTransceiver,
    BindMode::Transceiver
);

bind_response_pdu!(BindTransmitterResp, CommandId::BindTransmitterResp);
bind_response_pdu!(BindReceiverResp, CommandId::BindReceiverResp);
bind_response_pdu!(BindTransceiverResp, CommandId::BindTransceiverResp);

/// Uniform view over the three bind requests, used by the acceptor so
/// authentication and response construction need not branch per type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindRequest {
    Transmitter(BindTransmitter),
    Receiver(BindReceiver),
    Transceiver(BindTransceiver),
}

impl BindRequest {
    pub fn mode(&self) -> BindMode {
        match self {
            BindRequest::Transmitter(_) => BindMode::Transmitter,
            BindRequest::Receiver(_) => BindMode::Receiver,
            BindRequest::Transceiver(_) => BindMode::Transceiver,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        match self {
            BindRequest::Transmitter(p) => p.sequence_number,
            BindRequest::Receiver(p) => p.sequence_number,
            BindRequest::Transceiver(p) => p.sequence_number,
        }
    }

    pub fn system_id(&self) -> &SystemId {
        match self {
            BindRequest::Transmitter(p) => &p.system_id,
            BindRequest::Receiver(p) => &p.system_id,
            BindRequest::Transceiver(p) => &p.system_id,
        }
    }

    pub fn password(&self) -> &Password {
        match self {
            BindRequest::Transmitter(p) => &p.password,
            BindRequest::Receiver(p) => &p.password,
            BindRequest::Transceiver(p) => &p.password,
        }
    }

    pub fn system_type(&self) -> &SystemType {
        match self {
            BindRequest::Transmitter(p) => &p.system_type,
            BindRequest::Receiver(p) => &p.system_type,
            BindRequest::Transceiver(p) => &p.system_type,
        }
    }

    pub fn interface_version(&self) -> InterfaceVersion {
        match self {
            BindRequest::Transmitter(p) => p.interface_version,
            BindRequest::Receiver(p) => p.interface_version,
            BindRequest::Transceiver(p) => p.interface_version,
        }
    }

    /// Build the matching response PDU, echoing this request's sequence.
    pub fn response(&self, status: CommandStatus, system_id: SystemId) -> crate::codec::Pdu {
        let seq = self.sequence_number();
        match self {
            BindRequest::Transmitter(_) => crate::codec::Pdu::BindTransmitterResp(
                BindTransmitterResp {
                    command_status: status,
                    sequence_number: seq,
                    system_id,
                    sc_interface_version: None,
                },
            ),
            BindRequest::Receiver(_) => crate::codec::Pdu::BindReceiverResp(BindReceiverResp {
                command_status: status,
                sequence_number: seq,
                system_id,
                sc_interface_version: None,
            }),
            BindRequest::Transceiver(_) => {
                crate::codec::Pdu::BindTransceiverResp(BindTransceiverResp {
                    command_status: status,
                    sequence_number: seq,
                    system_id,
                    sc_interface_version: None,
                })
            }
        }
    }
}
