// ABOUTME: Crate-internal macros cutting boilerplate for header-only PDUs and builders

/// Implement `Encodable`/`Decodable` plus the usual constructors for a
/// PDU that consists of the 16-octet header alone (enquire_link, unbind,
/// their responses, generic_nack).
macro_rules! header_only_pdu {
    ($(#[$meta:meta])* $pdu:ident, $command_id:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $pdu {
            pub command_status: $crate::datatypes::CommandStatus,
            pub sequence_number: u32,
        }

        impl $pdu {
            pub fn new(sequence_number: u32) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                }
            }

            pub fn error(
                sequence_number: u32,
                status: $crate::datatypes::CommandStatus,
            ) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                }
            }
        }

        impl $crate::codec::Decodable for $pdu {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                _buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                Self::validate_header(&header)?;
                Ok(Self {
                    command_status: header.status()?,
                    sequence_number: header.sequence_number,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu {
            fn encode(
                &self,
                buf: &mut bytes::BytesMut,
            ) -> Result<(), $crate::codec::CodecError> {
                $crate::codec::PduHeader {
                    command_length: $crate::codec::PduHeader::SIZE as u32,
                    command_id: $command_id.into(),
                    command_status: self.command_status.into(),
                    sequence_number: self.sequence_number,
                }
                .encode(buf);
                Ok(())
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE
            }
        }
    };
}

/// Fluent setters for builder structs. Each `field => Type` pair
/// yields a setter accepting anything convertible into the stored
/// type, so string fields take `&str` and owned `String` alike while
/// plain values pass through the identity conversion.
macro_rules! config_setters {
    ($($field:ident => $type:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, value: impl Into<$type>) -> Self {
                self.$field = value.into();
                self
            }
        )*
    };
}

pub(crate) use {config_setters, header_only_pdu};
