// ABOUTME: Per-session tunables: identity presented at bind plus the three protocol timers

use std::time::Duration;

use crate::datatypes::{
    AddressRange, InterfaceVersion, NumericPlanIndicator, Password, SystemId, SystemType,
    TypeOfNumber,
};

/// Session configuration shared by both roles.
///
/// The identity fields are what an initiator presents in its bind
/// request; an acceptor uses `system_id` as the identity it answers
/// bind responses with.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub system_id: SystemId,
    pub password: Password,
    pub system_type: SystemType,
    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,
    pub address_range: AddressRange,

    /// Maximum wait for a bind_*_resp (and for unbind_resp).
    pub bind_timeout: Duration,
    /// Keep-alive period. No traffic sent within one period triggers an
    /// enquire_link; nothing received within two periods closes the
    /// session.
    pub enquire_link_interval: Duration,
    /// Per-request response deadline.
    pub response_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_id: SystemId::default(),
            password: Password::default(),
            system_type: SystemType::default(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: AddressRange::default(),
            bind_timeout: Duration::from_secs(30),
            enquire_link_interval: Duration::from_secs(60),
            response_timeout: Duration::from_secs(30),
        }
    }
}
