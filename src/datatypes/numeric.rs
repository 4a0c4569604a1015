// ABOUTME: TON, NPI and interface_version enumerations used by bind and message PDUs

use num_enum::{IntoPrimitive, TryFromPrimitive};

// Default impls are written out by hand: num_enum treats a variant
// marked #[default] as a try_from fallback, and values outside the
// tables must stay decode errors.

/// Type of Number for an SME address (specification section 5.2.5).
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeOfNumber {
    Unknown = 0x00,
    International = 0x01,
    National = 0x02,
    NetworkSpecific = 0x03,
    SubscriberNumber = 0x04,
    Alphanumeric = 0x05,
    Abbreviated = 0x06,
}

impl Default for TypeOfNumber {
    fn default() -> Self {
        TypeOfNumber::Unknown
    }
}

/// Numbering Plan Indicator for an SME address (section 5.2.6).
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericPlanIndicator {
    Unknown = 0x00,
    Isdn = 0x01,
    Data = 0x03,
    Telex = 0x04,
    LandMobile = 0x06,
    National = 0x08,
    Private = 0x09,
    Ermes = 0x0A,
    Internet = 0x0E,
    WapClientId = 0x12,
}

impl Default for NumericPlanIndicator {
    fn default() -> Self {
        NumericPlanIndicator::Unknown
    }
}

/// SMPP interface version advertised during bind (section 5.2.4).
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterfaceVersion {
    SmppV33 = 0x33,
    SmppV34 = 0x34,
}

impl Default for InterfaceVersion {
    fn default() -> Self {
        InterfaceVersion::SmppV34
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ton_npi_wire_values() {
        assert_eq!(u8::from(TypeOfNumber::International), 0x01);
        assert_eq!(u8::from(NumericPlanIndicator::Isdn), 0x01);
        assert_eq!(u8::from(NumericPlanIndicator::WapClientId), 0x12);
        assert!(TypeOfNumber::try_from(0x07u8).is_err());
        assert!(NumericPlanIndicator::try_from(0x02u8).is_err());
    }

    #[test]
    fn interface_version_defaults_to_v34() {
        assert_eq!(InterfaceVersion::default(), InterfaceVersion::SmppV34);
        assert_eq!(u8::from(InterfaceVersion::SmppV34), 0x34);
        assert!(InterfaceVersion::try_from(0x35u8).is_err());
    }
}
