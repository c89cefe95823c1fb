use std::fmt;

use serde::{Deserialize, Serialize};

/// Bus address of an ECU (or of the tester itself).
///
/// The set of units is open: any byte is a valid address, the constants
/// below only name the ones we know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u8);

impl Address {
    /// Central body electronics (ZKE).
    pub const ZKE: Address = Address(0x00);
    /// Digital motor electronics (DME).
    pub const DME: Address = Address(0x12);
    /// Central body module.
    pub const CENTRAL_BODY: Address = Address(0x21);
    /// Electronic transmission control (EGS).
    pub const EGS: Address = Address(0x32);
    /// Electronic immobiliser (EWS).
    pub const EWS: Address = Address(0x44);
    /// Dynamic stability control (DSC).
    pub const DSC: Address = Address(0x56);
    /// Automatic climate control (IHKA).
    pub const IHKA: Address = Address(0x5B);
    /// Radio.
    pub const RADIO: Address = Address(0x68);
    /// Instrument cluster (IKE).
    pub const IKE: Address = Address(0x80);
    /// Multi restraint system.
    pub const AIRBAG: Address = Address(0xA4);
    /// Multi information display (MID).
    pub const MID: Address = Address(0xC0);
    /// Light switching center (LCM).
    pub const LCM: Address = Address(0xD0);
    /// Diagnostic tester, source address for KWP2000 requests.
    pub const TESTER: Address = Address(0xF1);
    /// Center console switching center (SZM).
    pub const SZM: Address = Address(0xF5);

    /// Raw address byte.
    pub fn byte(self) -> u8 {
        self.0
    }

    /// Short name of a known unit, `None` for addresses we have no name for.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::ZKE => Some("ZKE"),
            Self::DME => Some("DME"),
            Self::CENTRAL_BODY => Some("CENTRAL_BODY"),
            Self::EGS => Some("EGS"),
            Self::EWS => Some("EWS"),
            Self::DSC => Some("DSC"),
            Self::IHKA => Some("IHKA"),
            Self::RADIO => Some("RADIO"),
            Self::IKE => Some("IKE"),
            Self::AIRBAG => Some("AIRBAG"),
            Self::MID => Some("MID"),
            Self::LCM => Some("LCM"),
            Self::TESTER => Some("TESTER"),
            Self::SZM => Some("SZM"),
            _ => None,
        }
    }
}

impl From<u8> for Address {
    fn from(byte: u8) -> Self {
        Address(byte)
    }
}

impl From<Address> for u8 {
    fn from(addr: Address) -> u8 {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:02X})", self.0),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Framing convention spoken by an ECU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Length-prefixed frames: `[address][length][payload..][checksum]`.
    Ds2,
    /// Header-tagged frames: `[0xB8][target][source][len][payload..][checksum]`.
    Kwp2000,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ds2 => f.write_str("DS2"),
            Protocol::Kwp2000 => f.write_str("KWP2000"),
        }
    }
}
