use std::fmt;

use serde::{Deserialize, Serialize};

/// DS2 status byte: request accepted.
pub const STATUS_OK: u8 = 0xA0;
/// DS2 status byte: ECU busy, try again later.
pub const STATUS_BUSY: u8 = 0xA1;
/// DS2 status byte: parameter rejected.
pub const STATUS_INVALID_PARAMETER: u8 = 0xA2;
/// DS2 status byte: command not supported.
pub const STATUS_INVALID_COMMAND: u8 = 0xFF;

/// Status an ECU reports in the first payload byte of a DS2 reply.
///
/// KWP2000 replies carry no status byte; a framed and checksummed
/// KWP2000 reply counts as `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    ComputerBusy,
    InvalidParameter,
    InvalidCommand,
    Unknown(u8),
}

impl Status {
    /// Classify a raw status byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            STATUS_OK => Status::Ok,
            STATUS_BUSY => Status::ComputerBusy,
            STATUS_INVALID_PARAMETER => Status::InvalidParameter,
            STATUS_INVALID_COMMAND => Status::InvalidCommand,
            other => Status::Unknown(other),
        }
    }

    /// Wire value of this status.
    pub fn byte(self) -> u8 {
        match self {
            Status::Ok => STATUS_OK,
            Status::ComputerBusy => STATUS_BUSY,
            Status::InvalidParameter => STATUS_INVALID_PARAMETER,
            Status::InvalidCommand => STATUS_INVALID_COMMAND,
            Status::Unknown(b) => b,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("ok"),
            Status::ComputerBusy => f.write_str("computer busy"),
            Status::InvalidParameter => f.write_str("invalid parameter"),
            Status::InvalidCommand => f.write_str("invalid command"),
            Status::Unknown(b) => write!(f, "unknown status 0x{b:02X}"),
        }
    }
}
