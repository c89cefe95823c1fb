//! Static fault catalog for the transmission controller fault memory.
//!
//! Match-based lookup of diagnostic identifiers and fault-flag bytes. A miss
//! is an explicit `FaultDescription::Unrecognized`, never a failure.
//!
//! The identifier and flag tables and the `04 01` record layout are a
//! starting set for the ZF 5HP24. They have not been checked against real
//! fault-memory dumps yet; extend and correct them as captures come in.

use kl_protocol::{DescribedFault, FaultDescription, FaultRecord};

use crate::error::{KlineError, KlineResult};

/// Bytes per fault record: identifier, flags, frequency.
pub const RECORD_LEN: usize = 3;

/// Look up the component a diagnostic identifier refers to.
pub fn lookup_identifier(identifier: u8) -> Option<&'static str> {
    match identifier {
        // ===== Pressure regulators / solenoids =====
        0x01 => Some("Pressure regulator EDS1 (clutch A)"),
        0x02 => Some("Pressure regulator EDS2 (clutch B)"),
        0x03 => Some("Pressure regulator EDS3 (clutch E)"),
        0x04 => Some("Pressure regulator EDS4 (lock-up clutch)"),
        0x05 => Some("Pressure regulator EDS5 (system pressure)"),
        0x06 => Some("Pressure regulator EDS6 (clutch C/D)"),
        0x10 => Some("Solenoid valve MV1"),
        0x11 => Some("Solenoid valve MV2"),
        0x12 => Some("Solenoid valve MV3"),

        // ===== Speed sensors =====
        0x20 => Some("Turbine speed sensor"),
        0x21 => Some("Output speed sensor"),
        0x22 => Some("Engine speed signal"),

        // ===== Temperature / position =====
        0x30 => Some("Transmission oil temperature sensor"),
        0x31 => Some("Transmission overtemperature"),
        0x40 => Some("Selector lever position switch"),
        0x41 => Some("Steptronic switch"),
        0x42 => Some("Kickdown switch"),
        0x43 => Some("Brake light switch"),

        // ===== Ratio monitoring =====
        0x50 => Some("Gear ratio monitoring"),
        0x51 => Some("Lock-up clutch slip monitoring"),

        // ===== Supply / communication =====
        0x60 => Some("Supply voltage"),
        0x61 => Some("Solenoid supply voltage"),
        0x70 => Some("CAN bus timeout engine controller"),
        0x71 => Some("CAN bus timeout stability control"),
        0x72 => Some("CAN bus off"),
        0x80 => Some("Control unit internal fault"),
        0x81 => Some("EEPROM checksum"),

        _ => None,
    }
}

/// Look up the meaning of a fault-flag byte.
pub fn lookup_flags(flags: u8) -> Option<&'static str> {
    match flags {
        0x00 => Some("No fault type stored"),
        0x01 => Some("Short circuit to ground"),
        0x02 => Some("Short circuit to battery voltage"),
        0x04 => Some("Open circuit"),
        0x08 => Some("Signal implausible"),
        0x10 => Some("Signal out of range"),
        0x20 => Some("Fault currently present"),
        0x21 => Some("Short circuit to ground, currently present"),
        0x22 => Some("Short circuit to battery voltage, currently present"),
        0x24 => Some("Open circuit, currently present"),
        0x28 => Some("Signal implausible, currently present"),
        0x40 => Some("Sporadic fault"),
        0x80 => Some("Fault stored, not present"),
        _ => None,
    }
}

pub fn describe_identifier(identifier: u8) -> FaultDescription {
    match lookup_identifier(identifier) {
        Some(text) => FaultDescription::Known(text.to_string()),
        None => FaultDescription::Unrecognized(identifier),
    }
}

pub fn describe_flags(flags: u8) -> FaultDescription {
    match lookup_flags(flags) {
        Some(text) => FaultDescription::Known(text.to_string()),
        None => FaultDescription::Unrecognized(flags),
    }
}

/// Attach catalog descriptions to a raw record.
pub fn describe(record: FaultRecord) -> DescribedFault {
    DescribedFault {
        identifier: describe_identifier(record.identifier),
        flags: describe_flags(record.flags),
        record,
    }
}

/// Split a fault memory payload (`[count][id flags freq]...`) into records.
pub fn parse_fault_memory(payload: &[u8]) -> KlineResult<Vec<FaultRecord>> {
    let Some((&count, body)) = payload.split_first() else {
        return Err(KlineError::InsufficientPayload {
            field: "fault_count",
            needed: 1,
            actual: 0,
        });
    };

    let needed = count as usize * RECORD_LEN;
    if body.len() < needed {
        return Err(KlineError::InsufficientPayload {
            field: "fault_records",
            needed: needed + 1,
            actual: payload.len(),
        });
    }

    Ok(body[..needed]
        .chunks_exact(RECORD_LEN)
        .map(|chunk| FaultRecord {
            identifier: chunk[0],
            flags: chunk[1],
            frequency: chunk[2],
        })
        .collect())
}
