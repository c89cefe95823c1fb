use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{Address, Protocol};

/// Physical value of a decoded field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scaled numeric reading (rpm, °C, V, ...).
    Number(f64),
    /// Single switch or status bit.
    Flag(bool),
    /// Enumerated state or identification text.
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Flag(true) => f.write_str("yes"),
            FieldValue::Flag(false) => f.write_str("no"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

/// One named field of an ECU reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedField {
    /// Field name (e.g., "engine_speed").
    pub name: String,
    /// Decoded physical value.
    pub value: FieldValue,
    /// Unit of measurement, empty for unitless fields.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub unit: String,
}

impl fmt::Display for DecodedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{} : {}", self.name, self.value)
        } else {
            write!(f, "{} : {} {}", self.name, self.value, self.unit)
        }
    }
}

/// Entry of an ECU fault memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    /// Diagnostic identifier (which component).
    pub identifier: u8,
    /// Fault-flag byte (what kind of fault).
    pub flags: u8,
    /// How often the fault has been seen.
    pub frequency: u8,
}

/// Catalog lookup result. Misses stay representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultDescription {
    Known(String),
    Unrecognized(u8),
}

impl fmt::Display for FaultDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultDescription::Known(text) => f.write_str(text),
            FaultDescription::Unrecognized(code) => write!(f, "unknown code 0x{code:02X}"),
        }
    }
}

/// Fault record together with its catalog descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedFault {
    pub record: FaultRecord,
    pub identifier: FaultDescription,
    pub flags: FaultDescription,
}

impl fmt::Display for DescribedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02X} {} / {} (seen {}x)",
            self.record.identifier, self.identifier, self.flags, self.record.frequency
        )
    }
}

/// Fully decoded reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub protocol: Protocol,
    /// ECU that answered.
    pub address: Address,
    /// Name of the command layout (e.g., "transmission_status").
    pub command: String,
    /// Fields in payload order.
    pub fields: Vec<DecodedField>,
    /// Fault memory entries, empty unless the command reads fault memory.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub faults: Vec<DescribedFault>,
}

impl DecodedRecord {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&DecodedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of a field by name.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.field(name).map(|f| &f.value)
    }
}
