//! Payload decoding: static per-command layouts turned into physical values.
//!
//! A layout is keyed by (protocol, ECU address, command bytes). The same DS2
//! command byte means different things on different ECUs (`00` is
//! identification on the transmission, live data on the MS41 engine), so the
//! address is part of the key.

mod tables;

use kl_protocol::{Address, DecodedField, DecodedRecord, FieldValue, Protocol};

use crate::catalog;
use crate::error::{KlineError, KlineResult};

pub use tables::LAYOUTS;

// ---------------------------------------------------------------------------
// Layout metadata
// ---------------------------------------------------------------------------

/// Raw integer width. All multi-byte fields are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
        }
    }
}

/// What an enumerated sub-field decodes to when no label matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Otherwise {
    /// The raw sub-field value as text (e.g., gear "4").
    Numeric,
    Label(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// `physical = raw * scale + offset`.
    Linear {
        width: Width,
        signed: bool,
        scale: f64,
        offset: f64,
    },
    /// `byte & mask != 0`.
    Flag { mask: u8 },
    /// `(byte & mask) >> shift`, looked up in `labels`.
    Enumerated {
        mask: u8,
        shift: u8,
        labels: &'static [(u8, &'static str)],
        otherwise: Otherwise,
    },
    /// Fixed-length ASCII text.
    Ascii { len: usize },
}

/// One field at a fixed payload offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
    pub unit: &'static str,
}

impl FieldSpec {
    /// Unsigned linear field.
    pub const fn linear(
        name: &'static str,
        offset: usize,
        width: Width,
        scale: f64,
        bias: f64,
        unit: &'static str,
    ) -> Self {
        Self {
            name,
            offset,
            kind: FieldKind::Linear {
                width,
                signed: false,
                scale,
                offset: bias,
            },
            unit,
        }
    }

    /// Unscaled unsigned field.
    pub const fn raw(name: &'static str, offset: usize, width: Width, unit: &'static str) -> Self {
        Self::linear(name, offset, width, 1.0, 0.0, unit)
    }

    /// Same field, read as two's complement.
    pub const fn signed(self) -> Self {
        match self.kind {
            FieldKind::Linear {
                width,
                scale,
                offset,
                ..
            } => Self {
                kind: FieldKind::Linear {
                    width,
                    signed: true,
                    scale,
                    offset,
                },
                ..self
            },
            _ => self,
        }
    }

    pub const fn flag(name: &'static str, offset: usize, mask: u8) -> Self {
        Self {
            name,
            offset,
            kind: FieldKind::Flag { mask },
            unit: "",
        }
    }

    pub const fn enumerated(
        name: &'static str,
        offset: usize,
        mask: u8,
        shift: u8,
        labels: &'static [(u8, &'static str)],
        otherwise: Otherwise,
    ) -> Self {
        Self {
            name,
            offset,
            kind: FieldKind::Enumerated {
                mask,
                shift,
                labels,
                otherwise,
            },
            unit: "",
        }
    }

    pub const fn ascii(name: &'static str, offset: usize, len: usize) -> Self {
        Self {
            name,
            offset,
            kind: FieldKind::Ascii { len },
            unit: "",
        }
    }

    /// Bytes this field occupies.
    pub const fn size(&self) -> usize {
        match self.kind {
            FieldKind::Linear { width, .. } => width.bytes(),
            FieldKind::Flag { .. } | FieldKind::Enumerated { .. } => 1,
            FieldKind::Ascii { len } => len,
        }
    }

    /// Decode this field from a reply payload.
    pub fn decode(&self, payload: &[u8]) -> KlineResult<DecodedField> {
        let end = self.offset + self.size();
        let Some(bytes) = payload.get(self.offset..end) else {
            return Err(KlineError::InsufficientPayload {
                field: self.name,
                needed: end,
                actual: payload.len(),
            });
        };

        let value = match self.kind {
            FieldKind::Linear {
                width,
                signed,
                scale,
                offset,
            } => {
                let raw = match (width, signed) {
                    (Width::U8, false) => bytes[0] as f64,
                    (Width::U8, true) => bytes[0] as i8 as f64,
                    (Width::U16, false) => u16::from_be_bytes([bytes[0], bytes[1]]) as f64,
                    (Width::U16, true) => i16::from_be_bytes([bytes[0], bytes[1]]) as f64,
                };
                FieldValue::Number(raw * scale + offset)
            }
            FieldKind::Flag { mask } => FieldValue::Flag(bytes[0] & mask != 0),
            FieldKind::Enumerated {
                mask,
                shift,
                labels,
                otherwise,
            } => {
                let sub = (bytes[0] & mask) >> shift;
                let label = labels
                    .iter()
                    .find(|(value, _)| *value == sub)
                    .map(|(_, label)| label.to_string());
                FieldValue::Text(label.unwrap_or_else(|| match otherwise {
                    Otherwise::Numeric => sub.to_string(),
                    Otherwise::Label(label) => label.to_string(),
                }))
            }
            FieldKind::Ascii { .. } => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        };

        Ok(DecodedField {
            name: self.name.to_string(),
            value,
            unit: self.unit.to_string(),
        })
    }
}

/// How a command's payload is laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Body {
    Fields(&'static [FieldSpec]),
    /// Count byte followed by 3-byte fault records.
    FaultMemory,
}

/// Static layout for one (protocol, address, command).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandLayout {
    pub protocol: Protocol,
    pub address: Address,
    pub command: &'static [u8],
    pub name: &'static str,
    pub body: Body,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Find the layout for a command, if we have one.
pub fn find_layout(
    protocol: Protocol,
    address: Address,
    command: &[u8],
) -> Option<&'static CommandLayout> {
    LAYOUTS
        .iter()
        .find(|l| l.protocol == protocol && l.address == address && l.command == command)
}

/// Decode a list of fields from a payload, in layout order.
pub fn decode_fields(fields: &[FieldSpec], payload: &[u8]) -> KlineResult<Vec<DecodedField>> {
    fields.iter().map(|f| f.decode(payload)).collect()
}

/// Decode the payload of a successful reply.
pub fn decode_payload(
    protocol: Protocol,
    address: Address,
    command: &[u8],
    payload: &[u8],
) -> KlineResult<DecodedRecord> {
    let Some(layout) = find_layout(protocol, address, command) else {
        return Err(KlineError::UnrecognizedCommand {
            protocol,
            address,
            command: command.to_vec(),
        });
    };

    let mut record = DecodedRecord {
        protocol,
        address,
        command: layout.name.to_string(),
        fields: Vec::new(),
        faults: Vec::new(),
    };

    match layout.body {
        Body::Fields(fields) => record.fields = decode_fields(fields, payload)?,
        Body::FaultMemory => {
            let records = catalog::parse_fault_memory(payload)?;
            record.fields.push(DecodedField {
                name: "fault_count".to_string(),
                value: FieldValue::Number(records.len() as f64),
                unit: String::new(),
            });
            record.faults = records.into_iter().map(catalog::describe).collect();
        }
    }

    tracing::trace!(
        address = %address,
        command = layout.name,
        fields = record.fields.len(),
        "payload decoded"
    );
    Ok(record)
}
