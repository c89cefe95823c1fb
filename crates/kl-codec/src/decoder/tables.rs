//! Command layouts per ECU.
//!
//! Offsets are into the decoder payload: after the status byte for DS2,
//! after the 4-byte header for KWP2000 (so KWP2000 offset 0 is the
//! positive response service id).

use kl_protocol::{Address, Protocol};

use super::{Body, CommandLayout, FieldSpec, Otherwise, Width};

pub static LAYOUTS: &[CommandLayout] = &[
    // Siemens MS41 engine controller (DS2)
    CommandLayout {
        protocol: Protocol::Ds2,
        address: Address::DME,
        command: &[0x00],
        name: "engine_live_data",
        body: Body::Fields(MS41_LIVE_DATA),
    },
    // ZF 5HP24 transmission controller (DS2)
    CommandLayout {
        protocol: Protocol::Ds2,
        address: Address::EGS,
        command: &[0x00],
        name: "identification",
        body: Body::Fields(EGS_IDENTIFICATION),
    },
    CommandLayout {
        protocol: Protocol::Ds2,
        address: Address::EGS,
        command: &[0x0B, 0x03],
        name: "transmission_status",
        body: Body::Fields(EGS_STATUS),
    },
    CommandLayout {
        protocol: Protocol::Ds2,
        address: Address::EGS,
        command: &[0x04, 0x01],
        name: "fault_memory",
        body: Body::FaultMemory,
    },
    // Bosch ME7.2 engine controller (KWP2000)
    CommandLayout {
        protocol: Protocol::Kwp2000,
        address: Address::DME,
        command: &[0xA2],
        name: "identification",
        body: Body::Fields(ME72_IDENTIFICATION),
    },
    CommandLayout {
        protocol: Protocol::Kwp2000,
        address: Address::DME,
        command: &[0x22, 0x40, 0x00],
        name: "engine_live_data",
        body: Body::Fields(ME72_LIVE_DATA),
    },
    CommandLayout {
        protocol: Protocol::Kwp2000,
        address: Address::DME,
        command: &[0x22, 0x40, 0x07],
        name: "engine_switches",
        body: Body::Fields(ME72_SWITCHES),
    },
];

// ── MS41 ────────────────────────────────────────────────────────

const MS41_TEMP_SCALE: f64 = -0.458;
const MS41_TEMP_OFFSET: f64 = 108.0;
const MS41_HEATER_SCALE: f64 = 0.3906;

const MS41_LIVE_DATA: &[FieldSpec] = &[
    FieldSpec::raw("engine_speed", 0, Width::U16, "rpm"),
    FieldSpec::raw("vehicle_speed", 2, Width::U8, "km/h"),
    FieldSpec::linear("throttle_position", 3, Width::U8, 0.47, 0.0, "%"),
    FieldSpec::linear("engine_load", 4, Width::U16, 0.021, 0.0, "mg/stroke"),
    FieldSpec::linear("intake_air_temp", 6, Width::U8, MS41_TEMP_SCALE, MS41_TEMP_OFFSET, "°C"),
    FieldSpec::linear("coolant_temp", 7, Width::U8, MS41_TEMP_SCALE, MS41_TEMP_OFFSET, "°C"),
    FieldSpec::linear("ignition_advance", 8, Width::U8, 0.373, -23.6, "°BTDC"),
    FieldSpec::linear("injector_pulse_width", 9, Width::U16, 0.00534, 0.0, "ms"),
    FieldSpec::linear("idle_actuator", 11, Width::U16, 0.00153, 0.0, "%"),
    // 13..15 unknown
    FieldSpec::linear("vanos_angle", 15, Width::U8, 0.3745, 0.0, "°KW"),
    FieldSpec::linear("battery_voltage", 16, Width::U8, 0.10196, 0.0, "V"),
    FieldSpec::raw("lambda_integrator_1", 17, Width::U16, ""),
    FieldSpec::raw("lambda_integrator_2", 19, Width::U16, ""),
    FieldSpec::linear("lambda_upstream_heater_1", 21, Width::U8, MS41_HEATER_SCALE, 0.0, "%"),
    FieldSpec::linear("lambda_upstream_heater_2", 22, Width::U8, MS41_HEATER_SCALE, 0.0, "%"),
    FieldSpec::linear("lambda_downstream_heater_1", 23, Width::U8, MS41_HEATER_SCALE, 0.0, "%"),
    FieldSpec::linear("lambda_downstream_heater_2", 24, Width::U8, MS41_HEATER_SCALE, 0.0, "%"),
];

// ── ZF 5HP24 ────────────────────────────────────────────────────

const EGS_IDENTIFICATION: &[FieldSpec] = &[
    FieldSpec::ascii("part_number", 0, 7),
    FieldSpec::ascii("hardware_number", 7, 2),
    FieldSpec::ascii("coding_index", 9, 2),
    FieldSpec::ascii("diagnostic_index", 11, 2),
    FieldSpec::ascii("bus_index", 13, 2),
];

const CRUISE_CONTROL_MODES: &[(u8, &str)] = &[
    (0x00, "off"),
    (0x20, "on"),
    (0x40, "resume"),
    (0x60, "accel"),
    (0x80, "decel"),
];

/// Byte 20: `ggg k c 0 ss` (gear, kickdown, in curve, steptronic shifter).
const GEAR_BYTE: usize = 20;

const GEARS: &[(u8, &str)] = &[(6, "1"), (7, "reverse")];

const SHIFTER_POSITIONS: &[(u8, &str)] = &[(1, "up"), (2, "down")];

const EGS_STATUS: &[FieldSpec] = &[
    FieldSpec::linear("transmission_rpm", 0, Width::U8, 32.0, 0.0, "rpm"),
    FieldSpec::linear("turbine_rpm", 1, Width::U8, 32.0, 0.0, "rpm"),
    FieldSpec::linear("output_rpm", 2, Width::U8, 32.0, 0.0, "rpm"),
    FieldSpec::linear("coolant_temp", 5, Width::U8, 1.0, -48.0, "°C"),
    FieldSpec::linear("transmission_temp", 6, Width::U8, 1.0, -54.0, "°C"),
    FieldSpec::enumerated(
        "cruise_control",
        19,
        0xFF,
        0,
        CRUISE_CONTROL_MODES,
        Otherwise::Label("unknown"),
    ),
    FieldSpec::enumerated("gear", GEAR_BYTE, 0xE0, 5, GEARS, Otherwise::Numeric),
    FieldSpec::enumerated(
        "shifter",
        GEAR_BYTE,
        0x03,
        0,
        SHIFTER_POSITIONS,
        Otherwise::Label("neutral"),
    ),
    FieldSpec::flag("kickdown", GEAR_BYTE, 0x10),
    FieldSpec::flag("vehicle_in_curve", GEAR_BYTE, 0x08),
];

// ── ME7.2 ───────────────────────────────────────────────────────

const ME72_TEMP_SCALE: f64 = 0.75;
const ME72_TEMP_OFFSET: f64 = -48.0;

const ME72_IDENTIFICATION: &[FieldSpec] = &[
    FieldSpec::ascii("part_number", 1, 7),
    FieldSpec::ascii("hardware_number", 8, 2),
    FieldSpec::ascii("coding_index", 10, 2),
    FieldSpec::ascii("diagnostic_index", 12, 2),
    FieldSpec::ascii("bus_index", 14, 2),
    FieldSpec::ascii("build_week", 16, 2),
    FieldSpec::ascii("build_year", 18, 2),
    FieldSpec::ascii("supplier", 20, 6),
];

const ME72_LIVE_DATA: &[FieldSpec] = &[
    FieldSpec::linear("vehicle_speed", 9, Width::U8, 1.25, 0.0, "km/h"),
    FieldSpec::linear("engine_speed", 10, Width::U16, 0.25, 0.0, "rpm"),
    FieldSpec::linear("intake_air_temp", 17, Width::U8, ME72_TEMP_SCALE, ME72_TEMP_OFFSET, "°C"),
    FieldSpec::linear("coolant_temp", 18, Width::U8, ME72_TEMP_SCALE, ME72_TEMP_OFFSET, "°C"),
    FieldSpec::linear("throttle_angle", 20, Width::U8, 0.39216, 0.0, "%"),
    FieldSpec::linear("air_mass", 21, Width::U8, 0.1, 0.0, "kg/h"),
    FieldSpec::linear(
        "coolant_outlet_temp",
        28,
        Width::U8,
        ME72_TEMP_SCALE,
        ME72_TEMP_OFFSET,
        "°C",
    ),
];

const ME72_SWITCHES: &[FieldSpec] = &[
    FieldSpec::flag("neutral_switch", 3, 1 << 0),
    FieldSpec::flag("acceleration_enrichment", 3, 1 << 1),
    FieldSpec::flag("o2_after_bank2_ready", 3, 1 << 2),
    FieldSpec::flag("o2_after_bank1_ready", 3, 1 << 3),
    FieldSpec::flag("o2_before_bank2_ready", 3, 1 << 4),
    FieldSpec::flag("o2_before_bank1_ready", 3, 1 << 5),
];
