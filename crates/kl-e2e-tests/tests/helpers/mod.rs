//! Shared test harness for E2E tests.
//!
//! A `Bus` is a loopback `MockChannel`: every request comes back as its
//! own echo, and scripted ECU replies queue up behind it.

#![allow(dead_code)]

use std::time::Duration;

use kl_codec::{MockChannel, ds2, kwp2000};
use kl_protocol::{Address, Protocol};
use kl_scanner::config::QueryConfig;
use kl_scanner::scan::RunPolicy;

pub const TIMEOUT: Duration = Duration::from_millis(100);

/// Replies captured from real vehicles.
pub mod captures {
    /// Siemens MS41 DME, DS2 `00`.
    pub const MS41_LIVE_DATA: &[u8] = &[
        0x12, 0x1D, 0xA0, 0x02, 0xBF, 0x00, 0x26, 0x17, 0xAB, 0x4E, 0x41, 0x59, 0x02, 0x49, 0x07,
        0x24, 0x6A, 0x88, 0x22, 0x7F, 0x80, 0x00, 0x80, 0x00, 0x38, 0x38, 0xCE, 0xCE, 0x09,
    ];

    /// Second MS41 capture, engine idling warmer.
    pub const MS41_LIVE_DATA_2: &[u8] = &[
        0x12, 0x1D, 0xA0, 0x03, 0x20, 0x00, 0x24, 0x10, 0xA3, 0x91, 0x38, 0x6A, 0x01, 0xB9, 0x00,
        0xCE, 0x4E, 0x22, 0x1E, 0x88, 0x8F, 0x3A, 0x6D, 0xBA, 0x87, 0x6C, 0xCE, 0xCE, 0xDD,
    ];

    /// ZF 5HP24 EGS, DS2 `0B 03`.
    pub const EGS_TRANSMISSION_STATUS: &[u8] = &[
        0x32, 0x1C, 0xA0, 0x00, 0x00, 0x00, 0x00, 0x4F, 0x4B, 0x54, 0x93, 0x01, 0x01, 0x01, 0x01,
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02, 0xDC, 0x00, 0x80, 0x00, 0x00, 0x59, 0xB5,
    ];

    /// Bosch ME7.2 DME, KWP2000 `A2`.
    pub const ME72_IDENTIFICATION: &[u8] = &[
        0xB8, 0xF1, 0x12, 0x2B, 0xE2, 0x37, 0x35, 0x30, 0x36, 0x33, 0x36, 0x36, 0x30, 0x46, 0x30,
        0x31, 0x41, 0x38, 0x36, 0x30, 0x30, 0x38, 0x30, 0x30, 0x30, 0x30, 0x31, 0x30, 0x32, 0x31,
        0x33, 0x35, 0x31, 0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x30, 0x30, 0x30, 0x30, 0x38, 0x33, 0x38,
        0x32, 0x38, 0x99,
    ];

    /// Bosch ME7.2 DME, KWP2000 `22 40 00`.
    pub const ME72_LIVE_DATA: &[u8] = &[
        0xB8, 0xF1, 0x12, 0x2D, 0x62, 0x40, 0x00, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x50, 0x00, 0x00, 0x00, 0x00, 0x65, 0x60, 0x00, 0x05, 0x00, 0x00, 0xA8, 0xD1, 0x7F,
        0x00, 0x94, 0x5E, 0x0C, 0x80, 0x0C, 0x80, 0x0C, 0x80, 0x0C, 0x80, 0x0C, 0x80, 0x0C, 0x80,
        0x0C, 0x40, 0x0C, 0x80, 0x08,
    ];

    /// Bosch ME7.2 DME, KWP2000 `22 40 07`.
    pub const ME72_SWITCHES: &[u8] = &[0xB8, 0xF1, 0x12, 0x05, 0x62, 0x40, 0x07, 0x01, 0x90, 0xEA];
}

/// Half-duplex bus with scripted ECUs behind a loopback mock.
pub struct Bus {
    pub channel: MockChannel,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            channel: MockChannel::with_loopback(),
        }
    }

    /// Queue raw reply bytes as if an ECU had sent them.
    pub fn ecu_sends(&mut self, bytes: &[u8]) -> &mut Self {
        self.channel.queue(bytes);
        self
    }

    /// Queue a DS2 reply: status byte followed by `data`.
    pub fn ds2_reply(&mut self, address: Address, status: u8, data: &[u8]) -> &mut Self {
        let mut payload = vec![status];
        payload.extend_from_slice(data);
        let frame = ds2_frame(address, &payload);
        self.ecu_sends(&frame)
    }

    /// Queue a KWP2000 reply from `address` to the tester.
    pub fn kwp_reply(&mut self, address: Address, payload: &[u8]) -> &mut Self {
        let frame = kwp2000::encode(Address::TESTER, address, payload).unwrap();
        self.ecu_sends(&frame)
    }
}

pub fn ds2_frame(address: Address, payload: &[u8]) -> Vec<u8> {
    ds2::encode(address, payload).unwrap()
}

pub fn ds2_query(address: Address, command: &[u8]) -> QueryConfig {
    QueryConfig {
        protocol: Protocol::Ds2,
        address,
        source: Address::TESTER,
        command: command.to_vec(),
    }
}

pub fn kwp_query(address: Address, command: &[u8]) -> QueryConfig {
    QueryConfig {
        protocol: Protocol::Kwp2000,
        address,
        source: Address::TESTER,
        command: command.to_vec(),
    }
}

/// Runner policy with short timeouts and no retries.
pub fn policy() -> RunPolicy {
    RunPolicy {
        timeout: TIMEOUT,
        settle: Duration::from_millis(30),
        busy_retries: 0,
    }
}

/// EGS identification payload (after the status byte).
pub fn egs_identification() -> Vec<u8> {
    b"1423580A1020304".to_vec()
}
