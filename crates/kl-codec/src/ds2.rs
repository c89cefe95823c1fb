//! DS2 framing: `[address][length][payload..][checksum]`.
//!
//! The length byte counts the whole frame, itself, the address and the
//! checksum included, so a reader knows exactly how many bytes to pull.

use async_trait::async_trait;
use std::time::Duration;

use kl_protocol::hex;
use kl_protocol::{Address, Protocol, Status};

use crate::channel::ByteChannel;
use crate::checksum;
use crate::error::{KlineError, KlineResult};
use crate::frame::{Frame, FrameCodec, Request, read_first, read_rest};

/// Address + length + checksum.
pub const OVERHEAD: usize = 3;

/// Largest payload whose frame length still fits the length byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize - OVERHEAD;

/// Encode a DS2 frame.
pub fn encode(address: Address, payload: &[u8]) -> KlineResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(KlineError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let mut frame = Vec::with_capacity(payload.len() + OVERHEAD);
    frame.push(address.byte());
    frame.push((payload.len() + OVERHEAD) as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum::checksum(&frame));
    Ok(frame)
}

/// Validate one DS2 frame at the start of `bytes`.
///
/// Bytes past the declared length are not examined.
pub fn parse(bytes: &[u8]) -> KlineResult<Frame> {
    if bytes.len() < 2 {
        return Err(KlineError::IncompleteFrame {
            expected: OVERHEAD,
            received: bytes.len(),
        });
    }
    let length = bytes[1];
    if (length as usize) < OVERHEAD {
        return Err(KlineError::InvalidLength { length });
    }
    let total = length as usize;
    if bytes.len() < total {
        return Err(KlineError::IncompleteFrame {
            expected: total,
            received: bytes.len(),
        });
    }
    finish(bytes[..total].to_vec())
}

/// Read one DS2 frame from the channel.
pub async fn read(channel: &mut dyn ByteChannel, timeout: Duration) -> KlineResult<Frame> {
    let address = read_first(channel, timeout).await?;
    let length = read_rest(channel, 1, 1, OVERHEAD, timeout).await?[0];
    if (length as usize) < OVERHEAD {
        return Err(KlineError::InvalidLength { length });
    }
    let total = length as usize;
    let rest = read_rest(channel, total - 2, 2, total, timeout).await?;

    let mut bytes = Vec::with_capacity(total);
    bytes.push(address);
    bytes.push(length);
    bytes.extend_from_slice(&rest);
    finish(bytes)
}

fn finish(bytes: Vec<u8>) -> KlineResult<Frame> {
    tracing::debug!(frame = %hex::spaced(&bytes), "ds2 rx");
    if let Err((expected, actual)) = checksum::verify(&bytes) {
        tracing::warn!(
            frame = %hex::spaced(&bytes),
            expected,
            actual,
            "ds2 checksum mismatch"
        );
        return Err(KlineError::Checksum { expected, actual });
    }
    Ok(Frame::validated(Protocol::Ds2, bytes))
}

/// DS2 `FrameCodec`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ds2Codec;

#[async_trait]
impl FrameCodec for Ds2Codec {
    fn protocol(&self) -> Protocol {
        Protocol::Ds2
    }

    fn encode(&self, request: &Request) -> KlineResult<Vec<u8>> {
        encode(request.target(), request.command())
    }

    async fn read_frame(
        &self,
        channel: &mut dyn ByteChannel,
        timeout: Duration,
    ) -> KlineResult<Frame> {
        read(channel, timeout).await
    }

    /// Sender must be the addressed ECU; the first payload byte is the status.
    fn interpret(&self, request: &Request, reply: &Frame) -> KlineResult<Vec<u8>> {
        let sender = reply.address();
        if sender != request.target() {
            return Err(KlineError::UnexpectedSender {
                expected: request.target(),
                actual: sender,
            });
        }

        let Some((&status, payload)) = reply.payload().split_first() else {
            return Err(KlineError::InsufficientPayload {
                field: "status",
                needed: 1,
                actual: 0,
            });
        };

        match Status::from_byte(status) {
            Status::Ok => Ok(payload.to_vec()),
            other => Err(KlineError::Device(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChannel;

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Live values from an MS41 engine controller.
    const MS41_REPLY: [u8; 29] = [
        0x12, 0x1D, 0xA0, 0x02, 0xBF, 0x00, 0x26, 0x17, 0xAB, 0x4E, 0x41, 0x59, 0x02, 0x49, 0x07,
        0x24, 0x6A, 0x88, 0x22, 0x7F, 0x80, 0x00, 0x80, 0x00, 0x38, 0x38, 0xCE, 0xCE, 0x09,
    ];

    #[test]
    fn encode_transmission_status_request() {
        let frame = encode(Address::EGS, &[0x0B, 0x03]).unwrap();
        assert_eq!(frame, vec![0x32, 0x05, 0x0B, 0x03, 0x3F]);
    }

    #[test]
    fn encode_empty_payload() {
        let frame = encode(Address::DME, &[]).unwrap();
        assert_eq!(frame, vec![0x12, 0x03, 0x11]);
        assert!(parse(&frame).unwrap().payload().is_empty());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            encode(Address::DME, &payload),
            Err(KlineError::PayloadTooLong { .. })
        ));
        assert!(encode(Address::DME, &payload[..MAX_PAYLOAD]).is_ok());
    }

    #[test]
    fn parse_recovers_address_and_payload() {
        for payload in [&[][..], &[0x00][..], &[0x0B, 0x03][..], &[0xFF; 40][..]] {
            let frame = parse(&encode(Address::EGS, payload).unwrap()).unwrap();
            assert_eq!(frame.address(), Address::EGS);
            assert_eq!(frame.payload(), payload);
        }
    }

    #[test]
    fn parse_captured_reply() {
        let frame = parse(&MS41_REPLY).unwrap();
        assert_eq!(frame.address(), Address::DME);
        assert_eq!(frame.len(), 0x1D);
        assert_eq!(frame.payload()[0], 0xA0);
    }

    #[test]
    fn single_bit_flips_fail_checksum() {
        let frame = encode(Address::EGS, &[0x0B, 0x03]).unwrap();
        // every byte except the length byte, every bit
        for index in [0usize, 2, 3, 4] {
            for bit in 0..8 {
                let mut tampered = frame.clone();
                tampered[index] ^= 1 << bit;
                assert!(
                    matches!(parse(&tampered), Err(KlineError::Checksum { .. })),
                    "byte {index} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn shortened_length_byte_is_rejected() {
        let frame = encode(Address::EGS, &[0x0B, 0x03]).unwrap();
        for bit in 0..8 {
            let mut tampered = frame.clone();
            tampered[1] ^= 1 << bit;
            if tampered[1] >= frame[1] {
                continue;
            }
            assert!(
                matches!(
                    parse(&tampered),
                    Err(KlineError::Checksum { .. } | KlineError::InvalidLength { .. })
                ),
                "length bit {bit}"
            );
        }
        let mut tampered = frame.clone();
        tampered[1] ^= 0x04;
        assert_eq!(parse(&tampered), Err(KlineError::InvalidLength { length: 1 }));
    }

    #[test]
    fn parse_short_buffer() {
        assert_eq!(
            parse(&[0x32, 0x05, 0x0B]),
            Err(KlineError::IncompleteFrame {
                expected: 5,
                received: 3
            })
        );
    }

    #[test]
    fn parse_invalid_length() {
        assert_eq!(
            parse(&[0x32, 0x02, 0x30]),
            Err(KlineError::InvalidLength { length: 2 })
        );
    }

    #[tokio::test]
    async fn read_from_channel() {
        let mut mock = MockChannel::with_bytes(&MS41_REPLY);
        let frame = read(&mut mock, TIMEOUT).await.unwrap();
        assert_eq!(frame.as_bytes(), &MS41_REPLY);
        assert_eq!(mock.pending(), 0);
    }

    #[tokio::test]
    async fn read_silence_is_no_reply() {
        let mut mock = MockChannel::new();
        assert_eq!(
            read(&mut mock, TIMEOUT).await,
            Err(KlineError::NoReply { timeout_ms: 100 })
        );
    }

    #[tokio::test]
    async fn read_short_frame_is_incomplete() {
        // claims 8 bytes, only 5 on the wire
        let mut mock = MockChannel::with_bytes(&[0x32, 0x08, 0xA0, 0x01, 0x02]);
        assert_eq!(
            read(&mut mock, TIMEOUT).await,
            Err(KlineError::IncompleteFrame {
                expected: 8,
                received: 5
            })
        );
    }

    #[tokio::test]
    async fn read_stops_at_declared_length() {
        let mut bytes = encode(Address::EGS, &[0xA0]).unwrap();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let mut mock = MockChannel::with_bytes(&bytes);

        let frame = read(&mut mock, TIMEOUT).await.unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(mock.pending(), 2);
    }

    #[tokio::test]
    async fn read_only_address_is_incomplete() {
        let mut mock = MockChannel::with_bytes(&[0x32]);
        assert_eq!(
            read(&mut mock, TIMEOUT).await,
            Err(KlineError::IncompleteFrame {
                expected: 3,
                received: 1
            })
        );
    }

    #[tokio::test]
    async fn read_bad_checksum() {
        let mut mock = MockChannel::with_bytes(&[0x32, 0x05, 0x0B, 0x03, 0x00]);
        assert_eq!(
            read(&mut mock, TIMEOUT).await,
            Err(KlineError::Checksum {
                expected: 0x3F,
                actual: 0x00
            })
        );
    }

    // --- interpret ---

    fn reply(status: u8, rest: &[u8]) -> Frame {
        let mut payload = vec![status];
        payload.extend_from_slice(rest);
        parse(&encode(Address::EGS, &payload).unwrap()).unwrap()
    }

    #[test]
    fn interpret_strips_status() {
        let req = Request::new(Address::EGS, vec![0x0B, 0x03]);
        let payload = Ds2Codec.interpret(&req, &reply(0xA0, &[1, 2, 3])).unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[test]
    fn interpret_status_codes() {
        let req = Request::new(Address::EGS, vec![0x0B, 0x03]);
        let cases = [
            (0xA1, Status::ComputerBusy),
            (0xA2, Status::InvalidParameter),
            (0xFF, Status::InvalidCommand),
            (0x37, Status::Unknown(0x37)),
        ];
        for (byte, status) in cases {
            assert_eq!(
                Ds2Codec.interpret(&req, &reply(byte, &[])),
                Err(KlineError::Device(status))
            );
        }
    }

    #[test]
    fn interpret_wrong_sender() {
        let req = Request::new(Address::DME, vec![0x00]);
        assert_eq!(
            Ds2Codec.interpret(&req, &reply(0xA0, &[])),
            Err(KlineError::UnexpectedSender {
                expected: Address::DME,
                actual: Address::EGS
            })
        );
    }

    #[test]
    fn interpret_missing_status_byte() {
        let req = Request::new(Address::EGS, vec![0x00]);
        let frame = parse(&encode(Address::EGS, &[]).unwrap()).unwrap();
        assert!(matches!(
            Ds2Codec.interpret(&req, &frame),
            Err(KlineError::InsufficientPayload { field: "status", .. })
        ));
    }
}
