//! K-Line protocol codec.
//!
//! Frame encoding and validated decoding for the DS2 and KWP2000 framings,
//! a request/reply transaction that discards the half-duplex bus echo, the
//! static payload layouts that turn replies into physical values, and the
//! fault catalog of the transmission controller.

pub mod catalog;
pub mod channel;
pub mod checksum;
pub mod decoder;
pub mod ds2;
pub mod error;
pub mod frame;
pub mod kwp2000;
pub mod mock;
pub mod transaction;

pub use channel::ByteChannel;
pub use decoder::decode_payload;
pub use ds2::Ds2Codec;
pub use error::{KlineError, KlineResult};
pub use frame::{Frame, FrameCodec, Request};
pub use kwp2000::Kwp2000Codec;
pub use mock::MockChannel;
pub use transaction::{Outcome, Reply, Transaction, TransactionState, execute};
