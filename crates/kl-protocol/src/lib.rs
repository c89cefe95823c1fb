//! Shared value types for K-Line diagnostics: bus addresses, framing
//! protocols, ECU status bytes and decoded records.

pub mod address;
pub mod hex;
pub mod record;
pub mod status;

pub use address::*;
pub use record::*;
pub use status::*;
