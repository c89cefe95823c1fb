//! K-Line scanner: the caller side of the codec.
//!
//! Loads the query list from TOML, opens the serial adapter, runs each
//! query in turn and reports what came back. Optionally keeps listening
//! to the bus afterwards.

pub mod config;
pub mod scan;
pub mod serial;
pub mod sniff;
