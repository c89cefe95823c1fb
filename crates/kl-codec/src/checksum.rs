//! XOR checksum shared by DS2 and KWP2000.

/// Running XOR of every byte.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Check that the last byte of `frame` is the checksum of the rest.
///
/// Returns `(expected, actual)` on mismatch. An empty frame never verifies.
pub fn verify(frame: &[u8]) -> Result<(), (u8, u8)> {
    match frame.split_last() {
        Some((&actual, body)) => {
            let expected = checksum(body);
            if expected == actual {
                Ok(())
            } else {
                Err((expected, actual))
            }
        }
        None => Err((0, 0)),
    }
}
