//! Hex helpers for log fields and serialized raw bytes.

/// Format bytes as lowercase, space-separated hex (`"12 04 a0 b6"`).
pub fn spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `#[serde(with = "kl_protocol::hex::bytes")]` for compact hex strings.
pub mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_string: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        serializer.serialize_str(&hex_string)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.len() % 2 != 0 {
            return Err(serde::de::Error::custom("odd number of hex digits"));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                let pair = s
                    .get(i..i + 2)
                    .ok_or_else(|| serde::de::Error::custom("non-ascii hex string"))?;
                u8::from_str_radix(pair, 16).map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
