//! Bucket identifier handling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BucketError;

/// Length in bytes of every bucket id.
pub const BUCKET_ID_LEN: usize = 32;

/// Opaque 32-byte key identifying a bucket.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketId([u8; BUCKET_ID_LEN]);

impl BucketId {
    /// Create an id from its raw bytes.
    pub const fn new(bytes: [u8; BUCKET_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an id from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BucketError> {
        let raw: [u8; BUCKET_ID_LEN] = bytes.try_into().map_err(|_| {
            BucketError::InvalidArgument(format!(
                "bucket id must be {} bytes, got {}",
                BUCKET_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// The raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; BUCKET_ID_LEN] {
        &self.0
    }
}

impl From<[u8; BUCKET_ID_LEN]> for BucketId {
    fn from(bytes: [u8; BUCKET_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId({})", self)
    }
}

impl FromStr for BucketId {
    type Err = BucketError;

    /// Parse 64 hex digits, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| BucketError::InvalidArgument(format!("bucket id is not hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for BucketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BucketId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_requires_32_bytes() {
        assert!(BucketId::from_slice(&[7u8; 32]).is_ok());

        let err = BucketId::from_slice(&[7u8; 31]).unwrap_err();
        assert!(matches!(err, BucketError::InvalidArgument(_)));
        assert!(BucketId::from_slice(&[7u8; 33]).is_err());
        assert!(BucketId::from_slice(&[]).is_err());
    }

    #[test]
    fn test_hex_display_and_parse() {
        let mut raw = [0u8; 32];
        raw[0] = 0xab;
        raw[31] = 0x01;
        let id = BucketId::new(raw);

        let text = id.to_string();
        assert!(text.starts_with("0xab"));
        assert!(text.ends_with("01"));
        assert_eq!(text.len(), 2 + 64);

        assert_eq!(text.parse::<BucketId>().unwrap(), id);
        assert_eq!(text.trim_start_matches("0x").parse::<BucketId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("0xzz".parse::<BucketId>().is_err());
        assert!("0xabcd".parse::<BucketId>().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let id = BucketId::new([0x11; 32]);
        let yaml = serde_yaml::to_string(&id).unwrap();
        let parsed: BucketId = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, id);
    }
}
