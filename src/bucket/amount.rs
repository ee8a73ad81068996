//! Conversions for 256-bit amounts at the wire and configuration edges.

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::BucketError;

/// Maximum encoded width of an amount in bytes.
pub const AMOUNT_LEN: usize = 32;

/// Decode an unsigned big-endian amount of at most 32 bytes. Empty is zero.
pub fn from_be_bytes(bytes: &[u8]) -> Result<U256, BucketError> {
    if bytes.len() > AMOUNT_LEN {
        return Err(BucketError::InvalidArgument(format!(
            "amount must be at most {} bytes, got {}",
            AMOUNT_LEN,
            bytes.len()
        )));
    }
    Ok(U256::from_big_endian(bytes))
}

/// Encode an amount as 32 big-endian bytes.
pub fn to_be_bytes(amount: U256) -> Vec<u8> {
    let mut buf = [0u8; AMOUNT_LEN];
    amount.to_big_endian(&mut buf);
    buf.to_vec()
}

/// Parse a base-10 amount.
pub fn parse_decimal(s: &str) -> Result<U256, BucketError> {
    U256::from_dec_str(s.trim())
        .map_err(|e| BucketError::InvalidArgument(format!("invalid amount {:?}: {:?}", s, e)))
}

pub(crate) fn serialize_decimal<S: Serializer>(
    amount: &U256,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(amount)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Int(u64),
    Text(String),
}

/// Accepts either a plain integer or a decimal string, since YAML integers
/// stop at 64 bits.
pub(crate) fn deserialize_decimal<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<U256, D::Error> {
    match RawAmount::deserialize(deserializer)? {
        RawAmount::Int(n) => Ok(U256::from(n)),
        RawAmount::Text(s) => parse_decimal(&s).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_bytes() {
        assert_eq!(from_be_bytes(&[]).unwrap(), U256::zero());
        assert_eq!(from_be_bytes(&[0x01, 0x00]).unwrap(), U256::from(256u64));
        assert_eq!(from_be_bytes(&[0xff; 32]).unwrap(), U256::MAX);

        let encoded = to_be_bytes(U256::from(256u64));
        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[30..], &[0x01, 0x00]);
    }

    #[test]
    fn test_be_bytes_rejects_oversized() {
        let err = from_be_bytes(&[0u8; 33]).unwrap_err();
        assert!(matches!(err, BucketError::InvalidArgument(_)));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1000").unwrap(), U256::from(1000u64));
        assert_eq!(
            parse_decimal(
                "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            )
            .unwrap(),
            U256::MAX
        );
        assert!(parse_decimal("-1").is_err());
        assert!(parse_decimal("12ab").is_err());
    }
}
