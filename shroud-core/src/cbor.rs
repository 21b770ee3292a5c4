// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical CBOR encoding and decoding.
//!
//! CBOR with a fixed field order is the single serialization used across the
//! stack: for the signable form of envelopes, for routing steps inside onion
//! layers and for chunks. Encode/decode round-trips preserve all fields
//! exactly.
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CborError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(CborError::Encode)?;
    Ok(bytes)
}

pub fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CborError> {
    ciborium::from_reader(bytes).map_err(CborError::Decode)
}

#[derive(Debug, Error)]
pub enum CborError {
    /// The value could not be written out as CBOR.
    #[error("value could not be encoded as canonical cbor: {0}")]
    Encode(ciborium::ser::Error<std::io::Error>),

    /// The bytes did not parse as CBOR of the expected shape.
    #[error("bytes could not be decoded as cbor: {0}")]
    Decode(ciborium::de::Error<std::io::Error>),
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::{CborError, decode_cbor, encode_cbor};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u64,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    }

    #[test]
    fn encode_decode() {
        let value = Sample {
            id: 7,
            data: vec![1, 2, 3],
        };

        let bytes = encode_cbor(&value).unwrap();
        let value_again: Sample = decode_cbor(&bytes).unwrap();

        assert_eq!(value, value_again);
    }

    #[test]
    fn deterministic_encoding() {
        let value = Sample {
            id: 7,
            data: vec![1, 2, 3],
        };

        assert_eq!(encode_cbor(&value).unwrap(), encode_cbor(&value).unwrap());
    }

    #[test]
    fn junk_does_not_decode() {
        let result: Result<Sample, CborError> = decode_cbor(&[0xff, 0x00, 0x13, 0x37]);
        assert!(matches!(result, Err(CborError::Decode(_))));
    }
}
