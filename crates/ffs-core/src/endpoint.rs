//! Endpoint: the identity of a remote application reachable through FFS.
//!
//! An endpoint is the content hash of the application plus a 16-bit number
//! distinguishing instances of it. Wire form: 32 raw hash bytes, then the
//! number as a big-endian u16.

use std::fmt;
use std::str::FromStr;

use crate::codec::{CodecError, Decode, Decoder, Encode, Encoder};

/// Length of an endpoint hash in bytes.
pub const HASH_LENGTH: usize = 32;

/// Serialized size of an endpoint.
pub const ENDPOINT_WIRE_LENGTH: usize = HASH_LENGTH + 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("supplied hash has invalid length {0} (expected {HASH_LENGTH})")]
    InvalidHash(usize),

    #[error("malformed endpoint {0:?}: expected <64 hex chars>:<number>")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    hash: [u8; HASH_LENGTH],
    number: u16,
}

impl Endpoint {
    /// Build an endpoint from a hash slice, which must be exactly 32 bytes.
    pub fn new(hash: &[u8], number: u16) -> Result<Self, EndpointError> {
        let hash: [u8; HASH_LENGTH] = hash
            .try_into()
            .map_err(|_| EndpointError::InvalidHash(hash.len()))?;
        Ok(Self { hash, number })
    }

    pub const fn from_parts(hash: [u8; HASH_LENGTH], number: u16) -> Self {
        Self { hash, number }
    }

    /// Endpoint for an application identified by its content (BLAKE3).
    pub fn from_content(content: &[u8], number: u16) -> Self {
        Self::from_parts(*blake3::hash(content).as_bytes(), number)
    }

    pub fn hash(&self) -> &[u8; HASH_LENGTH] {
        &self.hash
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn serialize(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        self.encode(enc)
    }

    pub fn deserialize(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        Self::decode(dec)
    }
}

impl Encode for Endpoint {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        enc.nested(|enc| {
            enc.put_fixed(&self.hash, HASH_LENGTH)?;
            enc.put_u16(self.number);
            Ok(())
        })
    }
}

impl Decode for Endpoint {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        dec.nested(|dec| {
            let hash = dec.get_fixed::<HASH_LENGTH>()?;
            let number = dec.get_u16()?;
            Ok(Self::from_parts(hash, number))
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.hash), self.number)
    }
}

/// Parses `<64 hex chars>:<number>`; the number may be decimal or `0x` hex.
impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EndpointError::Malformed(s.to_string());
        let (hash_hex, number) = s.split_once(':').ok_or_else(malformed)?;
        let hash = hex::decode(hash_hex).map_err(|_| malformed())?;
        let number = match number.strip_prefix("0x") {
            Some(h) => u16::from_str_radix(h, 16),
            None => number.parse(),
        }
        .map_err(|_| malformed())?;
        Self::new(&hash, number)
    }
}
