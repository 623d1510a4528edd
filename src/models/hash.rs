//! MD5 content hash.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::AppError;

/// 16-byte MD5 content hash, hex encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Md5([u8; 16]);

impl Md5 {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Decode exactly 32 hex characters.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let mut buf = [0u8; 16];
        hex::decode_to_slice(s, &mut buf).map_err(|_| AppError::InvalidHash(s.into()))?;
        Ok(Self(buf))
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Md5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Md5 {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Md5::parse(s)
    }
}

impl Serialize for Md5 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
