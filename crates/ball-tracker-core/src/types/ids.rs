/// Fixed-size identifier types for connections and channel endpoints.
/// Uses base62 encoding [0-9a-zA-Z] so ids print and log cleanly while
/// keeping a fixed memory layout that is cheap to hash and copy.

use std::fmt;
use std::str::FromStr;
use rand::{rng, Rng};
use serde::{Serialize, Deserialize};
use crate::constants::{BASE62_CHARS, ID8_LENGTH, ID16_LENGTH};

/// Fixed-size 16-byte identifier used for media connections.
///
/// Memory Layout:
/// - [u8; 16] - Fixed array of 16 base62 characters
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ID16([u8; ID16_LENGTH]);

/// Fixed-size 8-byte identifier used for coordinate channel endpoints.
///
/// Memory Layout:
/// - [u8; 8] - Fixed array of 8 base62 characters
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ID8([u8; ID8_LENGTH]);

fn random_base62<const N: usize>() -> [u8; N] {
    let mut rng = rng();
    let mut bytes = [0u8; N];
    for byte in bytes.iter_mut() {
        *byte = BASE62_CHARS[rng.random_range(0..BASE62_CHARS.len())];
    }
    bytes
}

fn parse_base62<const N: usize>(s: &str) -> Result<[u8; N], &'static str> {
    if s.len() != N {
        return Err("identifier has the wrong length");
    }
    if !s.bytes().all(|b| BASE62_CHARS.contains(&b)) {
        return Err("identifier must be base62");
    }
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(s.as_bytes());
    Ok(bytes)
}

impl ID16 {
    /// Generate a random 16-character base62 ID
    pub fn random() -> Self {
        ID16(random_base62())
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; ID16_LENGTH] {
        &self.0
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        // Construction only ever stores base62 ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl ID8 {
    /// Generate a random 8-character base62 ID
    pub fn random() -> Self {
        ID8(random_base62())
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; ID8_LENGTH] {
        &self.0
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for ID16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for ID8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ID16 {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_base62(s).map(ID16)
    }
}

impl FromStr for ID8 {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_base62(s).map(ID8)
    }
}
