// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Raw byte strings carried by packet fields (payloads, TLV values, keys).

use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex string: {0}")]
pub struct BytesParseError(pub String);

/// An owned byte string, displayed as contiguous lowercase hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse hex digits, ignoring `:` separators and an optional `0x` prefix.
    ///
    /// # Errors
    ///
    /// Fails on non-hex characters or an odd number of digits.
    pub fn from_hex(value: &str) -> Result<Self, BytesParseError> {
        let err = || BytesParseError(value.to_string());
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let digits: Vec<u8> = trimmed.bytes().filter(|b| *b != b':').collect();
        if digits.len() % 2 != 0 {
            return Err(err());
        }
        digits
            .chunks(2)
            .map(|pair| {
                let hi = (pair[0] as char).to_digit(16).ok_or_else(err)?;
                let lo = (pair[1] as char).to_digit(16).ok_or_else(err)?;
                #[allow(clippy::cast_possible_truncation)] // two hex digits fit a byte
                Ok(((hi << 4) | lo) as u8)
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Bytes)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// Interpret the bytes as a big-endian unsigned integer. Inputs wider
    /// than 16 bytes do not fit and yield `None`.
    #[must_use]
    pub fn to_uint(&self) -> Option<u128> {
        (self.0.len() <= 16).then(|| {
            self.0
                .iter()
                .fold(0u128, |acc, b| (acc << 8) | u128::from(*b))
        })
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl FromStr for Bytes {
    type Err = BytesParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bytes::from_hex(s)
    }
}

impl Display for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_with_and_without_separators() {
        let a = Bytes::from_hex("00:11:22:ab").unwrap();
        let b = Bytes::from_hex("001122AB").unwrap();
        let c = Bytes::from_hex("0x001122ab").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_slice(), &[0x00, 0x11, 0x22, 0xab]);
        assert_eq!(a.to_string(), "001122ab");
        assert_eq!(a.to_uint(), Some(0x0011_22ab));
    }

    #[test]
    fn bad_hex() {
        assert!(Bytes::from_hex("abc").is_err());
        assert!(Bytes::from_hex("zz").is_err());
        assert_eq!(Bytes::from_hex("").unwrap(), Bytes::default());
    }
}
