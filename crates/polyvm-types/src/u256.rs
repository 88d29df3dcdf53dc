use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 256-bit unsigned value carried as 32 raw little-endian bytes.
///
/// The execution host never does arithmetic on these; they travel through
/// contract parameters verbatim, so only conversions are provided.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U256([u8; 32]);

impl U256 {
    pub const ZERO: Self = Self([0u8; 32]);
    pub const MAX: Self = Self([0xff; 32]);
    pub const LEN: usize = 32;

    /// Create from a u64 value
    pub const fn from_u64(val: u64) -> Self {
        let le = val.to_le_bytes();
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < 8 {
            bytes[i] = le[i];
            i += 1;
        }
        Self(bytes)
    }

    /// Create from a u128 value
    pub const fn from_u128(val: u128) -> Self {
        let le = val.to_le_bytes();
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < 16 {
            bytes[i] = le[i];
            i += 1;
        }
        Self(bytes)
    }

    pub const fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn to_le_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    pub fn from_be_bytes(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// Create from a 32-byte little-endian slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| TypesError::InvalidU256Length(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<u64> for U256 {
    fn from(val: u64) -> Self {
        Self::from_u64(val)
    }
}

impl From<u128> for U256 {
    fn from(val: u128) -> Self {
        Self::from_u128(val)
    }
}

impl TryFrom<U256> for u64 {
    type Error = TypesError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        if value.0[8..].iter().any(|&b| b != 0) {
            return Err(TypesError::U256Overflow);
        }
        let mut le = [0u8; 8];
        le.copy_from_slice(&value.0[..8]);
        Ok(u64::from_le_bytes(le))
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_bytes()))
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

impl FromStr for U256 {
    type Err = TypesError;

    /// Parses a big-endian hex string, `0x` prefix optional, left-padded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = if s.len() % 2 == 1 {
            hex::decode(format!("0{s}"))?
        } else {
            hex::decode(s)?
        };
        if bytes.len() > 32 {
            return Err(TypesError::U256Overflow);
        }
        let mut padded = [0u8; 32];
        padded[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(Self::from_be_bytes(padded))
    }
}

impl AsRef<[u8]> for U256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
