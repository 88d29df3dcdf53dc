use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 20-byte identifier shared by accounts and contracts.
///
/// Both kinds are the first 20 bytes of a blake3 digest: of the ed25519
/// public key for accounts, of the deployed code for contracts. Native
/// contracts sit at reserved system addresses instead (see [`Address::system`]).
///
/// Displays as Bech32m with the `poly` prefix; parses from Bech32m or `0x` hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);
    pub const LEN: usize = 20;

    /// Bech32m human-readable prefix
    pub const BECH32_HRP: &'static str = "poly";

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| TypesError::InvalidAddressLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Account address of an ed25519 public key.
    pub fn from_public_key(pubkey: &[u8; 32]) -> Self {
        Self::digest_prefix(pubkey)
    }

    /// Address a contract deploys to, derived from its code.
    pub fn from_code(code: &[u8]) -> Self {
        Self::digest_prefix(code)
    }

    fn digest_prefix(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..Self::LEN]);
        Self(bytes)
    }

    /// Reserved system address carrying `id` big-endian in its last 4 bytes.
    pub const fn system(id: u32) -> Self {
        let id = id.to_be_bytes();
        let mut bytes = [0u8; 20];
        bytes[16] = id[0];
        bytes[17] = id[1];
        bytes[18] = id[2];
        bytes[19] = id[3];
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Whether this is a non-zero address in the reserved system range.
    /// Only system addresses may host native contracts.
    pub fn is_system(&self) -> bool {
        !self.is_zero() && self.0[..16].iter().all(|&b| b == 0)
    }

    /// Hex without `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn hrp() -> bech32::Hrp {
        bech32::Hrp::parse_unchecked(Self::BECH32_HRP)
    }

    pub fn to_bech32(&self) -> Result<String, TypesError> {
        bech32::encode::<bech32::Bech32m>(Self::hrp(), &self.0)
            .map_err(|e| TypesError::Bech32Error(e.to_string()))
    }

    pub fn from_bech32(s: &str) -> Result<Self, TypesError> {
        let (hrp, data) = bech32::decode(s).map_err(|e| TypesError::Bech32Error(e.to_string()))?;
        if hrp != Self::hrp() {
            return Err(TypesError::InvalidAddressFormat(format!(
                "expected prefix '{}', got '{}'",
                Self::BECH32_HRP,
                hrp
            )));
        }
        Self::from_slice(&data)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_bech32().map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return Self::from_slice(&hex::decode(hex_part)?);
        }
        if s.starts_with("poly1") {
            return Self::from_bech32(s);
        }
        Err(TypesError::InvalidAddressFormat(s.to_string()))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
