use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// A 32-byte ledger identity.
///
/// Program identities, entry owners, and account addresses all share this
/// representation. The textual form is base58, matching how the ledger's
/// RPC and tooling print keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// Byte length of an address.
    pub const LEN: usize = 32;

    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The system program, which owns freshly allocated accounts.
    pub const fn system_program() -> Self {
        Self([0; 32])
    }

    /// Random address for tests and demos.
    pub fn ephemeral() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Parse a base58 string.
    pub fn from_base58(s: &str) -> Result<Self, TypeError> {
        decode_fixed::<32>(s).map(Self)
    }

    /// Create from a byte slice that must be exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Full base58 encoding.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Abbreviated form (`abcd..wxyz`) for logs and tables.
    pub fn short_id(&self) -> String {
        let full = self.to_base58();
        if full.len() <= 10 {
            return full;
        }
        format!("{}..{}", &full[..4], &full[full.len() - 4..])
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

/// Decode a base58 string into exactly `N` bytes.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let bytes = bs58::decode(s.trim())
        .into_vec()
        .map_err(|e| TypeError::InvalidBase58(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| TypeError::InvalidLength { expected: N, actual })
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short_id())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(serde::de::Error::custom)
    }
}
