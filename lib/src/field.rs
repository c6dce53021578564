use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use core::fmt;
use core::ops::{Add, Neg, Sub};
use core::str::FromStr;
use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::error::{PoolError, Result};

/// Order of the BN254 scalar field. Every commitment, nullifier, root and
/// public amount lives below this bound.
pub const FIELD_SIZE: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

// =============================================================================
//                          FIELD ELEMENT
// =============================================================================

/// An element of the proof system's scalar field.
///
/// Text and serde form is the decimal string, which is what circuit input
/// files carry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement(pub Fr);

impl FieldElement {
    pub fn zero() -> Self {
        FieldElement(Fr::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        FieldElement(Fr::from(value))
    }

    /// `(x + FIELD_SIZE) mod FIELD_SIZE` for a signed amount.
    pub fn from_signed(value: i128) -> Self {
        if value >= 0 {
            FieldElement(Fr::from(value as u128))
        } else {
            FieldElement(-Fr::from(value.unsigned_abs()))
        }
    }

    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        FieldElement(Fr::from_be_bytes_mod_order(bytes))
    }

    pub fn from_le_bytes_mod_order(bytes: &[u8]) -> Self {
        FieldElement(Fr::from_le_bytes_mod_order(bytes))
    }

    /// Strict parse of a 32-byte big-endian value; rejects values >= FIELD_SIZE.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let value = BigUint::from_bytes_be(bytes);
        Self::from_biguint(&value)
    }

    pub fn from_decimal(s: &str) -> Result<Self> {
        let value = BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .ok_or_else(|| PoolError::InvalidFieldElement(s.to_string()))?;
        Self::from_biguint(&value)
    }

    fn from_biguint(value: &BigUint) -> Result<Self> {
        if *value >= field_size() {
            return Err(PoolError::InvalidFieldElement(format!(
                "{value} exceeds field size"
            )));
        }
        Ok(FieldElement(Fr::from_be_bytes_mod_order(&value.to_bytes_be())))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let bytes = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut out = self.to_be_bytes();
        out.reverse();
        out
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.to_be_bytes())
    }

    /// Value as u64, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        let bytes = self.to_be_bytes();
        if bytes[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[24..]);
        Some(u64::from_be_bytes(word))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn inner(&self) -> Fr {
        self.0
    }
}

pub fn field_size() -> BigUint {
    // Constant literal; parsing cannot fail.
    BigUint::parse_bytes(FIELD_SIZE.as_bytes(), 10).unwrap_or_default()
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        FieldElement::from_u64(value)
    }
}

impl Add for FieldElement {
    type Output = FieldElement;
    fn add(self, rhs: Self) -> Self {
        FieldElement(self.0 + rhs.0)
    }
}

impl Sub for FieldElement {
    type Output = FieldElement;
    fn sub(self, rhs: Self) -> Self {
        FieldElement(self.0 - rhs.0)
    }
}

impl Neg for FieldElement {
    type Output = FieldElement;
    fn neg(self) -> Self {
        FieldElement(-self.0)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_biguint())
    }
}

impl FromStr for FieldElement {
    type Err = PoolError;
    fn from_str(s: &str) -> Result<Self> {
        FieldElement::from_decimal(s)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldElement::from_decimal(&s).map_err(de::Error::custom)
    }
}

// =============================================================================
//                      GENERAL-PURPOSE HASH HELPERS
// =============================================================================

/// Keccak-256 (the original Keccak padding, not SHA3-256).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// keccak256(data) read big-endian and reduced mod FIELD_SIZE.
pub fn keccak_to_field(data: &[u8]) -> FieldElement {
    FieldElement::from_be_bytes_mod_order(&keccak256(data))
}

/// sha256(bytes) with the leading byte dropped, read as a 31-byte big-endian
/// integer. Maps ledger public keys (assets, verifier programs) into the field.
pub fn hash_and_truncate_to_circuit(bytes: &[u8]) -> FieldElement {
    let digest = Sha256::digest(bytes);
    FieldElement::from_be_bytes_mod_order(&digest[1..32])
}
