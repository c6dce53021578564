use core::fmt;
use crypto_box::{PublicKey, SecretKey};
use rand::{CryptoRng, RngCore};

use crate::error::{PoolError, Result};
use crate::field::FieldElement;
use crate::poseidon;

pub const MIN_SEED_LEN: usize = 32;
/// Decoded address: shielded pubkey (32, BE) || encryption pubkey (32).
pub const ADDRESS_LEN: usize = 64;

fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new().hash_length(32).hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

// =============================================================================
//                          SHIELDED KEYPAIR
// =============================================================================

/// Spending and encryption keys of one shielded account.
///
///   privkey        = Poseidon(blake2b(seed || "shielded") mod p)
///   pubkey         = Poseidon(privkey)
///   encryption key = blake2b(seed || "encryption")   (X25519 secret)
///
/// A keypair parsed from an address can receive notes but holds neither
/// secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    privkey: Option<FieldElement>,
    pubkey: FieldElement,
    encryption_secret: Option<[u8; 32]>,
    encryption_public: [u8; 32],
}

impl Keypair {
    /// Deterministic derivation; the same seed always yields the same keys.
    pub fn from_seed(seed: &str) -> Result<Self> {
        if seed.len() < MIN_SEED_LEN {
            return Err(PoolError::InvalidSeed(seed.len()));
        }
        let shielded = blake2b_256(format!("{seed}shielded").as_bytes());
        let privkey = poseidon::hash(&[FieldElement::from_be_bytes_mod_order(&shielded)])?;
        let pubkey = poseidon::hash(&[privkey])?;

        let encryption_secret = blake2b_256(format!("{seed}encryption").as_bytes());
        let encryption_public = *SecretKey::from(encryption_secret).public_key().as_bytes();

        Ok(Keypair {
            privkey: Some(privkey),
            pubkey,
            encryption_secret: Some(encryption_secret),
            encryption_public,
        })
    }

    /// Fresh keypair from a random 32-byte seed. Used for filler UTXOs.
    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(&hex::encode(seed))
    }

    /// Receive-only keypair from a shareable address.
    pub fn from_address(address: &str) -> Result<Self> {
        let decoded = bs58::decode(address.trim())
            .into_vec()
            .map_err(|e| PoolError::InvalidAddress(e.to_string()))?;
        if decoded.len() != ADDRESS_LEN {
            return Err(PoolError::InvalidLength {
                expected: ADDRESS_LEN,
                got: decoded.len(),
            });
        }
        let mut pubkey_bytes = [0u8; 32];
        pubkey_bytes.copy_from_slice(&decoded[..32]);
        let mut encryption_public = [0u8; 32];
        encryption_public.copy_from_slice(&decoded[32..]);
        Ok(Keypair {
            privkey: None,
            pubkey: FieldElement::from_be_bytes(&pubkey_bytes)?,
            encryption_secret: None,
            encryption_public,
        })
    }

    pub fn address(&self) -> String {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[..32].copy_from_slice(&self.pubkey.to_be_bytes());
        bytes[32..].copy_from_slice(&self.encryption_public);
        bs58::encode(bytes).into_string()
    }

    pub fn pubkey(&self) -> FieldElement {
        self.pubkey
    }

    pub fn privkey(&self) -> Option<FieldElement> {
        self.privkey
    }

    pub fn can_spend(&self) -> bool {
        self.privkey.is_some()
    }

    pub fn encryption_public_key(&self) -> PublicKey {
        PublicKey::from(self.encryption_public)
    }

    pub fn encryption_secret_key(&self) -> Option<SecretKey> {
        self.encryption_secret.map(SecretKey::from)
    }

    /// signature = Poseidon(privkey, commitment, index)
    ///
    /// Only feeds nullifier derivation; not a general signature scheme.
    pub fn sign(&self, commitment: &FieldElement, index: u64) -> Result<FieldElement> {
        let privkey = self.privkey.ok_or(PoolError::MissingIndexOrKey)?;
        poseidon::hash(&[privkey, *commitment, FieldElement::from_u64(index)])
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey)
            .field("can_spend", &self.can_spend())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "a very long seed phrase that is definitely long enough";

    #[test]
    fn test_derivation_is_deterministic() {
        let a = Keypair::from_seed(SEED).unwrap();
        let b = Keypair::from_seed(SEED).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.pubkey(), poseidon::hash(&[a.privkey().unwrap()]).unwrap());

        let other = Keypair::from_seed(&format!("{SEED}!")).unwrap();
        assert_ne!(a.pubkey(), other.pubkey());
        assert_ne!(a.encryption_public_key(), other.encryption_public_key());
    }

    #[test]
    fn test_short_seed_rejected() {
        assert!(matches!(
            Keypair::from_seed("too short"),
            Err(PoolError::InvalidSeed(9))
        ));
    }

    #[test]
    fn test_address_round_trip() {
        let kp = Keypair::from_seed(SEED).unwrap();
        let receiver = Keypair::from_address(&kp.address()).unwrap();
        assert_eq!(receiver.pubkey(), kp.pubkey());
        assert_eq!(receiver.encryption_public_key(), kp.encryption_public_key());
        assert!(!receiver.can_spend());
        assert!(receiver.encryption_secret_key().is_none());
        assert_eq!(receiver.address(), kp.address());
    }

    #[test]
    fn test_address_length_checked() {
        let short = bs58::encode([1u8; 40]).into_string();
        assert!(matches!(
            Keypair::from_address(&short),
            Err(PoolError::InvalidLength { expected: 64, got: 40 })
        ));
        assert!(Keypair::from_address("0OIl").is_err());
    }

    #[test]
    fn test_sign_binds_commitment_and_index() {
        let kp = Keypair::from_seed(SEED).unwrap();
        let c = FieldElement::from_u64(1234);
        let s0 = kp.sign(&c, 0).unwrap();
        assert_eq!(s0, kp.sign(&c, 0).unwrap());
        assert_ne!(s0, kp.sign(&c, 1).unwrap());
        assert_ne!(s0, kp.sign(&FieldElement::from_u64(1235), 0).unwrap());

        let receiver = Keypair::from_address(&kp.address()).unwrap();
        assert!(matches!(receiver.sign(&c, 0), Err(PoolError::MissingIndexOrKey)));
    }

    #[test]
    fn test_random_keypairs_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Keypair::random(&mut rng).unwrap();
        let b = Keypair::random(&mut rng).unwrap();
        assert_ne!(a.pubkey(), b.pubkey());
        assert!(a.can_spend());
    }
}
