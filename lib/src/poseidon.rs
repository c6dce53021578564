use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher as _};

use crate::error::{PoolError, Result};
use crate::field::FieldElement;

/// Largest input width the circom parameter set supports.
pub const MAX_INPUTS: usize = 12;

/// Poseidon over BN254 with circom-compatible parameters.
///
/// A fresh sponge is built per call; the width is fixed by `inputs.len()`.
pub fn hash(inputs: &[FieldElement]) -> Result<FieldElement> {
    if inputs.is_empty() || inputs.len() > MAX_INPUTS {
        return Err(PoolError::Hash(format!(
            "unsupported input width {}",
            inputs.len()
        )));
    }
    let mut poseidon =
        Poseidon::<Fr>::new_circom(inputs.len()).map_err(|e| PoolError::Hash(e.to_string()))?;
    let limbs: Vec<Fr> = inputs.iter().map(FieldElement::inner).collect();
    poseidon
        .hash(&limbs)
        .map(FieldElement)
        .map_err(|e| PoolError::Hash(e.to_string()))
}

/// hash2(a, b) = hash([a, b])
pub fn hash2(left: &FieldElement, right: &FieldElement) -> Result<FieldElement> {
    hash(&[*left, *right])
}

/// Two-to-one node compression used by the Merkle tree.
pub trait NodeHasher: Default {
    fn hash_pair(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement>;
}

#[derive(Default, Clone, Copy, Debug)]
pub struct PoseidonHasher;

impl NodeHasher for PoseidonHasher {
    fn hash_pair(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement> {
        hash2(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(s: &str) -> FieldElement {
        FieldElement::from_decimal(s).unwrap()
    }

    #[test]
    fn test_circom_vectors() {
        // Reference values from circomlibjs poseidon.
        let one = FieldElement::from_u64(1);
        let two = FieldElement::from_u64(2);
        assert_eq!(
            hash(&[one]).unwrap(),
            fe("18586133768512220936620570745912940619677854269274689475585506675881198879027")
        );
        assert_eq!(
            hash2(&one, &two).unwrap(),
            fe("7853200120776062878684798364095072458815029376092732009249414926327459813530")
        );
    }

    #[test]
    fn test_width_bounds() {
        assert!(hash(&[]).is_err());
        let many = vec![FieldElement::from_u64(3); MAX_INPUTS + 1];
        assert!(hash(&many).is_err());
        assert!(hash(&many[..MAX_INPUTS]).is_ok());
    }

    #[test]
    fn test_node_hasher_matches_hash2() {
        let a = FieldElement::from_u64(7);
        let b = FieldElement::from_u64(9);
        let h = PoseidonHasher.hash_pair(&a, &b).unwrap();
        assert_eq!(h, hash2(&a, &b).unwrap());
        // Order matters.
        assert_ne!(h, PoseidonHasher.hash_pair(&b, &a).unwrap());
    }
}
