use core::future::Future;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::error::{PoolError, Result};
use crate::field::FieldElement;
use crate::instruction::{MAX_PREPARED_INPUTS_LEN, PROOF_PAYLOAD_LEN};
use crate::params::ProofInput;

pub const G1_LEN: usize = 96;
pub const G2_LEN: usize = 192;

/// Groth16 proof in the verifier's byte layout: every coordinate is a
/// 32-byte little-endian word, points are projective (x, y, z).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofBytes {
    pub a: [u8; G1_LEN],
    pub b: [u8; G2_LEN],
    pub c: [u8; G1_LEN],
}

impl ProofBytes {
    pub fn from_slices(a: &[u8], b: &[u8], c: &[u8]) -> Result<Self> {
        Ok(ProofBytes {
            a: fixed(a)?,
            b: fixed(b)?,
            c: fixed(c)?,
        })
    }

    /// Placeholder proof for offline runs; the in-memory ledger never checks it.
    pub fn zeroed() -> Self {
        ProofBytes {
            a: [0u8; G1_LEN],
            b: [0u8; G2_LEN],
            c: [0u8; G1_LEN],
        }
    }

    /// A || C, the payload of the first proof load.
    pub fn a_c_payload(&self) -> Box<[u8; PROOF_PAYLOAD_LEN]> {
        let mut out = Box::new([0u8; PROOF_PAYLOAD_LEN]);
        out[..G1_LEN].copy_from_slice(&self.a);
        out[G1_LEN..].copy_from_slice(&self.c);
        out
    }

    pub fn b_payload(&self) -> Box<[u8; PROOF_PAYLOAD_LEN]> {
        Box::new(self.b)
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| PoolError::InvalidLength {
        expected: N,
        got: bytes.len(),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOutput {
    pub proof: ProofBytes,
    pub public_inputs: Vec<FieldElement>,
}

impl ProofOutput {
    /// Public inputs as consecutive 32-byte LE words, the payload of the
    /// prepare-inputs init instruction.
    pub fn prepared_inputs_bytes(&self) -> Result<Vec<u8>> {
        let bytes: Vec<u8> = self.public_inputs.iter().flat_map(|x| x.to_le_bytes()).collect();
        if bytes.len() > MAX_PREPARED_INPUTS_LEN {
            return Err(PoolError::InvalidLength {
                expected: MAX_PREPARED_INPUTS_LEN,
                got: bytes.len(),
            });
        }
        Ok(bytes)
    }
}

// =============================================================================
//                               PROVER
// =============================================================================

/// External Groth16 prover.
pub trait Prover: Sync {
    fn prove(&self, input: &ProofInput) -> impl Future<Output = Result<ProofOutput>> + Send;
}

/// Runs `prover` under `timeout`. An elapsed timer is `ProverTimeout`; the
/// attempt is dropped and nothing of it is reused.
pub async fn prove_with_timeout<P: Prover>(
    prover: &P,
    input: &ProofInput,
    timeout: Duration,
) -> Result<ProofOutput> {
    info!(timeout_secs = timeout.as_secs(), "generating proof");
    match tokio::time::timeout(timeout, prover.prove(input)).await {
        Ok(result) => result,
        Err(_) => Err(PoolError::ProverTimeout {
            secs: timeout.as_secs(),
        }),
    }
}

/// Returns the same output for every input.
#[derive(Clone, Debug)]
pub struct FixedProver {
    pub output: ProofOutput,
}

impl Prover for FixedProver {
    async fn prove(&self, _input: &ProofInput) -> Result<ProofOutput> {
        Ok(self.output.clone())
    }
}

// =============================================================================
//                         SNARKJS PROOF FORMAT
// =============================================================================

/// `proof.json` as written by `snarkjs groth16 prove`. Coordinates are
/// decimal strings; `pi_b` pairs are `[c0, c1]`.
#[derive(Clone, Debug, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
}

impl SnarkjsProof {
    pub fn to_proof_bytes(&self) -> Result<ProofBytes> {
        let a = g1_bytes(&self.pi_a)?;
        let c = g1_bytes(&self.pi_c)?;
        let b_words: Vec<&String> = self.pi_b.iter().take(3).flatten().collect();
        let b = words_le(&b_words)?;
        ProofBytes::from_slices(&a, &b, &c)
    }
}

/// `public.json`: decimal strings.
pub fn parse_public_signals(signals: &[String]) -> Result<Vec<FieldElement>> {
    signals.iter().map(|s| FieldElement::from_decimal(s)).collect()
}

fn g1_bytes(coords: &[String]) -> Result<Vec<u8>> {
    let words: Vec<&String> = coords.iter().take(3).collect();
    words_le(&words)
}

fn words_le(words: &[&String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(words.len() * 32);
    for word in words {
        out.extend_from_slice(&FieldElement::from_decimal(word)?.to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(n_inputs: usize) -> ProofOutput {
        ProofOutput {
            proof: ProofBytes::zeroed(),
            public_inputs: (0..n_inputs as u64).map(FieldElement::from_u64).collect(),
        }
    }

    struct SlowProver;

    impl Prover for SlowProver {
        async fn prove(&self, _input: &ProofInput) -> Result<ProofOutput> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(output(1))
        }
    }

    fn sample_input() -> ProofInput {
        let zero = FieldElement::zero();
        ProofInput {
            root: zero,
            input_nullifier: vec![],
            output_commitment: vec![],
            public_amount_spl: zero,
            public_amount_sol: zero,
            public_mint_pubkey: zero,
            tx_integrity_hash: zero,
            internal_tx_integrity_hash: zero,
            in_private_key: vec![],
            in_path_indices: vec![],
            in_path_elements: vec![],
            in_amount: vec![],
            in_blinding: vec![],
            in_app_data_hash: vec![],
            in_pool_type: vec![],
            in_verifier_pubkey: vec![],
            out_amount: vec![],
            out_blinding: vec![],
            out_pubkey: vec![],
            out_app_data_hash: vec![],
            out_pool_type: vec![],
            out_verifier_pubkey: vec![],
            asset_pubkeys: [zero; 3],
            in_indices: vec![],
            out_indices: vec![],
            transaction_version: zero,
        }
    }

    #[test]
    fn test_proof_bytes_lengths() {
        assert!(ProofBytes::from_slices(&[0; 96], &[0; 192], &[0; 96]).is_ok());
        assert!(matches!(
            ProofBytes::from_slices(&[0; 95], &[0; 192], &[0; 96]),
            Err(PoolError::InvalidLength { expected: 96, got: 95 })
        ));
        let mut proof = ProofBytes::zeroed();
        proof.a[0] = 1;
        proof.c[0] = 2;
        let ac = proof.a_c_payload();
        assert_eq!((ac[0], ac[96]), (1, 2));
    }

    #[test]
    fn test_prepared_inputs_bytes() {
        let bytes = output(6).prepared_inputs_bytes().unwrap();
        assert_eq!(bytes.len(), 192);
        assert_eq!(bytes[32], 1);
        assert!(matches!(
            output(7).prepared_inputs_bytes(),
            Err(PoolError::InvalidLength { expected: 208, got: 224 })
        ));
    }

    #[test]
    fn test_snarkjs_proof_parsing() {
        let json = r#"{
            "pi_a": ["1", "2", "1"],
            "pi_b": [["3", "4"], ["5", "6"], ["1", "0"]],
            "pi_c": ["7", "8", "1"],
            "protocol": "groth16"
        }"#;
        let proof: SnarkjsProof = serde_json::from_str(json).unwrap();
        let bytes = proof.to_proof_bytes().unwrap();
        assert_eq!(bytes.a[0], 1);
        assert_eq!(bytes.a[32], 2);
        assert_eq!(bytes.b[32], 4);
        assert_eq!(bytes.b[160], 0);
        assert_eq!(bytes.c[64], 1);
        let signals = parse_public_signals(&["9".to_string()]).unwrap();
        assert_eq!(signals, vec![FieldElement::from_u64(9)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prover_timeout() {
        let err = prove_with_timeout(&SlowProver, &sample_input(), Duration::from_secs(40))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::ProverTimeout { secs: 40 }));
    }

    #[tokio::test]
    async fn test_fixed_prover() {
        let prover = FixedProver { output: output(2) };
        let out = prove_with_timeout(&prover, &sample_input(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, output(2));
    }
}
