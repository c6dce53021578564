//! Groth16 proving through the snarkjs CLI.

use light_pool_lib::params::ProofInput;
use light_pool_lib::prover::{parse_public_signals, SnarkjsProof};
use light_pool_lib::{PoolError, ProofOutput, Prover, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProverPaths;

/// Runs `snarkjs groth16 fullprove` in a scratch directory per proof.
///
/// The child is killed when the proving future is dropped, so a timeout
/// around `prove` does not leave snarkjs running.
pub struct SnarkjsProver {
    paths: ProverPaths,
}

impl SnarkjsProver {
    pub fn new(paths: ProverPaths) -> Self {
        SnarkjsProver { paths }
    }
}

fn prover_err(context: &str) -> impl Fn(std::io::Error) -> PoolError + '_ {
    move |e| PoolError::Prover(format!("{context}: {e}"))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(prover_err("reading snarkjs output"))?;
    serde_json::from_slice(&bytes).map_err(|e| PoolError::Prover(format!("{}: {e}", path.display())))
}

impl Prover for SnarkjsProver {
    async fn prove(&self, input: &ProofInput) -> Result<ProofOutput> {
        let dir = tempfile::tempdir().map_err(prover_err("creating scratch dir"))?;
        let input_path = dir.path().join("input.json");
        let proof_path = dir.path().join("proof.json");
        let public_path = dir.path().join("public.json");

        let json = serde_json::to_vec(input).map_err(|e| PoolError::Prover(e.to_string()))?;
        tokio::fs::write(&input_path, json)
            .await
            .map_err(prover_err("writing input.json"))?;

        debug!(wasm = %self.paths.wasm.display(), zkey = %self.paths.zkey.display(), "running snarkjs");
        let output = Command::new(&self.paths.snarkjs)
            .args(["groth16", "fullprove"])
            .arg(&input_path)
            .arg(&self.paths.wasm)
            .arg(&self.paths.zkey)
            .arg(&proof_path)
            .arg(&public_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(prover_err("spawning snarkjs"))?;
        if !output.status.success() {
            return Err(PoolError::Prover(format!(
                "snarkjs exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let proof: SnarkjsProof = read_json(&proof_path).await?;
        let signals: Vec<String> = read_json(&public_path).await?;
        Ok(ProofOutput {
            proof: proof.to_proof_bytes()?,
            public_inputs: parse_public_signals(&signals)?,
        })
    }
}
