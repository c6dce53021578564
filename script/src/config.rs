//! Environment configuration for the binaries.
//!
//! Required env vars (from .env):
//!   RPC_URL                    - ledger JSON-RPC endpoint
//!   RELAYER_URL                - relayer that signs, pays for and forwards transactions
//!   PROGRAM_ID                 - verifier program
//!   PROGRAM_PREPARE_INPUTS_ID  - prepare-inputs program
//!   MERKLE_TREE_ACCOUNT        - Merkle tree storage account
//!   PAYER                      - relayer fee payer
//!
//! Optional env vars:
//!   PROTOCOL_CONFIG            - JSON file with protocol constants
//!   PROVER_WASM, PROVER_ZKEY   - circuit artifacts for snarkjs
//!   SNARKJS                    - snarkjs executable (default: snarkjs)

use anyhow::{ensure, Context, Result};
use light_pool_lib::{LedgerContext, ProtocolConstants, Pubkey};
use std::path::PathBuf;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Circuit artifacts handed to snarkjs.
#[derive(Clone, Debug)]
pub struct ProverPaths {
    pub wasm: PathBuf,
    pub zkey: PathBuf,
    pub snarkjs: String,
}

#[derive(Clone, Debug)]
pub struct EnvConfig {
    pub rpc_url: String,
    pub relayer_url: String,
    pub ctx: LedgerContext,
    pub constants: ProtocolConstants,
    pub prover: Option<ProverPaths>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(EnvConfig {
            rpc_url: required("RPC_URL")?,
            relayer_url: required("RELAYER_URL")?,
            ctx: LedgerContext {
                payer: pubkey_var("PAYER")?,
                verifier_program: pubkey_var("PROGRAM_ID")?,
                prepare_inputs_program: pubkey_var("PROGRAM_PREPARE_INPUTS_ID")?,
                merkle_tree: pubkey_var("MERKLE_TREE_ACCOUNT")?,
                commitment: Default::default(),
            },
            constants: constants_from_env()?,
            prover: prover_from_env(),
        })
    }

    /// Settings for runs against the in-memory ledger. Any deployment
    /// variable that is set still wins over the placeholder.
    pub fn dry_run() -> Result<Self> {
        let pick = |name: &str| -> Result<Pubkey> {
            match std::env::var(name) {
                Ok(_) => pubkey_var(name),
                Err(_) => label_pubkey(name),
            }
        };
        Ok(EnvConfig {
            rpc_url: String::new(),
            relayer_url: String::new(),
            ctx: LedgerContext {
                payer: pick("PAYER")?,
                verifier_program: pick("PROGRAM_ID")?,
                prepare_inputs_program: pick("PROGRAM_PREPARE_INPUTS_ID")?,
                merkle_tree: pick("MERKLE_TREE_ACCOUNT")?,
                commitment: Default::default(),
            },
            constants: constants_from_env()?,
            prover: prover_from_env(),
        })
    }
}

pub fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} not set"))
}

fn pubkey_var(name: &str) -> Result<Pubkey> {
    required(name)?
        .parse()
        .with_context(|| format!("{name} is not a base58 pubkey"))
}

fn constants_from_env() -> Result<ProtocolConstants> {
    match std::env::var("PROTOCOL_CONFIG") {
        Ok(path) => ProtocolConstants::from_json_file(&path)
            .with_context(|| format!("loading PROTOCOL_CONFIG from {path}")),
        Err(_) => Ok(ProtocolConstants::default()),
    }
}

fn prover_from_env() -> Option<ProverPaths> {
    let wasm = std::env::var("PROVER_WASM").ok()?;
    let zkey = std::env::var("PROVER_ZKEY").ok()?;
    Some(ProverPaths {
        wasm: wasm.into(),
        zkey: zkey.into(),
        snarkjs: std::env::var("SNARKJS").unwrap_or_else(|_| "snarkjs".to_string()),
    })
}

/// Parses a decimal amount like "1.5" into base units with `decimals`
/// fractional digits, without going through floating point.
pub fn parse_amount(s: &str, decimals: u32) -> Result<u64> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    ensure!(
        !(whole.is_empty() && frac.is_empty())
            && whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()),
        "invalid amount {s:?}"
    );
    ensure!(
        frac.len() <= decimals as usize,
        "amount {s} has more than {decimals} decimals"
    );
    let scale = 10u64.pow(decimals);
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse()? };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = decimals as usize).parse()?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .with_context(|| format!("amount {s} overflows u64"))
}

/// Stable placeholder address for `label`.
pub fn label_pubkey(label: &str) -> Result<Pubkey> {
    Ok(Pubkey::create_with_seed(&Pubkey::SYSTEM, label, &Pubkey::SYSTEM)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", 9).unwrap(), 1_500_000_000);
        assert_eq!(parse_amount("2", 9).unwrap(), 2 * LAMPORTS_PER_SOL);
        assert_eq!(parse_amount(".25", 2).unwrap(), 25);
        assert!(parse_amount("1.2345", 2).is_err());
        assert!(parse_amount("abc", 9).is_err());
        assert!(parse_amount(".", 9).is_err());
        assert!(parse_amount("-1", 9).is_err());
    }

    #[test]
    fn test_placeholder_pubkeys_differ() {
        let payer = label_pubkey("PAYER").unwrap();
        assert_ne!(payer, label_pubkey("PROGRAM_ID").unwrap());
        assert_eq!(payer, label_pubkey("PAYER").unwrap());
    }
}
