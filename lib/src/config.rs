use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PoolError, Result};
use crate::ledger::Pubkey;

/// Per-transaction instruction caps for each tape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    pub miller_loop: usize,
    pub prepare_inputs: usize,
    pub final_exp: usize,
    pub insert: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            miller_loop: 115,
            prepare_inputs: 100,
            final_exp: 80,
            insert: 100,
        }
    }
}

/// Bounded resubmission of one batch: `attempts` tries in total, with a fixed
/// `delay_ms` sleep before each resubmission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 2,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Protocol parameters shared by every operation. Passed explicitly; never
/// stored in a global.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConstants {
    pub merkle_tree_levels: usize,
    /// Circuit input arity.
    pub inputs: usize,
    /// Circuit output arity.
    pub outputs: usize,
    /// Asset lookup table; index 0 is the native asset.
    pub asset_lookup_table: Vec<Pubkey>,
    pub verifier_lookup_table: Vec<Pubkey>,
    pub batch_limits: BatchLimits,
    pub retry: RetryPolicy,
    pub prover_timeout_secs: u64,
    pub shuffle_utxos: bool,
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        ProtocolConstants {
            merkle_tree_levels: 11,
            inputs: 2,
            outputs: 2,
            asset_lookup_table: vec![Pubkey::SYSTEM],
            verifier_lookup_table: vec![Pubkey::SYSTEM],
            batch_limits: BatchLimits::default(),
            retry: RetryPolicy::default(),
            prover_timeout_secs: 40,
            shuffle_utxos: false,
        }
    }
}

impl ProtocolConstants {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let constants: ProtocolConstants =
            serde_json::from_str(json).map_err(|e| PoolError::Config(e.to_string()))?;
        constants.validate()?;
        Ok(constants)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.merkle_tree_levels == 0 || self.merkle_tree_levels > 32 {
            return Err(PoolError::Config(format!(
                "merkle_tree_levels {} out of range",
                self.merkle_tree_levels
            )));
        }
        if self.inputs == 0 || self.outputs == 0 {
            return Err(PoolError::Config("circuit arity must be positive".into()));
        }
        if self.asset_lookup_table.first() != Some(&Pubkey::SYSTEM) {
            return Err(PoolError::Config(
                "asset lookup table must start with the native asset".into(),
            ));
        }
        let limits = &self.batch_limits;
        if [limits.miller_loop, limits.prepare_inputs, limits.final_exp, limits.insert].contains(&0) {
            return Err(PoolError::Config("batch limits must be positive".into()));
        }
        if self.retry.attempts == 0 {
            return Err(PoolError::Config("retry attempts must be positive".into()));
        }
        Ok(())
    }

    pub fn prover_timeout(&self) -> Duration {
        Duration::from_secs(self.prover_timeout_secs)
    }

    pub fn asset_index(&self, asset: &Pubkey) -> Option<usize> {
        self.asset_lookup_table.iter().position(|a| a == asset)
    }

    pub fn verifier_index(&self, verifier: &Pubkey) -> Option<usize> {
        self.verifier_lookup_table.iter().position(|v| v == verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ProtocolConstants::default();
        assert_eq!(c.merkle_tree_levels, 11);
        assert_eq!(c.batch_limits.miller_loop, 115);
        assert_eq!(c.batch_limits.prepare_inputs, 100);
        assert_eq!(c.batch_limits.final_exp, 80);
        assert_eq!(c.retry.attempts, 2);
        assert_eq!(c.retry.delay(), Duration::from_millis(500));
        assert_eq!(c.prover_timeout(), Duration::from_secs(40));
        assert!(!c.shuffle_utxos);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let c = ProtocolConstants::from_json_str(r#"{"merkle_tree_levels": 18, "retry": {"attempts": 3}}"#)
            .unwrap();
        assert_eq!(c.merkle_tree_levels, 18);
        assert_eq!(c.retry.attempts, 3);
        assert_eq!(c.retry.delay_ms, 500);
        assert_eq!(c.inputs, 2);
    }

    #[test]
    fn test_rejects_bad_asset_table() {
        let json = format!(r#"{{"asset_lookup_table": ["{}"]}}"#, Pubkey([5u8; 32]));
        assert!(matches!(
            ProtocolConstants::from_json_str(&json),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn test_lookup_indices() {
        let token = Pubkey([8u8; 32]);
        let mut c = ProtocolConstants::default();
        c.asset_lookup_table.push(token);
        assert_eq!(c.asset_index(&Pubkey::SYSTEM), Some(0));
        assert_eq!(c.asset_index(&token), Some(1));
        assert_eq!(c.asset_index(&Pubkey([9u8; 32])), None);
        assert_eq!(c.verifier_index(&Pubkey::SYSTEM), Some(0));
    }
}
