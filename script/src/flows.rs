//! Multi-step user flows shared by the CLI and the e2e script.

use anyhow::{ensure, Context, Result};
use light_pool_lib::prover::prove_with_timeout;
use light_pool_lib::replay::ReplayReport;
use light_pool_lib::sync::{self, parse_storage_account, SyncState};
use light_pool_lib::{
    Action, DepositNote, FieldElement, FixedProver, Keypair, Ledger, ProofBytes,
    ProofOutput, Prover, Pubkey, ReplayEngine, StorageSnapshot, TransactionParameters,
    TransactionRequest, Utxo,
};
use rand::{CryptoRng, RngCore};
use tracing::info;

use crate::config::EnvConfig;
use crate::prover::SnarkjsProver;

/// Reads and parses the Merkle tree storage account.
pub async fn load_storage<L: Ledger>(ledger: &L, cfg: &EnvConfig) -> Result<StorageSnapshot> {
    let data = ledger
        .get_account(&cfg.ctx.merkle_tree)
        .await?
        .with_context(|| format!("merkle tree account {} not found", cfg.ctx.merkle_tree))?;
    Ok(parse_storage_account(&data, cfg.constants.merkle_tree_levels)?)
}

pub async fn sync_wallet<L: Ledger>(ledger: &L, cfg: &EnvConfig, keypair: &Keypair) -> Result<SyncState> {
    Ok(sync::sync_balance(ledger, &cfg.ctx, keypair, &cfg.constants).await?)
}

/// Generates a note for `amount` base units and inserts its commitment.
pub async fn deposit<L: Ledger, R: RngCore + CryptoRng>(
    ledger: &L,
    cfg: &EnvConfig,
    currency: &str,
    amount: &str,
    lamports: u64,
    rng: &mut R,
) -> Result<(DepositNote, ReplayReport)> {
    let note = DepositNote::generate(currency, amount, rng)?;
    let commitment = note.commitment()?;
    let engine = ReplayEngine::new(ledger, &cfg.ctx, &cfg.constants);
    let report = engine.insert_leaf(&commitment, lamports, rng).await?;
    Ok((note, report))
}

/// One output carrying `amount` of `asset` to `keypair`. Advances the
/// wallet's transaction nonce.
pub fn shield_params<R: RngCore + CryptoRng>(
    keypair: &Keypair,
    state: &mut SyncState,
    amount: u64,
    asset: Pubkey,
    cfg: &EnvConfig,
    rng: &mut R,
) -> Result<TransactionParameters> {
    let output = if asset == Pubkey::SYSTEM {
        Utxo::new(keypair.clone(), &[Pubkey::SYSTEM], &[amount], rng)?
    } else {
        Utxo::new(keypair.clone(), &[Pubkey::SYSTEM, asset], &[0, amount], rng)?
    };
    let request = TransactionRequest::new(Action::Shield, cfg.ctx.payer, cfg.ctx.merkle_tree)
        .with_outputs(vec![output])
        .with_transaction_nonce(state.balance.bump_nonce());
    Ok(TransactionParameters::build(request, &state.tree, &cfg.constants, rng)?)
}

/// Spends enough native notes to pay `amount + fee`; the rest comes back
/// as change. Advances the wallet's transaction nonce.
pub fn unshield_params<R: RngCore + CryptoRng>(
    keypair: &Keypair,
    state: &mut SyncState,
    amount: u64,
    fee: u64,
    recipient: Pubkey,
    cfg: &EnvConfig,
    rng: &mut R,
) -> Result<TransactionParameters> {
    let needed = amount.checked_add(fee).context("amount plus fee overflows")?;
    let inputs = state
        .balance
        .select_inputs(&Pubkey::SYSTEM, needed, cfg.constants.inputs)?;
    let available: u64 = inputs.iter().map(|u| u.amounts()[0]).sum();
    ensure!(available >= needed, "selected notes hold {available}, {needed} needed");

    let change = Utxo::new(keypair.clone(), &[Pubkey::SYSTEM], &[available - needed], rng)?;
    let request = TransactionRequest::new(Action::Unshield, cfg.ctx.payer, cfg.ctx.merkle_tree)
        .with_inputs(inputs)
        .with_outputs(vec![change])
        .with_relayer(cfg.ctx.payer, fee)
        .with_recipient_sol(recipient)
        .with_transaction_nonce(state.balance.bump_nonce());
    Ok(TransactionParameters::build(request, &state.tree, &cfg.constants, rng)?)
}

/// What is left of `shielded` after unshielding `amount` and paying `fee`.
pub fn unshield_change(shielded: u64, amount: u64, fee: u64) -> Result<u64> {
    let needed = amount.checked_add(fee).context("amount plus fee overflows")?;
    shielded
        .checked_sub(needed)
        .with_context(|| format!("unshielding {amount} plus fee {fee} exceeds the {shielded} shielded"))
}

/// Stand-in prover for dry runs: a zero proof over the public signals the
/// verifier reads first.
pub fn fixture_prover(params: &TransactionParameters) -> FixedProver {
    FixedProver {
        output: ProofOutput {
            proof: ProofBytes::zeroed(),
            public_inputs: vec![
                params.root,
                params.public_amount_spl,
                params.tx_integrity_hash,
                params.public_amount_sol,
                params.public_mint(),
                params.input_nullifiers.first().copied().unwrap_or_else(FieldElement::zero),
            ],
        },
    }
}

/// Picks the fixture prover for dry runs and snarkjs otherwise.
pub async fn verify_transaction<L: Ledger, R: RngCore>(
    ledger: &L,
    cfg: &EnvConfig,
    params: &TransactionParameters,
    recipient: Pubkey,
    dry_run: bool,
    rng: &mut R,
) -> Result<Vec<ReplayReport>> {
    if dry_run {
        let prover = fixture_prover(params);
        return prove_and_verify(ledger, &prover, cfg, params, recipient, rng).await;
    }
    let paths = cfg
        .prover
        .clone()
        .context("PROVER_WASM and PROVER_ZKEY must be set to generate proofs")?;
    prove_and_verify(ledger, &SnarkjsProver::new(paths), cfg, params, recipient, rng).await
}

/// Proves `params` and replays the three verification tapes.
pub async fn prove_and_verify<L: Ledger, P: Prover, R: RngCore>(
    ledger: &L,
    prover: &P,
    cfg: &EnvConfig,
    params: &TransactionParameters,
    recipient: Pubkey,
    rng: &mut R,
) -> Result<Vec<ReplayReport>> {
    let proof = prove_with_timeout(prover, &params.proof_input(), cfg.constants.prover_timeout()).await?;
    info!(public_inputs = proof.public_inputs.len(), "proof ready");
    let engine = ReplayEngine::new(ledger, &cfg.ctx, &cfg.constants);
    Ok(engine.verify_and_withdraw(&proof, recipient, rng).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use light_pool_lib::sync::Balance;
    use light_pool_lib::{LedgerContext, MerkleTree, ProtocolConstants};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "seed phrase used only by the flow tests";

    fn cfg() -> EnvConfig {
        EnvConfig {
            rpc_url: String::new(),
            relayer_url: String::new(),
            ctx: LedgerContext {
                payer: Pubkey([1; 32]),
                verifier_program: Pubkey([2; 32]),
                prepare_inputs_program: Pubkey([3; 32]),
                merkle_tree: Pubkey([4; 32]),
                commitment: Default::default(),
            },
            constants: ProtocolConstants::default(),
            prover: None,
        }
    }

    #[test]
    fn test_each_assembled_transaction_advances_nonce() {
        let cfg = cfg();
        let keypair = Keypair::from_seed(SEED).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = SyncState {
            tree: MerkleTree::new(cfg.constants.merkle_tree_levels).unwrap(),
            balance: Balance::default(),
            accounts_scanned: 0,
        };

        let shield = shield_params(&keypair, &mut state, 100, Pubkey::SYSTEM, &cfg, &mut rng).unwrap();
        assert_eq!(shield.transaction_nonce, 1);
        assert_eq!(state.balance.transaction_nonce, 1);

        let note = shield.outputs.iter().find(|u| !u.is_empty()).unwrap().clone();
        let index = state.tree.insert(note.commitment().unwrap()).unwrap();
        state.balance.add_utxo(note.with_index(index as u64)).unwrap();

        let unshield = unshield_params(&keypair, &mut state, 60, 5, Pubkey([9; 32]), &cfg, &mut rng).unwrap();
        assert_eq!(unshield.transaction_nonce, 2);
        assert_eq!(state.balance.transaction_nonce, 2);
        assert_eq!(unshield.public_amount_sol, -FieldElement::from_u64(65));
    }

    #[test]
    fn test_unshield_change() {
        assert_eq!(unshield_change(100, 60, 5).unwrap(), 35);
        assert_eq!(unshield_change(65, 60, 5).unwrap(), 0);
        assert!(unshield_change(64, 60, 5).is_err());
        assert!(unshield_change(u64::MAX, u64::MAX, 1).is_err());
    }
}
