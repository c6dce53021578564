//! End-to-end run: deposit → shield → sync → unshield → sync.
//!
//! With RPC_URL set, runs against a deployed pool through the relayer and
//! proves with snarkjs. Without it, runs against the in-memory ledger with a
//! zero-proof fixture; the ledger does not execute the pool programs, so the
//! script writes the accounts they would have written itself (marked
//! "mirror" in the output).
//!
//! Usage:
//!   cargo run --release -p light-pool-script --bin e2e
//!
//! Env vars: see `light_pool_script::config`. Additionally:
//!   SHIELDED_SEED     - seed of the shielded keypair (random if unset)
//!   DEPOSIT_AMOUNT    - legacy deposit in SOL (default: 0.1)
//!   SHIELD_AMOUNT     - shielded amount in SOL (default: 0.5)
//!   UNSHIELD_AMOUNT   - unshielded amount in SOL (default: 0.2)
//!   RELAYER_FEE       - relayer fee in SOL (default: 0.01)

use anyhow::{ensure, Context, Result};
use light_pool_lib::replay::ReplayReport;
use light_pool_lib::sync::{check_deposit, nullifier_marker, LeavesAccount, LEAVES_ENCRYPTED_LEN};
use light_pool_lib::{
    FieldElement, Keypair, Ledger, LedgerContext, MemoryLedger, Pubkey, ReplayEngine, StorageSnapshot,
    TransactionParameters,
};
use light_pool_script::config::{label_pubkey, parse_amount, EnvConfig, LAMPORTS_PER_SOL};
use light_pool_script::{flows, setup_logger, RpcLedger};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn env_amount(name: &str, default: &str) -> Result<u64> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    parse_amount(&raw, 9).with_context(|| format!("{name} is not a SOL amount"))
}

fn sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn print_reports(reports: &[ReplayReport]) {
    for r in reports {
        println!("    {:<15} {:>3} tx  {:>4} ix", r.tape, r.signatures.len(), r.instructions);
    }
}

// ---------------------------------------------------------------------------
// Dry-run mirror: stands in for the pool programs' account writes
// ---------------------------------------------------------------------------

struct Mirror<'a> {
    ledger: &'a MemoryLedger,
    ctx: &'a LedgerContext,
    storage: StorageSnapshot,
    pairs: u64,
}

impl<'a> Mirror<'a> {
    fn new(ledger: &'a MemoryLedger, cfg: &'a EnvConfig) -> Self {
        Mirror {
            ledger,
            ctx: &cfg.ctx,
            storage: StorageSnapshot {
                height: cfg.constants.merkle_tree_levels as u64,
                next_index: 0,
                leaves: Vec::new(),
                nullifiers: Vec::new(),
            },
            pairs: 0,
        }
    }

    fn write_storage(&self) {
        self.ledger
            .set_account(self.ctx.merkle_tree, self.ctx.verifier_program, self.storage.to_bytes());
    }

    fn insert_leaf(&mut self, leaf: &FieldElement) {
        self.storage.leaves.push(leaf.to_le_bytes());
        self.storage.next_index = self.storage.leaves.len() as u64;
        self.write_storage();
    }

    /// Leaf-pair account for the outputs and a marker per spent nullifier.
    fn apply(&mut self, params: &TransactionParameters) -> Result<()> {
        let [left, right] = params.output_commitments[..] else {
            anyhow::bail!("expected two output commitments, got {}", params.output_commitments.len());
        };
        let encrypted = &params.encrypted_outputs[..params.encrypted_outputs.len().min(LEAVES_ENCRYPTED_LEN)];
        let account = LeavesAccount {
            left_index: self.pairs * 2,
            merkle_tree: self.ctx.merkle_tree,
            left,
            right,
            encrypted_outputs: encrypted.to_vec(),
        };
        let address = Pubkey::create_with_seed(
            &self.ctx.merkle_tree,
            &format!("leaves-{}", self.pairs),
            &self.ctx.verifier_program,
        )?;
        self.ledger
            .set_account(address, self.ctx.verifier_program, account.to_bytes());
        self.pairs += 1;

        for nullifier in &params.input_nullifiers {
            let marker = nullifier_marker(self.ctx, nullifier)?;
            self.ledger.set_account(marker, self.ctx.verifier_program, Vec::new());
        }
        println!(
            "    mirror: leaf pair {} written, {} nullifiers marked",
            self.pairs - 1,
            params.input_nullifiers.len()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_logger(false);

    println!("\n=== Light Pool E2E ===\n");

    if std::env::var("RPC_URL").is_ok() {
        let cfg = EnvConfig::from_env()?;
        let ledger = RpcLedger::new(&cfg.rpc_url, &cfg.relayer_url);
        println!("Mode:             live ({})", cfg.rpc_url);
        run(&ledger, &cfg, None).await
    } else {
        let cfg = EnvConfig::dry_run()?;
        let ledger = MemoryLedger::new();
        println!("Mode:             dry run (in-memory ledger)");
        let mirror = Mirror::new(&ledger, &cfg);
        run(&ledger, &cfg, Some(mirror)).await
    }
}

async fn run<L: Ledger>(ledger: &L, cfg: &EnvConfig, mut mirror: Option<Mirror<'_>>) -> Result<()> {
    let dry_run = mirror.is_some();
    let mut rng = StdRng::from_entropy();

    let deposit_raw = std::env::var("DEPOSIT_AMOUNT").unwrap_or_else(|_| "0.1".to_string());
    let deposit_amount = parse_amount(&deposit_raw, 9).context("DEPOSIT_AMOUNT is not a SOL amount")?;
    let shield_amount = env_amount("SHIELD_AMOUNT", "0.5")?;
    let unshield_amount = env_amount("UNSHIELD_AMOUNT", "0.2")?;
    let fee = env_amount("RELAYER_FEE", "0.01")?;
    let expected_change = flows::unshield_change(shield_amount, unshield_amount, fee)?;

    println!("Merkle tree:      {}", cfg.ctx.merkle_tree);
    println!("Verifier:         {}", cfg.ctx.verifier_program);
    println!("Tree:             {} levels", cfg.constants.merkle_tree_levels);
    println!("Deposit:          {} SOL", sol(deposit_amount));
    println!("Shield:           {} SOL", sol(shield_amount));
    println!("Unshield:         {} SOL (fee {})\n", sol(unshield_amount), sol(fee));

    // ── Step 1: Keys ───────────────────────────────────────────────────
    let keypair = match std::env::var("SHIELDED_SEED") {
        Ok(seed) => Keypair::from_seed(&seed)?,
        Err(_) => Keypair::random(&mut rng)?,
    };
    println!("[1] Shielded address: {}...", &keypair.address()[..16]);

    // ── Step 2: Tree ───────────────────────────────────────────────────
    println!("[2] Initializing merkle tree...");
    let engine = ReplayEngine::new(ledger, &cfg.ctx, &cfg.constants);
    let report = engine.init_tree().await?;
    print_reports(std::slice::from_ref(&report));
    if let Some(m) = mirror.as_mut() {
        m.write_storage();
        println!("    mirror: empty storage account written");
    }

    // ── Step 3: Legacy deposit ─────────────────────────────────────────
    println!("[3] Depositing {} SOL...", sol(deposit_amount));
    let (note, report) = flows::deposit(ledger, cfg, "SOL", &deposit_raw, deposit_amount, &mut rng).await?;
    print_reports(std::slice::from_ref(&report));
    let commitment = note.commitment()?;
    if let Some(m) = mirror.as_mut() {
        m.insert_leaf(&commitment);
        println!("    mirror: leaf appended to storage");
    }

    // ── Step 4: Check the deposit ──────────────────────────────────────
    println!("[4] Checking deposit against storage...");
    let snapshot = flows::load_storage(ledger, cfg).await?;
    let status = check_deposit(&note, &snapshot)?;
    ensure!(status.found_leaf, "deposit commitment not in storage");
    ensure!(!status.found_nullifier, "fresh deposit already spent");
    println!(
        "    Leaf {} of {}, root {}",
        status.leaf_position.unwrap_or_default(),
        snapshot.next_index,
        snapshot.tree()?.root()
    );

    // ── Step 5: Shield ─────────────────────────────────────────────────
    println!("[5] Shielding {} SOL...", sol(shield_amount));
    let mut state = flows::sync_wallet(ledger, cfg, &keypair).await?;
    let shield = flows::shield_params(&keypair, &mut state, shield_amount, Pubkey::SYSTEM, cfg, &mut rng)?;
    println!("    Integrity hash: {} (nonce {})", shield.tx_integrity_hash, shield.transaction_nonce);
    let reports = flows::verify_transaction(ledger, cfg, &shield, cfg.ctx.merkle_tree, dry_run, &mut rng).await?;
    print_reports(&reports);
    if let Some(m) = mirror.as_mut() {
        m.apply(&shield)?;
    }

    // ── Step 6: Sync ───────────────────────────────────────────────────
    println!("[6] Syncing balance...");
    let mut state = flows::sync_wallet(ledger, cfg, &keypair).await?;
    let (shielded, _) = state
        .balance
        .total_amounts()
        .get(&Pubkey::SYSTEM)
        .copied()
        .unwrap_or_default();
    println!(
        "    Unspent: {} SOL in {} notes",
        shielded as f64 / LAMPORTS_PER_SOL as f64,
        state.balance.unspent().count()
    );
    ensure!(shielded >= u128::from(shield_amount), "shielded note not found after sync");

    // ── Step 7: Unshield ───────────────────────────────────────────────
    let recipient = label_pubkey("e2e-recipient")?;
    println!("[7] Unshielding {} SOL to {recipient}...", sol(unshield_amount));
    let unshield = flows::unshield_params(&keypair, &mut state, unshield_amount, fee, recipient, cfg, &mut rng)?;
    let reports = flows::verify_transaction(ledger, cfg, &unshield, recipient, dry_run, &mut rng).await?;
    print_reports(&reports);
    if let Some(m) = mirror.as_mut() {
        m.apply(&unshield)?;
    }

    // ── Step 8: Final state ────────────────────────────────────────────
    println!("\n[8] Verifying final state...");
    let state = flows::sync_wallet(ledger, cfg, &keypair).await?;
    let spent: usize = state.balance.tokens.values().map(|t| t.spent_utxos.len()).sum();
    let (remaining, _) = state
        .balance
        .total_amounts()
        .get(&Pubkey::SYSTEM)
        .copied()
        .unwrap_or_default();
    ensure!(spent >= 1, "spent note not detected");
    ensure!(
        remaining == u128::from(expected_change),
        "change is {remaining}, expected {expected_change}"
    );
    println!("    Spent notes:  {spent}");
    println!("    Change:       {} SOL", remaining as f64 / LAMPORTS_PER_SOL as f64);
    println!("    Leaves:       {}", state.tree.len());

    println!("\n=== E2E Passed! ===\n");
    Ok(())
}
