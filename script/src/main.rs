//! Light pool CLI.
//!
//! Subcommands:
//!   address         - Print the shielded address derived from a seed
//!   create-account  - Create a program-owned account from a seed
//!   init-tree       - Initialize the Merkle tree storage account
//!   deposit         - Deposit into the tree and print the note
//!   inspect         - Check a note against the on-chain storage
//!   balance         - Sync and print the shielded balance of a seed
//!   shield          - Prove and verify a shield transaction
//!   unshield        - Prove and verify an unshield to a public recipient
//!
//! `--dry-run` runs everything against an in-memory ledger with a zero-proof
//! fixture, so no RPC, relayer or circuit artifacts are needed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use light_pool_lib::replay::ReplayReport;
use light_pool_lib::sync::check_deposit;
use light_pool_lib::{DepositNote, Keypair, Ledger, MemoryLedger, Pubkey, ReplayEngine, TransactionParameters};
use light_pool_script::config::{parse_amount, EnvConfig, LAMPORTS_PER_SOL};
use light_pool_script::{flows, setup_logger, RpcLedger};

#[derive(Parser)]
#[command(name = "light-pool")]
#[command(about = "Client for the light shielded pool")]
struct Cli {
    /// Use an in-memory ledger and a fixture proof
    #[arg(long, global = true)]
    dry_run: bool,
    /// Debug-level logs unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the shielded address of a seed
    Address {
        #[arg(long, env = "SHIELDED_SEED")]
        seed: String,
    },
    /// Create an account at create_with_seed(payer, seed, program)
    CreateAccount {
        #[arg(long)]
        seed: String,
        #[arg(long)]
        space: usize,
    },
    /// Initialize the Merkle tree storage account
    InitTree,
    /// Deposit `amount` and print the resulting note
    Deposit {
        #[arg(long, default_value = "SOL")]
        currency: String,
        #[arg(long)]
        amount: String,
    },
    /// Look a note up in the storage account
    Inspect {
        #[arg(long)]
        note: String,
    },
    /// Sync and print balances
    Balance {
        #[arg(long, env = "SHIELDED_SEED")]
        seed: String,
    },
    /// Shield `amount` into a note owned by the seed
    Shield {
        #[arg(long, env = "SHIELDED_SEED")]
        seed: String,
        #[arg(long)]
        amount: String,
        /// Token mint; the native asset when omitted
        #[arg(long)]
        asset: Option<String>,
    },
    /// Unshield `amount` of native funds to a public recipient
    Unshield {
        #[arg(long, env = "SHIELDED_SEED")]
        seed: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        recipient: String,
        #[arg(long, default_value = "0")]
        relayer_fee: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    if cli.dry_run {
        let cfg = EnvConfig::dry_run()?;
        let ledger = MemoryLedger::new();
        run(&cli.command, &ledger, &cfg, true).await
    } else {
        let cfg = EnvConfig::from_env()?;
        let ledger = RpcLedger::new(&cfg.rpc_url, &cfg.relayer_url);
        run(&cli.command, &ledger, &cfg, false).await
    }
}

async fn run<L: Ledger>(command: &Commands, ledger: &L, cfg: &EnvConfig, dry_run: bool) -> Result<()> {
    let mut rng = rand::thread_rng();
    let engine = ReplayEngine::new(ledger, &cfg.ctx, &cfg.constants);

    match command {
        Commands::Address { seed } => {
            let keypair = Keypair::from_seed(seed)?;
            println!("{}", keypair.address());
        }
        Commands::CreateAccount { seed, space } => {
            let (pubkey, report) = engine
                .create_account(seed, *space, &cfg.ctx.verifier_program)
                .await?;
            println!("Created {pubkey} ({space} bytes)");
            print_report(&report);
        }
        Commands::InitTree => {
            let report = engine.init_tree().await?;
            println!("Initialized merkle tree {}", cfg.ctx.merkle_tree);
            print_report(&report);
        }
        Commands::Deposit { currency, amount } => {
            let lamports = parse_amount(amount, 9)?;
            let (note, report) = flows::deposit(ledger, cfg, currency, amount, lamports, &mut rng).await?;
            print_report(&report);
            println!("\nKeep this note, it is the only way to withdraw:\n{note}");
        }
        Commands::Inspect { note } => {
            let note = DepositNote::parse(note)?;
            let snapshot = flows::load_storage(ledger, cfg).await?;
            let status = check_deposit(&note, &snapshot)?;
            println!("Root:          {}", snapshot.tree()?.root());
            println!("Leaves:        {}", snapshot.next_index);
            println!("Nullifiers:    {}", status.number_of_nullifiers);
            match status.leaf_position {
                Some(i) => println!("Deposit:       leaf {i}{}", if status.is_last_leaf { " (latest)" } else { "" }),
                None => println!("Deposit:       not found"),
            }
            println!("Spent:         {}", status.found_nullifier);
        }
        Commands::Balance { seed } => {
            let keypair = Keypair::from_seed(seed)?;
            let state = flows::sync_wallet(ledger, cfg, &keypair).await?;
            println!("Scanned {} accounts, {} leaves", state.accounts_scanned, state.tree.len());
            for (asset, (sol, spl)) in state.balance.total_amounts() {
                let spent = state.balance.tokens[&asset].spent_utxos.len();
                println!("{asset}: {sol} lamports, {spl} token units ({spent} spent notes)");
            }
        }
        Commands::Shield { seed, amount, asset } => {
            let keypair = Keypair::from_seed(seed)?;
            let asset: Pubkey = match asset {
                Some(a) => a.parse().context("asset is not a base58 pubkey")?,
                None => Pubkey::SYSTEM,
            };
            let amount = parse_amount(amount, 9)?;
            let mut state = flows::sync_wallet(ledger, cfg, &keypair).await?;
            let params = flows::shield_params(&keypair, &mut state, amount, asset, cfg, &mut rng)?;
            // Shielded funds stay with the pool account.
            verify(ledger, cfg, &params, cfg.ctx.merkle_tree, dry_run).await?;
        }
        Commands::Unshield {
            seed,
            amount,
            recipient,
            relayer_fee,
        } => {
            let keypair = Keypair::from_seed(seed)?;
            let recipient: Pubkey = recipient.parse().context("recipient is not a base58 pubkey")?;
            let amount = parse_amount(amount, 9)?;
            let fee = parse_amount(relayer_fee, 9)?;
            let mut state = flows::sync_wallet(ledger, cfg, &keypair).await?;
            let params = flows::unshield_params(&keypair, &mut state, amount, fee, recipient, cfg, &mut rng)?;
            verify(ledger, cfg, &params, recipient, dry_run).await?;
            println!(
                "Unshielded {} SOL to {recipient}",
                amount as f64 / LAMPORTS_PER_SOL as f64
            );
        }
    }
    Ok(())
}

async fn verify<L: Ledger>(
    ledger: &L,
    cfg: &EnvConfig,
    params: &TransactionParameters,
    recipient: Pubkey,
    dry_run: bool,
) -> Result<()> {
    let mut rng = rand::thread_rng();
    let reports = flows::verify_transaction(ledger, cfg, params, recipient, dry_run, &mut rng).await?;
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    println!(
        "[{}] {} transactions, {} instructions",
        report.tape,
        report.signatures.len(),
        report.instructions
    );
    if let Some(last) = report.signatures.last() {
        println!("    last signature: {last}");
    }
}
