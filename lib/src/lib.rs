//! Client core of a shielded pool: notes, the off-chain Merkle mirror,
//! transaction parameters, and the replay of fixed opcode tapes that drive
//! on-chain Groth16 verification.

// =============================================================================
//                               PRIMITIVES
// =============================================================================

pub mod error;
pub mod field;
pub mod poseidon;

// =============================================================================
//                               POOL STATE
// =============================================================================

pub mod config;
pub mod keypair;
pub mod merkle_tree;
pub mod note;
pub mod utxo;

// =============================================================================
//                         TRANSACTIONS AND LEDGER
// =============================================================================

pub mod instruction;
pub mod ledger;
pub mod params;
pub mod prover;
pub mod replay;
pub mod sync;
pub mod tapes;

pub use config::{BatchLimits, ProtocolConstants, RetryPolicy};
pub use error::{PoolError, Result};
pub use field::FieldElement;
pub use keypair::Keypair;
pub use ledger::{CommitmentLevel, Ledger, LedgerContext, MemoryLedger, Pubkey, Signature};
pub use merkle_tree::{MerklePath, MerkleTree};
pub use note::DepositNote;
pub use params::{Action, ProofInput, TransactionParameters, TransactionRequest};
pub use prover::{FixedProver, ProofBytes, ProofOutput, Prover};
pub use replay::{ReplayEngine, ReplayReport, Schedule};
pub use sync::{Balance, DepositStatus, StorageSnapshot};
pub use utxo::Utxo;
