use core::fmt;
use core::future::Future;
use core::str::FromStr;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::{PoolError, Result};

/// Longest seed accepted by `Pubkey::create_with_seed`.
pub const MAX_SEED_LEN: usize = 32;

// =============================================================================
//                              PUBLIC KEYS
// =============================================================================

/// A 32-byte ledger address, shown as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    /// The system program, which also stands for the native asset.
    pub const SYSTEM: Pubkey = Pubkey([0u8; 32]);

    pub fn new_rand<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Pubkey(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// address = sha256(base || seed || owner)
    pub fn create_with_seed(base: &Pubkey, seed: &str, owner: &Pubkey) -> Result<Pubkey> {
        if seed.len() > MAX_SEED_LEN {
            return Err(PoolError::InvalidLength {
                expected: MAX_SEED_LEN,
                got: seed.len(),
            });
        }
        let mut hasher = Sha256::new();
        hasher.update(base.0);
        hasher.update(seed.as_bytes());
        hasher.update(owner.0);
        Ok(Pubkey(hasher.finalize().into()))
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

impl FromStr for Pubkey {
    type Err = PoolError;
    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| PoolError::Config(format!("invalid base58 pubkey {s}: {e}")))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PoolError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Ok(Pubkey(arr))
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Transaction signature as returned by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
//                        INSTRUCTIONS AND CONTEXT
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn signer(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: true,
            is_writable: false,
        }
    }

    pub fn writable(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }

    pub fn writable_signer(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: true,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }
}

/// One instruction as the ledger sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

/// Programs and accounts one pool deployment is made of.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerContext {
    pub payer: Pubkey,
    pub verifier_program: Pubkey,
    pub prepare_inputs_program: Pubkey,
    pub merkle_tree: Pubkey,
    #[serde(default)]
    pub commitment: CommitmentLevel,
}

/// Scratch accounts a single flow touches. Which ones are required depends
/// on the instruction being resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowAccounts {
    pub payer: Pubkey,
    pub merkle_tree: Option<Pubkey>,
    pub hash_tmp: Option<Pubkey>,
    pub deposit_tmp: Option<Pubkey>,
    pub prepare_inputs: Option<Pubkey>,
    pub miller_loop: Option<Pubkey>,
    pub final_exp: Option<Pubkey>,
    pub withdraw_from: Option<Pubkey>,
    pub withdraw_to: Option<Pubkey>,
}

impl FlowAccounts {
    pub fn new(ctx: &LedgerContext) -> Self {
        FlowAccounts {
            payer: ctx.payer,
            merkle_tree: Some(ctx.merkle_tree),
            ..Default::default()
        }
    }
}

// =============================================================================
//                            LEDGER TRANSPORT
// =============================================================================

/// Everything the pool needs from the ledger.
///
/// `submit` sends one transaction holding `instructions` and waits for it to
/// reach `commitment`. Implementations do not retry; the replay engine owns
/// the retry policy.
pub trait Ledger: Sync {
    fn submit(
        &self,
        instructions: &[LedgerInstruction],
        signers: &[Pubkey],
        commitment: CommitmentLevel,
    ) -> impl Future<Output = Result<Signature>> + Send;

    fn get_account(&self, pubkey: &Pubkey) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    fn minimum_rent(&self, size: usize) -> impl Future<Output = Result<u64>> + Send;

    fn accounts_by_size(
        &self,
        program: &Pubkey,
        size: usize,
    ) -> impl Future<Output = Result<Vec<(Pubkey, Vec<u8>)>>> + Send;
}

/// A transaction the in-memory ledger accepted.
#[derive(Clone, Debug)]
pub struct RecordedSubmission {
    pub signature: Signature,
    pub instructions: Vec<LedgerInstruction>,
    pub signers: Vec<Pubkey>,
    pub commitment: CommitmentLevel,
}

#[derive(Clone, Debug)]
struct StoredAccount {
    owner: Pubkey,
    data: Vec<u8>,
}

#[derive(Default)]
struct MemoryState {
    accounts: BTreeMap<Pubkey, StoredAccount>,
    submissions: Vec<RecordedSubmission>,
    failures_left: u32,
    counter: u64,
}

/// In-process ledger for dry runs and tests.
///
/// Accepts every transaction (after `fail_next` injected failures), records
/// it, and applies system-program account creation so that created accounts
/// become visible to `get_account`.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

/// Lamports per byte for two years of rent, including the 128-byte header.
const RENT_LAMPORTS_PER_BYTE: u64 = 6_960;
const ACCOUNT_HEADER: u64 = 128;

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_account(&self, pubkey: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.lock()
            .accounts
            .insert(pubkey, StoredAccount { owner, data });
    }

    pub fn remove_account(&self, pubkey: &Pubkey) {
        self.lock().accounts.remove(pubkey);
    }

    /// The next `n` submissions fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.lock().failures_left = n;
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }

    fn apply_system(state: &mut MemoryState, ix: &LedgerInstruction) {
        if ix.program_id != Pubkey::SYSTEM || ix.data.len() < 4 {
            return;
        }
        let tag = u32::from_le_bytes([ix.data[0], ix.data[1], ix.data[2], ix.data[3]]);
        // CreateAccountWithSeed: [3u32][base 32][seed len u64][seed][lamports u64][space u64][owner 32]
        if tag != 3 || ix.accounts.len() < 2 {
            return;
        }
        let body = &ix.data[4..];
        if body.len() < 40 {
            return;
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&body[32..40]);
        let seed_len = u64::from_le_bytes(len_bytes) as usize;
        let rest = &body[40..];
        match seed_len.checked_add(48) {
            Some(needed) if rest.len() >= needed => {}
            _ => return,
        }
        let rest = &rest[seed_len..];
        let mut space_bytes = [0u8; 8];
        space_bytes.copy_from_slice(&rest[8..16]);
        let space = u64::from_le_bytes(space_bytes) as usize;
        let mut owner = [0u8; 32];
        owner.copy_from_slice(&rest[16..48]);
        let new_account = ix.accounts[1].pubkey;
        state.accounts.entry(new_account).or_insert(StoredAccount {
            owner: Pubkey(owner),
            data: vec![0u8; space],
        });
    }
}

impl Ledger for MemoryLedger {
    async fn submit(
        &self,
        instructions: &[LedgerInstruction],
        signers: &[Pubkey],
        commitment: CommitmentLevel,
    ) -> Result<Signature> {
        let mut state = self.lock();
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(PoolError::Submission("injected failure".into()));
        }
        state.counter += 1;
        let digest = Sha256::digest(state.counter.to_le_bytes());
        let signature = Signature(bs58::encode(digest).into_string());
        for ix in instructions {
            Self::apply_system(&mut state, ix);
        }
        debug!(%signature, instructions = instructions.len(), "memory ledger accepted transaction");
        state.submissions.push(RecordedSubmission {
            signature: signature.clone(),
            instructions: instructions.to_vec(),
            signers: signers.to_vec(),
            commitment,
        });
        Ok(signature)
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().accounts.get(pubkey).map(|a| a.data.clone()))
    }

    async fn minimum_rent(&self, size: usize) -> Result<u64> {
        Ok((size as u64 + ACCOUNT_HEADER) * RENT_LAMPORTS_PER_BYTE)
    }

    async fn accounts_by_size(&self, program: &Pubkey, size: usize) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .filter(|(_, a)| a.owner == *program && a.data.len() == size)
            .map(|(k, a)| (*k, a.data.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_base58_round_trip() {
        assert_eq!(Pubkey::SYSTEM.to_string(), "11111111111111111111111111111111");
        let pk = Pubkey([7u8; 32]);
        let parsed: Pubkey = pk.to_string().parse().unwrap();
        assert_eq!(parsed, pk);
        assert!(matches!(
            "3yZe7d".parse::<Pubkey>(),
            Err(PoolError::InvalidLength { expected: 32, .. })
        ));
    }

    #[test]
    fn test_create_with_seed() {
        let base = Pubkey([1u8; 32]);
        let owner = Pubkey([2u8; 32]);
        let a = Pubkey::create_with_seed(&base, "seed", &owner).unwrap();
        let b = Pubkey::create_with_seed(&base, "seed", &owner).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Pubkey::create_with_seed(&base, "other", &owner).unwrap());
        let long = "x".repeat(MAX_SEED_LEN + 1);
        assert!(Pubkey::create_with_seed(&base, &long, &owner).is_err());
    }

    #[test]
    fn test_pubkey_serde_as_string() {
        let json = serde_json::to_string(&Pubkey::SYSTEM).unwrap();
        assert_eq!(json, "\"11111111111111111111111111111111\"");
    }

    #[tokio::test]
    async fn test_memory_ledger_failure_injection() {
        let ledger = MemoryLedger::new();
        ledger.fail_next(1);
        let payer = Pubkey([9u8; 32]);
        let err = ledger.submit(&[], &[payer], CommitmentLevel::Confirmed).await;
        assert!(err.unwrap_err().is_transient());
        let sig = ledger.submit(&[], &[payer], CommitmentLevel::Confirmed).await.unwrap();
        assert_eq!(ledger.submissions()[0].signature, sig);
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_create_account_ignores_oversized_seed_length() {
        let ledger = MemoryLedger::new();
        let payer = Pubkey([9u8; 32]);
        let target = Pubkey([8u8; 32]);
        let mut data = 3u32.to_le_bytes().to_vec();
        data.extend_from_slice(&payer.0);
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; 48]);
        let ix = LedgerInstruction {
            program_id: Pubkey::SYSTEM,
            accounts: vec![AccountMeta::signer(payer), AccountMeta::writable(target)],
            data,
        };
        ledger.submit(&[ix], &[payer], CommitmentLevel::Confirmed).await.unwrap();
        assert!(ledger.get_account(&target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accounts_by_size_filters_owner() {
        let ledger = MemoryLedger::new();
        let program = Pubkey([3u8; 32]);
        ledger.set_account(Pubkey([4u8; 32]), program, vec![0u8; 10]);
        ledger.set_account(Pubkey([5u8; 32]), Pubkey::SYSTEM, vec![0u8; 10]);
        ledger.set_account(Pubkey([6u8; 32]), program, vec![0u8; 11]);
        let found = ledger.accounts_by_size(&program, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, Pubkey([4u8; 32]));
        assert!(ledger.get_account(&Pubkey([6u8; 32])).await.unwrap().is_some());
        assert_eq!(ledger.minimum_rent(0).await.unwrap(), 128 * 6_960);
    }
}
