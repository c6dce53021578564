//! Rebuilding local state from ledger accounts.
//!
//! Two storage shapes are read here: the single legacy storage account that
//! holds the whole tree and the nullifier list, and the per-transaction
//! leaf-pair accounts that carry two commitments plus their encrypted notes.
//! Scanning is linear over every pool account; it is an off-chain indexing
//! convenience and nothing on a hot path depends on it.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::ProtocolConstants;
use crate::error::{PoolError, Result};
use crate::field::FieldElement;
use crate::keypair::Keypair;
use crate::ledger::{Ledger, LedgerContext, Pubkey};
use crate::merkle_tree::MerkleTree;
use crate::note::DepositNote;
use crate::params::OUTPUT_SLOT_LEN;
use crate::utxo::{Utxo, ENCRYPTED_UTXO_LEN};

// =============================================================================
//                          LEGACY STORAGE ACCOUNT
// =============================================================================

pub const STORAGE_HEIGHT_OFFSET: usize = 1;
pub const STORAGE_NEXT_INDEX_OFFSET: usize = 721;
pub const STORAGE_LEAVES_OFFSET: usize = 3937;
pub const STORAGE_NULLIFIERS_OFFSET: usize = 69481;

/// Parsed view of the legacy Merkle storage account. Leaves and nullifiers
/// keep their on-chain 32-byte little-endian encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageSnapshot {
    pub height: u64,
    pub next_index: u64,
    pub leaves: Vec<[u8; 32]>,
    pub nullifiers: Vec<[u8; 32]>,
}

pub fn parse_storage_account(data: &[u8], levels: usize) -> Result<StorageSnapshot> {
    let height = read_u64(data, STORAGE_HEIGHT_OFFSET)
        .ok_or_else(|| PoolError::InvalidStorageAccount(format!("{} bytes is too short", data.len())))?;
    if height != levels as u64 {
        return Err(PoolError::InvalidStorageAccount(format!(
            "tree height {height} does not match configured {levels}"
        )));
    }
    let next_index = read_u64(data, STORAGE_NEXT_INDEX_OFFSET)
        .ok_or_else(|| PoolError::InvalidStorageAccount("missing next index".into()))?;

    let leaves_end = usize::try_from(next_index)
        .ok()
        .and_then(|n| n.checked_mul(32))
        .and_then(|n| n.checked_add(STORAGE_LEAVES_OFFSET))
        .filter(|&end| end <= data.len().min(STORAGE_NULLIFIERS_OFFSET))
        .ok_or_else(|| PoolError::InvalidStorageAccount(format!("next index {next_index} overruns the leaves")))?;
    let leaves = chunks32(&data[STORAGE_LEAVES_OFFSET..leaves_end]).collect();

    // Nullifiers run until the first all-zero chunk.
    let nullifiers = data
        .get(STORAGE_NULLIFIERS_OFFSET..)
        .map(|tail| chunks32(tail).take_while(|c| c.iter().any(|b| *b != 0)).collect())
        .unwrap_or_default();

    Ok(StorageSnapshot {
        height,
        next_index,
        leaves,
        nullifiers,
    })
}

impl StorageSnapshot {
    /// Shortest account image `parse_storage_account` accepts for this
    /// snapshot, nullifier list zero-terminated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; STORAGE_NULLIFIERS_OFFSET + 32 * (self.nullifiers.len() + 1)];
        data[STORAGE_HEIGHT_OFFSET..STORAGE_HEIGHT_OFFSET + 8].copy_from_slice(&self.height.to_le_bytes());
        data[STORAGE_NEXT_INDEX_OFFSET..STORAGE_NEXT_INDEX_OFFSET + 8]
            .copy_from_slice(&(self.leaves.len() as u64).to_le_bytes());
        for (i, leaf) in self.leaves.iter().enumerate() {
            let at = STORAGE_LEAVES_OFFSET + 32 * i;
            data[at..at + 32].copy_from_slice(leaf);
        }
        for (i, nullifier) in self.nullifiers.iter().enumerate() {
            let at = STORAGE_NULLIFIERS_OFFSET + 32 * i;
            data[at..at + 32].copy_from_slice(nullifier);
        }
        data
    }

    pub fn tree(&self) -> Result<MerkleTree> {
        let leaves: Vec<FieldElement> = self
            .leaves
            .iter()
            .map(|l| FieldElement::from_le_bytes_mod_order(l))
            .collect();
        MerkleTree::with_elements(self.height as usize, &leaves)
    }
}

/// Where a deposit note stands against a storage snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepositStatus {
    pub found_leaf: bool,
    pub leaf_position: Option<usize>,
    pub found_nullifier: bool,
    pub is_last_leaf: bool,
    pub number_of_nullifiers: usize,
}

pub fn check_deposit(note: &DepositNote, snapshot: &StorageSnapshot) -> Result<DepositStatus> {
    let commitment = note.commitment()?.to_le_bytes();
    let nullifier = note.nullifier_hash()?.to_le_bytes();
    let leaf_position = snapshot.leaves.iter().position(|l| *l == commitment);
    let status = DepositStatus {
        found_leaf: leaf_position.is_some(),
        leaf_position,
        found_nullifier: snapshot.nullifiers.contains(&nullifier),
        is_last_leaf: snapshot.leaves.last() == Some(&commitment),
        number_of_nullifiers: snapshot.nullifiers.len(),
    };
    debug!(?status, "checked deposit");
    Ok(status)
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    let bytes: [u8; 8] = data.get(at..at + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

fn chunks32(bytes: &[u8]) -> impl Iterator<Item = [u8; 32]> + '_ {
    bytes.chunks_exact(32).filter_map(|c| c.try_into().ok())
}

// =============================================================================
//                          LEAF-PAIR ACCOUNTS
// =============================================================================

pub const LEAVES_ACCOUNT_SIZE: usize = 368;
pub const LEAVES_ENCRYPTED_LEN: usize = 256;

/// `sha256("account:TwoLeavesBytesPda")[..8]`
pub fn leaves_discriminator() -> [u8; 8] {
    let digest = Sha256::digest(b"account:TwoLeavesBytesPda");
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Two consecutive leaves and the encrypted notes behind them.
///
///   discriminator (8) | left index u64 | merkle tree (32)
///   | left (32) | right (32) | encrypted outputs (256)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeavesAccount {
    pub left_index: u64,
    pub merkle_tree: Pubkey,
    pub left: FieldElement,
    pub right: FieldElement,
    pub encrypted_outputs: Vec<u8>,
}

impl LeavesAccount {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != LEAVES_ACCOUNT_SIZE {
            return Err(PoolError::InvalidLength {
                expected: LEAVES_ACCOUNT_SIZE,
                got: data.len(),
            });
        }
        if data[..8] != leaves_discriminator() {
            return Err(PoolError::InvalidStorageAccount("not a leaf-pair account".into()));
        }
        let word = |at: usize| -> [u8; 32] {
            let mut w = [0u8; 32];
            w.copy_from_slice(&data[at..at + 32]);
            w
        };
        Ok(LeavesAccount {
            left_index: read_u64(data, 8).unwrap_or_default(),
            merkle_tree: Pubkey(word(16)),
            left: FieldElement::from_le_bytes_mod_order(&word(48)),
            right: FieldElement::from_le_bytes_mod_order(&word(80)),
            encrypted_outputs: data[112..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LEAVES_ACCOUNT_SIZE);
        out.extend_from_slice(&leaves_discriminator());
        out.extend_from_slice(&self.left_index.to_le_bytes());
        out.extend_from_slice(&self.merkle_tree.0);
        out.extend_from_slice(&self.left.to_le_bytes());
        out.extend_from_slice(&self.right.to_le_bytes());
        out.extend_from_slice(&self.encrypted_outputs);
        out.resize(LEAVES_ACCOUNT_SIZE, 0);
        out
    }

    /// Encrypted note for `which` (0 = left, 1 = right). The right note sits
    /// after the left one in the packed layout, or in the second slot.
    fn decrypt(&self, which: usize, keypair: &Keypair, constants: &ProtocolConstants) -> Option<Utxo> {
        let (commitment, index, offsets): (_, _, &[usize]) = match which {
            0 => (self.left, self.left_index, &[0]),
            _ => (self.right, self.left_index + 1, &[ENCRYPTED_UTXO_LEN, OUTPUT_SLOT_LEN]),
        };
        offsets
            .iter()
            .filter_map(|&offset| self.encrypted_outputs.get(offset..))
            .find_map(|enc| Utxo::decrypt(enc, keypair, &commitment, index, constants))
    }
}

/// Address whose existence marks `nullifier` as spent.
pub fn nullifier_marker(ctx: &LedgerContext, nullifier: &FieldElement) -> Result<Pubkey> {
    let seed = hex::encode(nullifier.to_be_bytes());
    Pubkey::create_with_seed(&ctx.merkle_tree, &seed[..32], &ctx.verifier_program)
}

// =============================================================================
//                               BALANCE
// =============================================================================

/// Notes of one asset, keyed by commitment.
#[derive(Clone, Debug, Default)]
pub struct TokenUtxoBalance {
    pub utxos: BTreeMap<FieldElement, Utxo>,
    pub spent_utxos: BTreeMap<FieldElement, Utxo>,
    /// Created by a submitted transaction but not yet seen in the tree.
    pub committed_utxos: BTreeMap<FieldElement, Utxo>,
}

impl TokenUtxoBalance {
    /// (native, token) sums over unspent notes.
    pub fn totals(&self) -> (u128, u128) {
        self.utxos.values().fold((0, 0), |(sol, spl), u| {
            let [a, b] = u.amounts();
            (sol + u128::from(a), spl + u128::from(b))
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Balance {
    pub tokens: BTreeMap<Pubkey, TokenUtxoBalance>,
    pub transaction_nonce: u64,
}

impl Balance {
    /// Notes are filed under their token asset, or the native asset when
    /// they carry none. Returns false for a note already known.
    pub fn add_utxo(&mut self, utxo: Utxo) -> Result<bool> {
        let commitment = utxo.commitment()?;
        let token = self.tokens.entry(asset_of(&utxo)).or_default();
        if token.utxos.contains_key(&commitment) || token.spent_utxos.contains_key(&commitment) {
            return Ok(false);
        }
        token.committed_utxos.remove(&commitment);
        token.utxos.insert(commitment, utxo);
        Ok(true)
    }

    pub fn add_spent_utxo(&mut self, utxo: Utxo) -> Result<()> {
        let commitment = utxo.commitment()?;
        let token = self.tokens.entry(asset_of(&utxo)).or_default();
        token.utxos.remove(&commitment);
        token.spent_utxos.insert(commitment, utxo);
        Ok(())
    }

    pub fn add_committed_utxo(&mut self, utxo: Utxo) -> Result<()> {
        let commitment = utxo.commitment()?;
        self.tokens
            .entry(asset_of(&utxo))
            .or_default()
            .committed_utxos
            .insert(commitment, utxo);
        Ok(())
    }

    /// Moves a note from unspent to spent. False when it was not unspent.
    pub fn move_to_spent(&mut self, asset: &Pubkey, commitment: &FieldElement) -> bool {
        let Some(token) = self.tokens.get_mut(asset) else {
            return false;
        };
        match token.utxos.remove(commitment) {
            Some(utxo) => {
                token.spent_utxos.insert(*commitment, utxo);
                true
            }
            None => false,
        }
    }

    pub fn total_amounts(&self) -> BTreeMap<Pubkey, (u128, u128)> {
        self.tokens.iter().map(|(k, t)| (*k, t.totals())).collect()
    }

    pub fn unspent(&self) -> impl Iterator<Item = &Utxo> {
        self.tokens.values().flat_map(|t| t.utxos.values())
    }

    /// Greedy largest-first pick of at most `max` unspent notes of `asset`
    /// covering `amount`.
    pub fn select_inputs(&self, asset: &Pubkey, amount: u64, max: usize) -> Result<Vec<Utxo>> {
        if amount == 0 {
            return Ok(Vec::new());
        }
        let slot = usize::from(*asset != Pubkey::SYSTEM);
        let mut candidates: Vec<&Utxo> = self
            .tokens
            .values()
            .flat_map(|t| t.utxos.values())
            .filter(|u| u.assets()[slot] == *asset && u.amounts()[slot] > 0)
            .collect();
        candidates.sort_by(|a, b| b.amounts()[slot].cmp(&a.amounts()[slot]));

        let mut picked = Vec::new();
        let mut covered = 0u128;
        for utxo in candidates.into_iter().take(max) {
            covered += u128::from(utxo.amounts()[slot]);
            picked.push(utxo.clone());
            if covered >= u128::from(amount) {
                return Ok(picked);
            }
        }
        Err(PoolError::InvalidAmount(format!(
            "insufficient funds: {covered} available in {} notes, {amount} needed",
            picked.len()
        )))
    }

    pub fn bump_nonce(&mut self) -> u64 {
        self.transaction_nonce += 1;
        self.transaction_nonce
    }
}

fn asset_of(utxo: &Utxo) -> Pubkey {
    utxo.assets()[1]
}

// =============================================================================
//                                 SYNC
// =============================================================================

/// Local mirror of the pool as seen by one keypair.
#[derive(Clone, Debug)]
pub struct SyncState {
    pub tree: MerkleTree,
    pub balance: Balance,
    pub accounts_scanned: usize,
}

/// Lists every leaf-pair account of `ctx.merkle_tree`, rebuilds the tree,
/// and classifies the notes `keypair` can open.
pub async fn sync_balance<L: Ledger>(
    ledger: &L,
    ctx: &LedgerContext,
    keypair: &Keypair,
    constants: &ProtocolConstants,
) -> Result<SyncState> {
    let raw = ledger
        .accounts_by_size(&ctx.verifier_program, LEAVES_ACCOUNT_SIZE)
        .await?;
    let mut accounts: Vec<LeavesAccount> = raw
        .iter()
        .filter_map(|(pubkey, data)| match LeavesAccount::parse(data) {
            Ok(account) => Some(account),
            Err(err) => {
                warn!(%pubkey, %err, "skipping account");
                None
            }
        })
        .filter(|a| a.merkle_tree == ctx.merkle_tree)
        .collect();
    accounts.sort_by_key(|a| a.left_index);

    let mut leaves = Vec::with_capacity(accounts.len() * 2);
    for account in &accounts {
        if account.left_index != leaves.len() as u64 {
            return Err(PoolError::InvalidStorageAccount(format!(
                "leaf accounts skip from {} to {}",
                leaves.len(),
                account.left_index
            )));
        }
        leaves.push(account.left);
        leaves.push(account.right);
    }
    let tree = MerkleTree::with_elements(constants.merkle_tree_levels, &leaves)?;

    let mut balance = Balance::default();
    for account in &accounts {
        for which in 0..2 {
            let Some(utxo) = account.decrypt(which, keypair, constants) else {
                continue;
            };
            if utxo.amounts().iter().all(|a| *a == 0) {
                continue;
            }
            let marker = nullifier_marker(ctx, &utxo.nullifier()?)?;
            if ledger.get_account(&marker).await?.is_some() {
                balance.add_spent_utxo(utxo)?;
            } else {
                balance.add_utxo(utxo)?;
            }
        }
    }
    info!(
        accounts = accounts.len(),
        leaves = tree.len(),
        unspent = balance.unspent().count(),
        "synced"
    );
    Ok(SyncState {
        tree,
        balance,
        accounts_scanned: raw.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "seed phrase used only by the sync unit tests";

    fn ctx() -> LedgerContext {
        LedgerContext {
            payer: Pubkey([1; 32]),
            verifier_program: Pubkey([2; 32]),
            prepare_inputs_program: Pubkey([3; 32]),
            merkle_tree: Pubkey([4; 32]),
            commitment: Default::default(),
        }
    }

    fn storage(levels: u64, leaves: &[[u8; 32]], nullifiers: &[[u8; 32]]) -> Vec<u8> {
        let mut data = vec![0u8; STORAGE_NULLIFIERS_OFFSET + 32 * (nullifiers.len() + 1)];
        data[1..9].copy_from_slice(&levels.to_le_bytes());
        data[721..729].copy_from_slice(&(leaves.len() as u64).to_le_bytes());
        for (i, leaf) in leaves.iter().enumerate() {
            let at = STORAGE_LEAVES_OFFSET + 32 * i;
            data[at..at + 32].copy_from_slice(leaf);
        }
        for (i, n) in nullifiers.iter().enumerate() {
            let at = STORAGE_NULLIFIERS_OFFSET + 32 * i;
            data[at..at + 32].copy_from_slice(n);
        }
        data
    }

    #[test]
    fn test_parse_storage_account() {
        let data = storage(11, &[[1; 32], [2; 32]], &[[3; 32]]);
        let snapshot = parse_storage_account(&data, 11).unwrap();
        assert_eq!(snapshot.next_index, 2);
        assert_eq!(snapshot.leaves, vec![[1; 32], [2; 32]]);
        assert_eq!(snapshot.nullifiers, vec![[3; 32]]);
        assert_eq!(snapshot.tree().unwrap().len(), 2);
        assert_eq!(snapshot.to_bytes(), data);

        assert!(matches!(
            parse_storage_account(&data, 18),
            Err(PoolError::InvalidStorageAccount(_))
        ));
        assert!(matches!(
            parse_storage_account(&data[..100], 11),
            Err(PoolError::InvalidStorageAccount(_))
        ));
    }

    #[test]
    fn test_check_deposit() {
        let note = DepositNote::generate("SOL", "1", &mut StdRng::seed_from_u64(1)).unwrap();
        let commitment = note.commitment().unwrap().to_le_bytes();
        let nullifier = note.nullifier_hash().unwrap().to_le_bytes();

        let fresh = parse_storage_account(&storage(11, &[[9; 32], commitment], &[]), 11).unwrap();
        let status = check_deposit(&note, &fresh).unwrap();
        assert_eq!(status.leaf_position, Some(1));
        assert!(status.found_leaf && status.is_last_leaf);
        assert!(!status.found_nullifier);
        assert_eq!(status.number_of_nullifiers, 0);

        let spent =
            parse_storage_account(&storage(11, &[commitment, [9; 32]], &[[5; 32], nullifier]), 11).unwrap();
        let status = check_deposit(&note, &spent).unwrap();
        assert!(!status.is_last_leaf);
        assert!(status.found_nullifier);
        assert_eq!(status.number_of_nullifiers, 2);
    }

    #[test]
    fn test_leaves_account_layout() {
        let account = LeavesAccount {
            left_index: 4,
            merkle_tree: Pubkey([4; 32]),
            left: FieldElement::from_u64(1),
            right: FieldElement::from_u64(2),
            encrypted_outputs: vec![7; LEAVES_ENCRYPTED_LEN],
        };
        let bytes = account.to_bytes();
        assert_eq!(bytes.len(), LEAVES_ACCOUNT_SIZE);
        assert_eq!(bytes[8], 4);
        assert_eq!(bytes[48], 1);
        assert_eq!(LeavesAccount::parse(&bytes).unwrap(), account);

        let mut foreign = bytes.clone();
        foreign[0] ^= 1;
        assert!(LeavesAccount::parse(&foreign).is_err());
        assert!(LeavesAccount::parse(&bytes[..300]).is_err());
    }

    #[test]
    fn test_select_inputs_largest_first() {
        let kp = Keypair::from_seed(SEED).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let mut balance = Balance::default();
        for amount in [3u64, 10, 5] {
            let utxo = Utxo::new(kp.clone(), &[Pubkey::SYSTEM], &[amount], &mut rng).unwrap();
            assert!(balance.add_utxo(utxo.clone()).unwrap());
            assert!(!balance.add_utxo(utxo).unwrap());
        }
        let picked = balance.select_inputs(&Pubkey::SYSTEM, 12, 2).unwrap();
        let amounts: Vec<u64> = picked.iter().map(|u| u.amounts()[0]).collect();
        assert_eq!(amounts, vec![10, 5]);
        assert!(balance.select_inputs(&Pubkey::SYSTEM, 16, 2).is_err());
        assert!(balance.select_inputs(&Pubkey::SYSTEM, 0, 2).unwrap().is_empty());
        assert_eq!(balance.total_amounts()[&Pubkey::SYSTEM], (18, 0));

        let top = picked[0].commitment().unwrap();
        assert!(balance.move_to_spent(&Pubkey::SYSTEM, &top));
        assert!(!balance.move_to_spent(&Pubkey::SYSTEM, &top));
        assert_eq!(balance.total_amounts()[&Pubkey::SYSTEM], (8, 0));
    }

    #[tokio::test]
    async fn test_sync_classifies_spent_notes() {
        let ctx = ctx();
        let constants = ProtocolConstants::default();
        let kp = Keypair::from_seed(SEED).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let first = Utxo::new(kp.clone(), &[Pubkey::SYSTEM], &[7], &mut rng).unwrap();
        let second = Utxo::new(kp.clone(), &[Pubkey::SYSTEM], &[9], &mut rng).unwrap();

        let mut encrypted = first.encrypt(&constants, &mut rng).unwrap();
        encrypted.extend(second.encrypt(&constants, &mut rng).unwrap());
        encrypted.resize(LEAVES_ENCRYPTED_LEN, 0);
        let account = LeavesAccount {
            left_index: 0,
            merkle_tree: ctx.merkle_tree,
            left: first.commitment().unwrap(),
            right: second.commitment().unwrap(),
            encrypted_outputs: encrypted,
        };

        let ledger = MemoryLedger::new();
        ledger.set_account(Pubkey([8; 32]), ctx.verifier_program, account.to_bytes());
        // A different tree's account is ignored.
        let mut other = account.clone();
        other.merkle_tree = Pubkey([5; 32]);
        ledger.set_account(Pubkey([9; 32]), ctx.verifier_program, other.to_bytes());

        let spent_nullifier = second.clone().with_index(1).nullifier().unwrap();
        ledger.set_account(nullifier_marker(&ctx, &spent_nullifier).unwrap(), ctx.verifier_program, vec![1]);

        let state = sync_balance(&ledger, &ctx, &kp, &constants).await.unwrap();
        assert_eq!(state.accounts_scanned, 2);
        assert_eq!(state.tree.len(), 2);
        assert_eq!(state.tree.index_of(&second.commitment().unwrap()), Some(1));
        let native = &state.balance.tokens[&Pubkey::SYSTEM];
        assert_eq!(native.totals(), (7, 0));
        assert_eq!(native.spent_utxos.len(), 1);

        let stranger = Keypair::from_seed("a stranger's seed phrase with enough length").unwrap();
        let state = sync_balance(&ledger, &ctx, &stranger, &constants).await.unwrap();
        assert_eq!(state.balance.unspent().count(), 0);
    }
}
