use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ProtocolConstants;
use crate::error::{PoolError, Result};
use crate::field::{hash_and_truncate_to_circuit, keccak_to_field, FieldElement};
use crate::keypair::Keypair;
use crate::ledger::Pubkey;
use crate::merkle_tree::{MerklePath, MerkleTree};
use crate::utxo::{Utxo, N_ASSETS, N_ASSET_PUBKEYS, TRANSACTION_VERSION};

/// Upper bound on the encrypted outputs bound by the integrity hash.
pub const MAX_ENCRYPTED_OUTPUTS_LEN: usize = 512;
/// Two short outputs are packed into this many bytes.
pub const PACKED_OUTPUTS_LEN: usize = 256;
/// Per-output slot once outputs no longer fit the packed form.
pub const OUTPUT_SLOT_LEN: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Shield,
    Unshield,
    Transfer,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Shield => "shield",
            Action::Unshield => "unshield",
            Action::Transfer => "transfer",
        }
    }
}

/// Fee-paying party of an unshield or transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Relayer {
    pub pubkey: Pubkey,
    pub fee: u64,
}

// =============================================================================
//                              REQUEST
// =============================================================================

/// What the caller wants to happen; `TransactionParameters::build` turns it
/// into circuit-ready parameters.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    pub action: Action,
    /// Signer of the transaction. Pays and relays its own shield.
    pub sender: Pubkey,
    pub merkle_tree: Pubkey,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Utxo>,
    pub relayer: Option<Relayer>,
    pub recipient_spl: Option<Pubkey>,
    pub recipient_sol: Option<Pubkey>,
    pub message: Option<Vec<u8>>,
    /// Pins the asset list instead of collecting it from the UTXOs.
    pub asset_pubkeys: Option<Vec<Pubkey>>,
    /// Wallet counter of assembled transactions, see `Balance::bump_nonce`.
    pub transaction_nonce: u64,
}

impl TransactionRequest {
    pub fn new(action: Action, sender: Pubkey, merkle_tree: Pubkey) -> Self {
        TransactionRequest {
            action,
            sender,
            merkle_tree,
            inputs: Vec::new(),
            outputs: Vec::new(),
            relayer: None,
            recipient_spl: None,
            recipient_sol: None,
            message: None,
            asset_pubkeys: None,
            transaction_nonce: 0,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Utxo>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Utxo>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_relayer(mut self, pubkey: Pubkey, fee: u64) -> Self {
        self.relayer = Some(Relayer { pubkey, fee });
        self
    }

    pub fn with_recipient_sol(mut self, recipient: Pubkey) -> Self {
        self.recipient_sol = Some(recipient);
        self
    }

    pub fn with_recipient_spl(mut self, recipient: Pubkey) -> Self {
        self.recipient_spl = Some(recipient);
        self
    }

    pub fn with_message(mut self, message: Vec<u8>) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_asset_pubkeys(mut self, assets: Vec<Pubkey>) -> Self {
        self.asset_pubkeys = Some(assets);
        self
    }

    pub fn with_transaction_nonce(mut self, nonce: u64) -> Self {
        self.transaction_nonce = nonce;
        self
    }
}

// =============================================================================
//                        TRANSACTION PARAMETERS
// =============================================================================

/// Balanced, padded and hashed transaction, ready for proof generation.
///
///   public_amount[a] = (Σ out[a] - Σ in[a] + p) mod p
///
/// where a sum only counts UTXOs whose `assets_circuit[a]` matches asset slot
/// `a`. Slot 0 is the native asset (`public_amount_sol`), slot 1 the token
/// (`public_amount_spl`).
#[derive(Clone, Debug)]
pub struct TransactionParameters {
    pub action: Action,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Utxo>,
    pub input_nullifiers: Vec<FieldElement>,
    pub output_commitments: Vec<FieldElement>,
    pub in_paths: Vec<MerklePath>,
    pub in_path_indices: Vec<u64>,
    pub root: FieldElement,
    pub asset_pubkeys: [Pubkey; N_ASSET_PUBKEYS],
    pub asset_pubkeys_circuit: [FieldElement; N_ASSET_PUBKEYS],
    pub public_amount_sol: FieldElement,
    pub public_amount_spl: FieldElement,
    pub relayer: Relayer,
    pub recipient_spl: Option<Pubkey>,
    pub recipient_sol: Option<Pubkey>,
    pub merkle_tree: Pubkey,
    pub message_hash: [u8; 32],
    pub encrypted_outputs: Vec<u8>,
    pub tx_integrity_hash: FieldElement,
    pub transaction_nonce: u64,
}

impl TransactionParameters {
    pub fn build<R: RngCore + CryptoRng + ?Sized>(
        request: TransactionRequest,
        tree: &MerkleTree,
        constants: &ProtocolConstants,
        rng: &mut R,
    ) -> Result<Self> {
        let TransactionRequest {
            action,
            sender,
            merkle_tree,
            mut inputs,
            mut outputs,
            relayer,
            recipient_spl,
            recipient_sol,
            message,
            asset_pubkeys: pinned_assets,
            transaction_nonce,
        } = request;

        if inputs.is_empty() && outputs.is_empty() {
            return Err(PoolError::InvalidAmount("no input or output utxos provided".into()));
        }
        if inputs.len() > constants.inputs {
            return Err(PoolError::TooManyUtxos {
                kind: "input",
                got: inputs.len(),
                max: constants.inputs,
            });
        }
        if outputs.len() > constants.outputs {
            return Err(PoolError::TooManyUtxos {
                kind: "output",
                got: outputs.len(),
                max: constants.outputs,
            });
        }

        let relayer = match (action, relayer) {
            (Action::Shield, Some(r)) if r.fee != 0 => {
                return Err(PoolError::InvalidPublicAmount(
                    "a shield pays no relayer fee".into(),
                ))
            }
            (Action::Shield, _) => Relayer {
                pubkey: sender,
                fee: 0,
            },
            (_, Some(r)) => r,
            (action, None) => return Err(PoolError::MissingRelayer(action.name())),
        };

        // The asset set is fixed by the caller's UTXOs, before fillers.
        let asset_pubkeys = match pinned_assets {
            Some(pinned) => check_pinned_assets(&pinned, &inputs, &outputs)?,
            None => collect_asset_pubkeys(&inputs, &outputs)?,
        };
        let asset_pubkeys_circuit = circuit_asset_pubkeys(&asset_pubkeys);

        while inputs.len() < constants.inputs {
            inputs.push(Utxo::empty(Keypair::random(rng)?, rng)?);
        }
        while outputs.len() < constants.outputs {
            outputs.push(Utxo::empty(Keypair::random(rng)?, rng)?);
        }
        if constants.shuffle_utxos {
            inputs.shuffle(rng);
            outputs.shuffle(rng);
        }

        let sol = external_amount(&inputs, &outputs, &asset_pubkeys_circuit, 0);
        let spl = external_amount(&inputs, &outputs, &asset_pubkeys_circuit, 1);
        check_public_amounts(action, [sol, spl], &relayer)?;
        match action {
            Action::Unshield if spl != 0 && recipient_spl.is_none() => {
                return Err(PoolError::MissingAccount("recipient_spl"))
            }
            Action::Unshield if sol + i128::from(relayer.fee) != 0 && recipient_sol.is_none() => {
                return Err(PoolError::MissingAccount("recipient_sol"))
            }
            _ => {}
        }

        let mut in_paths = Vec::with_capacity(inputs.len());
        let mut in_path_indices = Vec::with_capacity(inputs.len());
        let mut indexed_inputs = Vec::with_capacity(inputs.len());
        for utxo in inputs {
            if utxo.is_empty() {
                in_paths.push(MerklePath::empty(tree.levels()));
                in_path_indices.push(0);
                indexed_inputs.push(utxo);
                continue;
            }
            let commitment = utxo.commitment()?;
            let index = tree
                .index_of(&commitment)
                .ok_or_else(|| PoolError::CommitmentNotFound(commitment.to_string()))?;
            in_paths.push(tree.path(index)?);
            in_path_indices.push(index as u64);
            indexed_inputs.push(utxo.with_index(index as u64));
        }
        let inputs = indexed_inputs;

        let input_nullifiers = inputs.iter().map(Utxo::nullifier).collect::<Result<Vec<_>>>()?;
        let output_commitments = outputs.iter().map(Utxo::commitment).collect::<Result<Vec<_>>>()?;

        let encrypted_outputs = encrypt_outputs(&outputs, constants, rng)?;
        let message_hash = message
            .as_deref()
            .map(|m| Sha256::digest(m).into())
            .unwrap_or([0u8; 32]);

        let mut params = TransactionParameters {
            action,
            inputs,
            outputs,
            input_nullifiers,
            output_commitments,
            in_paths,
            in_path_indices,
            root: tree.root(),
            asset_pubkeys,
            asset_pubkeys_circuit,
            public_amount_sol: FieldElement::from_signed(sol),
            public_amount_spl: FieldElement::from_signed(spl),
            relayer,
            recipient_spl,
            recipient_sol,
            merkle_tree,
            message_hash,
            encrypted_outputs,
            tx_integrity_hash: FieldElement::zero(),
            transaction_nonce,
        };
        params.tx_integrity_hash = params.integrity_hash();
        debug!(
            action = action.name(),
            transaction_nonce,
            public_amount_sol = %params.public_amount_sol,
            public_amount_spl = %params.public_amount_spl,
            "assembled transaction parameters"
        );
        Ok(params)
    }

    /// keccak256(message_hash || recipient_spl || recipient_sol || relayer
    ///           || fee (u64 LE) || merkle_tree || encrypted_outputs) mod p
    ///
    /// Absent recipients hash as the system pubkey.
    pub fn integrity_hash(&self) -> FieldElement {
        let mut data = Vec::with_capacity(32 * 5 + 8 + self.encrypted_outputs.len());
        data.extend_from_slice(&self.message_hash);
        data.extend_from_slice(&self.recipient_spl.unwrap_or(Pubkey::SYSTEM).0);
        data.extend_from_slice(&self.recipient_sol.unwrap_or(Pubkey::SYSTEM).0);
        data.extend_from_slice(&self.relayer.pubkey.0);
        data.extend_from_slice(&self.relayer.fee.to_le_bytes());
        data.extend_from_slice(&self.merkle_tree.0);
        data.extend_from_slice(&self.encrypted_outputs);
        keccak_to_field(&data)
    }

    /// Token mint as the circuit sees it; 0 when no token crosses the pool boundary.
    pub fn public_mint(&self) -> FieldElement {
        if self.public_amount_spl.is_zero() {
            FieldElement::zero()
        } else {
            self.asset_pubkeys_circuit[1]
        }
    }

    /// `[utxo][asset slot][asset pubkey]` membership flags.
    pub fn indices(&self, utxos: &[Utxo]) -> Vec<[[FieldElement; N_ASSET_PUBKEYS]; N_ASSETS]> {
        utxos
            .iter()
            .map(|utxo| {
                let circuit = utxo.assets_circuit();
                let mut rows = [[FieldElement::zero(); N_ASSET_PUBKEYS]; N_ASSETS];
                for (a, row) in rows.iter_mut().enumerate() {
                    if let Some(i) = self
                        .asset_pubkeys_circuit
                        .iter()
                        .position(|pk| !pk.is_zero() && *pk == circuit[a])
                    {
                        row[i] = FieldElement::from_u64(1);
                    }
                }
                rows
            })
            .collect()
    }

    pub fn proof_input(&self) -> ProofInput {
        let amounts = |utxos: &[Utxo]| -> Vec<[FieldElement; N_ASSETS]> {
            utxos.iter().map(|u| u.amounts().map(FieldElement::from_u64)).collect()
        };
        ProofInput {
            root: self.root,
            input_nullifier: self.input_nullifiers.clone(),
            output_commitment: self.output_commitments.clone(),
            public_amount_spl: self.public_amount_spl,
            public_amount_sol: self.public_amount_sol,
            public_mint_pubkey: self.public_mint(),
            tx_integrity_hash: self.tx_integrity_hash,
            internal_tx_integrity_hash: self.tx_integrity_hash,
            in_private_key: self
                .inputs
                .iter()
                .map(|u| u.keypair().privkey().unwrap_or_default())
                .collect(),
            in_path_indices: self.in_path_indices.iter().copied().map(FieldElement::from_u64).collect(),
            in_path_elements: self.in_paths.iter().map(|p| p.path_elements.clone()).collect(),
            in_amount: amounts(&self.inputs),
            in_blinding: self.inputs.iter().map(Utxo::blinding).collect(),
            in_app_data_hash: self.inputs.iter().map(Utxo::app_data_hash).collect(),
            in_pool_type: self.inputs.iter().map(|u| FieldElement::from_u64(u.pool_type())).collect(),
            in_verifier_pubkey: self.inputs.iter().map(Utxo::verifier_address_circuit).collect(),
            out_amount: amounts(&self.outputs),
            out_blinding: self.outputs.iter().map(Utxo::blinding).collect(),
            out_pubkey: self.outputs.iter().map(|u| u.keypair().pubkey()).collect(),
            out_app_data_hash: self.outputs.iter().map(Utxo::app_data_hash).collect(),
            out_pool_type: self.outputs.iter().map(|u| FieldElement::from_u64(u.pool_type())).collect(),
            out_verifier_pubkey: self.outputs.iter().map(Utxo::verifier_address_circuit).collect(),
            asset_pubkeys: self.asset_pubkeys_circuit,
            in_indices: self.indices(&self.inputs),
            out_indices: self.indices(&self.outputs),
            transaction_version: FieldElement::from_u64(TRANSACTION_VERSION),
        }
    }
}

/// Circuit witness input. Serializes to the JSON the prover expects, every
/// number as a decimal string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofInput {
    pub root: FieldElement,
    pub input_nullifier: Vec<FieldElement>,
    pub output_commitment: Vec<FieldElement>,
    pub public_amount_spl: FieldElement,
    pub public_amount_sol: FieldElement,
    pub public_mint_pubkey: FieldElement,
    pub tx_integrity_hash: FieldElement,
    pub internal_tx_integrity_hash: FieldElement,
    pub in_private_key: Vec<FieldElement>,
    pub in_path_indices: Vec<FieldElement>,
    pub in_path_elements: Vec<Vec<FieldElement>>,
    pub in_amount: Vec<[FieldElement; N_ASSETS]>,
    pub in_blinding: Vec<FieldElement>,
    pub in_app_data_hash: Vec<FieldElement>,
    pub in_pool_type: Vec<FieldElement>,
    pub in_verifier_pubkey: Vec<FieldElement>,
    pub out_amount: Vec<[FieldElement; N_ASSETS]>,
    pub out_blinding: Vec<FieldElement>,
    pub out_pubkey: Vec<FieldElement>,
    pub out_app_data_hash: Vec<FieldElement>,
    pub out_pool_type: Vec<FieldElement>,
    pub out_verifier_pubkey: Vec<FieldElement>,
    pub asset_pubkeys: [FieldElement; N_ASSET_PUBKEYS],
    pub in_indices: Vec<[[FieldElement; N_ASSET_PUBKEYS]; N_ASSETS]>,
    pub out_indices: Vec<[[FieldElement; N_ASSET_PUBKEYS]; N_ASSETS]>,
    pub transaction_version: FieldElement,
}

// =============================================================================
//                              HELPERS
// =============================================================================

/// Native asset first, then every distinct token in order of first
/// appearance (inputs before outputs), padded with the native pubkey.
fn collect_asset_pubkeys(inputs: &[Utxo], outputs: &[Utxo]) -> Result<[Pubkey; N_ASSET_PUBKEYS]> {
    let mut assets = vec![Pubkey::SYSTEM];
    for utxo in inputs.iter().chain(outputs) {
        let token = utxo.assets()[1];
        if token != Pubkey::SYSTEM && !assets.contains(&token) {
            assets.push(token);
        }
    }
    check_single_token(&assets)?;
    pad_assets(&assets)
}

/// A note only holds `amounts[N_ASSETS]`, so the public amount can balance
/// at most one token next to the native asset.
fn check_single_token(assets: &[Pubkey]) -> Result<()> {
    let tokens = assets.iter().filter(|a| **a != Pubkey::SYSTEM).count();
    if tokens > N_ASSETS - 1 {
        return Err(PoolError::DistinctAssetsRequired);
    }
    Ok(())
}

fn check_pinned_assets(
    pinned: &[Pubkey],
    inputs: &[Utxo],
    outputs: &[Utxo],
) -> Result<[Pubkey; N_ASSET_PUBKEYS]> {
    if pinned.first() != Some(&Pubkey::SYSTEM) {
        return Err(PoolError::InvalidAmount(
            "asset pubkeys must start with the native asset".into(),
        ));
    }
    for (i, asset) in pinned.iter().enumerate() {
        if pinned[..i].contains(asset) {
            return Err(PoolError::DistinctAssetsRequired);
        }
    }
    if let Some(missing) = inputs
        .iter()
        .chain(outputs)
        .map(|u| u.assets()[1])
        .find(|a| !pinned.contains(a))
    {
        return Err(PoolError::AssetNotFound(missing.to_string()));
    }
    check_single_token(pinned)?;
    pad_assets(pinned)
}

fn pad_assets(assets: &[Pubkey]) -> Result<[Pubkey; N_ASSET_PUBKEYS]> {
    if assets.len() > N_ASSET_PUBKEYS {
        return Err(PoolError::InvalidLength {
            expected: N_ASSET_PUBKEYS,
            got: assets.len(),
        });
    }
    let mut out = [Pubkey::SYSTEM; N_ASSET_PUBKEYS];
    out[..assets.len()].copy_from_slice(assets);
    Ok(out)
}

/// Padding slots (system pubkey past slot 0) map to 0.
fn circuit_asset_pubkeys(assets: &[Pubkey; N_ASSET_PUBKEYS]) -> [FieldElement; N_ASSET_PUBKEYS] {
    let mut out = [FieldElement::zero(); N_ASSET_PUBKEYS];
    for (i, asset) in assets.iter().enumerate() {
        if i == 0 || *asset != Pubkey::SYSTEM {
            out[i] = hash_and_truncate_to_circuit(&asset.0);
        }
    }
    out
}

fn external_amount(
    inputs: &[Utxo],
    outputs: &[Utxo],
    asset_pubkeys_circuit: &[FieldElement; N_ASSET_PUBKEYS],
    slot: usize,
) -> i128 {
    let sum = |utxos: &[Utxo]| -> i128 {
        utxos
            .iter()
            .filter(|u| u.assets_circuit()[slot] == asset_pubkeys_circuit[slot])
            .map(|u| i128::from(u.amounts()[slot]))
            .sum()
    };
    sum(outputs) - sum(inputs)
}

fn check_public_amounts(action: Action, amounts: [i128; N_ASSETS], relayer: &Relayer) -> Result<()> {
    let u64_max = i128::from(u64::MAX);
    match action {
        Action::Shield => {
            for (slot, amount) in amounts.iter().enumerate() {
                if *amount < 0 {
                    return Err(PoolError::NegativeDeposit { slot });
                }
                if *amount > u64_max {
                    return Err(PoolError::InvalidPublicAmount(format!(
                        "slot {slot} deposit {amount} exceeds u64"
                    )));
                }
            }
        }
        Action::Unshield => {
            for (slot, amount) in amounts.iter().enumerate() {
                if *amount > 0 || -*amount > u64_max {
                    return Err(PoolError::InvalidPublicAmount(format!(
                        "slot {slot} unshield amount {amount} is not a u64 withdrawal"
                    )));
                }
            }
        }
        Action::Transfer => {
            let [sol, spl] = amounts;
            if spl != 0 {
                return Err(PoolError::InvalidPublicAmount(format!(
                    "transfer moves {spl} tokens across the pool boundary"
                )));
            }
            if sol != -i128::from(relayer.fee) {
                return Err(PoolError::InvalidPublicAmount(format!(
                    "transfer native amount {sol} does not pay the relayer fee {}",
                    relayer.fee
                )));
            }
        }
    }
    Ok(())
}

/// Two short outputs are packed into one zero-padded 256-byte block;
/// anything else gets a 128-byte slot per output, randomly padded.
fn encrypt_outputs<R: RngCore + CryptoRng + ?Sized>(
    outputs: &[Utxo],
    constants: &ProtocolConstants,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let encrypted = outputs
        .iter()
        .map(|u| u.encrypt(constants, rng))
        .collect::<Result<Vec<_>>>()?;
    let total: usize = encrypted.iter().map(Vec::len).sum();

    let mut out = Vec::with_capacity(PACKED_OUTPUTS_LEN.max(OUTPUT_SLOT_LEN * encrypted.len()));
    if encrypted.len() == 2 && total < PACKED_OUTPUTS_LEN {
        for e in &encrypted {
            out.extend_from_slice(e);
        }
        out.resize(PACKED_OUTPUTS_LEN, 0);
    } else {
        for e in &encrypted {
            let start = out.len();
            out.extend_from_slice(e);
            if e.len() < OUTPUT_SLOT_LEN {
                out.resize(start + OUTPUT_SLOT_LEN, 0);
                rng.fill_bytes(&mut out[start + e.len()..]);
            }
        }
    }
    out.truncate(MAX_ENCRYPTED_OUTPUTS_LEN);
    Ok(out)
}
