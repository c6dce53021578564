use crypto_box::aead::{Aead, Nonce};
use crypto_box::{SalsaBox, SecretKey};
use rand::{CryptoRng, RngCore};
use std::sync::OnceLock;
use tracing::warn;

use crate::config::ProtocolConstants;
use crate::error::{PoolError, Result};
use crate::field::{hash_and_truncate_to_circuit, FieldElement};
use crate::keypair::Keypair;
use crate::ledger::Pubkey;
use crate::poseidon;

/// Amount slots per UTXO; slot 0 is the native (fee) asset.
pub const N_ASSETS: usize = 2;
/// Asset pubkeys one transaction may touch.
pub const N_ASSET_PUBKEYS: usize = 3;
pub const TRANSACTION_VERSION: u64 = 0;
pub const BLINDING_LEN: usize = 31;
/// blinding (31) | amount0 (8) | amount1 (8) | asset idx (8) | verifier idx (8) | pool type (8)
pub const PLAINTEXT_LEN: usize = 71;
/// Plaintext plus the Poly1305 tag.
pub const CIPHERTEXT_LEN: usize = PLAINTEXT_LEN + 16;
/// Ephemeral sender pubkey followed by the ciphertext.
pub const ENCRYPTED_UTXO_LEN: usize = 32 + CIPHERTEXT_LEN;
/// Poseidon width bound for app data.
pub const MAX_APP_DATA: usize = 12;

// =============================================================================
//                                UTXO
// =============================================================================

/// A shielded note.
///
///   commitment = Poseidon(version, Poseidon(amounts), pubkey, blinding,
///                         Poseidon(assets_circuit), app_data_hash,
///                         pool_type, verifier_circuit)
///   nullifier  = Poseidon(commitment, index, Poseidon(privkey, commitment, index))
///
/// Both are computed on first use and cached.
#[derive(Clone, Debug)]
pub struct Utxo {
    amounts: [u64; N_ASSETS],
    assets: [Pubkey; N_ASSETS],
    assets_circuit: [FieldElement; N_ASSETS],
    keypair: Keypair,
    blinding: FieldElement,
    index: Option<u64>,
    pool_type: u64,
    verifier_address: Pubkey,
    verifier_address_circuit: FieldElement,
    app_data_hash: FieldElement,
    commitment: OnceLock<FieldElement>,
    nullifier: OnceLock<FieldElement>,
}

impl Utxo {
    /// UTXO with a fresh 31-byte blinding.
    pub fn new<R: RngCore + CryptoRng + ?Sized>(
        keypair: Keypair,
        assets: &[Pubkey],
        amounts: &[u64],
        rng: &mut R,
    ) -> Result<Self> {
        Self::from_parts(keypair, assets, amounts, random_blinding(rng))
    }

    /// Zero-amount filler owned by `keypair`.
    pub fn empty<R: RngCore + CryptoRng + ?Sized>(keypair: Keypair, rng: &mut R) -> Result<Self> {
        Self::new(keypair, &[], &[], rng)
    }

    pub fn from_parts(
        keypair: Keypair,
        assets: &[Pubkey],
        amounts: &[u64],
        blinding: FieldElement,
    ) -> Result<Self> {
        if assets.len() != amounts.len() {
            return Err(PoolError::InvalidAmount(format!(
                "length mismatch assets: {} != amounts: {}",
                assets.len(),
                amounts.len()
            )));
        }
        if assets.len() > N_ASSETS {
            return Err(PoolError::InvalidAmount(format!(
                "{} assets > N_ASSETS {N_ASSETS}",
                assets.len()
            )));
        }
        if blinding.to_be_bytes()[0] != 0 {
            return Err(PoolError::InvalidFieldElement(
                "blinding exceeds 31 bytes".into(),
            ));
        }

        let mut padded_assets = [Pubkey::SYSTEM; N_ASSETS];
        let mut padded_amounts = [0u64; N_ASSETS];
        padded_assets[..assets.len()].copy_from_slice(assets);
        padded_amounts[..amounts.len()].copy_from_slice(amounts);
        if padded_assets[0] != Pubkey::SYSTEM {
            return Err(PoolError::InvalidAmount(
                "asset slot 0 must hold the native asset".into(),
            ));
        }

        // A native asset in slot 1 is the same asset as slot 0.
        if padded_assets[1] == Pubkey::SYSTEM {
            padded_amounts[0] = padded_amounts[0]
                .checked_add(padded_amounts[1])
                .ok_or_else(|| PoolError::InvalidAmount("native amount overflows u64".into()))?;
            padded_amounts[1] = 0;
        }

        let native_circuit = hash_and_truncate_to_circuit(&Pubkey::SYSTEM.0);
        let assets_circuit = if padded_assets[1] != Pubkey::SYSTEM {
            [native_circuit, hash_and_truncate_to_circuit(&padded_assets[1].0)]
        } else if padded_amounts[0] == 0 {
            [FieldElement::zero(), FieldElement::zero()]
        } else {
            [native_circuit, FieldElement::zero()]
        };

        Ok(Utxo {
            amounts: padded_amounts,
            assets: padded_assets,
            assets_circuit,
            keypair,
            blinding,
            index: None,
            pool_type: 0,
            verifier_address: Pubkey::SYSTEM,
            verifier_address_circuit: FieldElement::zero(),
            app_data_hash: FieldElement::zero(),
            commitment: OnceLock::new(),
            nullifier: OnceLock::new(),
        })
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self.nullifier = OnceLock::new();
        self
    }

    pub fn with_pool_type(mut self, pool_type: u64) -> Self {
        self.pool_type = pool_type;
        self.reset_cache();
        self
    }

    /// Programmable UTXO bound to `verifier`. The system program means "none".
    pub fn with_verifier(mut self, verifier: Pubkey) -> Self {
        self.verifier_address = verifier;
        self.verifier_address_circuit = if verifier == Pubkey::SYSTEM {
            FieldElement::zero()
        } else {
            hash_and_truncate_to_circuit(&verifier.0)
        };
        self.reset_cache();
        self
    }

    /// Hashes up to `MAX_APP_DATA` elements into the app data slot (the
    /// circuit's "instruction type").
    pub fn with_app_data(mut self, app_data: &[FieldElement]) -> Result<Self> {
        if app_data.is_empty() || app_data.len() > MAX_APP_DATA {
            return Err(PoolError::InvalidAppData(format!(
                "{} elements, expected 1..={MAX_APP_DATA}",
                app_data.len()
            )));
        }
        self.app_data_hash = poseidon::hash(app_data)?;
        self.reset_cache();
        Ok(self)
    }

    pub fn with_app_data_hash(mut self, app_data_hash: FieldElement) -> Self {
        self.app_data_hash = app_data_hash;
        self.reset_cache();
        self
    }

    fn reset_cache(&mut self) {
        self.commitment = OnceLock::new();
        self.nullifier = OnceLock::new();
    }

    pub fn amounts(&self) -> [u64; N_ASSETS] {
        self.amounts
    }

    pub fn assets(&self) -> [Pubkey; N_ASSETS] {
        self.assets
    }

    pub fn assets_circuit(&self) -> [FieldElement; N_ASSETS] {
        self.assets_circuit
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn blinding(&self) -> FieldElement {
        self.blinding
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }

    pub fn pool_type(&self) -> u64 {
        self.pool_type
    }

    pub fn verifier_address(&self) -> Pubkey {
        self.verifier_address
    }

    pub fn verifier_address_circuit(&self) -> FieldElement {
        self.verifier_address_circuit
    }

    pub fn app_data_hash(&self) -> FieldElement {
        self.app_data_hash
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.iter().all(|a| *a == 0)
    }

    pub fn commitment(&self) -> Result<FieldElement> {
        if let Some(c) = self.commitment.get() {
            return Ok(*c);
        }
        let amount_hash = poseidon::hash(&self.amounts.map(FieldElement::from_u64))?;
        let asset_hash = poseidon::hash(&self.assets_circuit)?;
        let commitment = poseidon::hash(&[
            FieldElement::from_u64(TRANSACTION_VERSION),
            amount_hash,
            self.keypair.pubkey(),
            self.blinding,
            asset_hash,
            self.app_data_hash,
            FieldElement::from_u64(self.pool_type),
            self.verifier_address_circuit,
        ])?;
        let _ = self.commitment.set(commitment);
        Ok(commitment)
    }

    /// Fails with `MissingIndexOrKey` for a funded UTXO whose leaf index or
    /// owner private key is unknown. Unfunded fillers use index 0 and, when
    /// the owner key is absent, a zero signature.
    pub fn nullifier(&self) -> Result<FieldElement> {
        if let Some(n) = self.nullifier.get() {
            return Ok(*n);
        }
        let funded = !self.is_empty();
        let index = match self.index {
            Some(index) => index,
            None if !funded => 0,
            None => return Err(PoolError::MissingIndexOrKey),
        };
        let commitment = self.commitment()?;
        let signature = match self.keypair.privkey() {
            Some(_) => self.keypair.sign(&commitment, index)?,
            None if !funded => FieldElement::zero(),
            None => return Err(PoolError::MissingIndexOrKey),
        };
        let nullifier = poseidon::hash(&[commitment, FieldElement::from_u64(index), signature])?;
        let _ = self.nullifier.set(nullifier);
        Ok(nullifier)
    }

    // =========================================================================
    //                          NOTE ENCRYPTION
    // =========================================================================

    fn plaintext(&self, constants: &ProtocolConstants) -> Result<[u8; PLAINTEXT_LEN]> {
        let asset_index = constants
            .asset_index(&self.assets[1])
            .ok_or_else(|| PoolError::AssetNotFound(self.assets[1].to_string()))?;
        let verifier_index = if self.verifier_address == Pubkey::SYSTEM {
            0
        } else {
            constants
                .verifier_index(&self.verifier_address)
                .ok_or_else(|| PoolError::VerifierNotFound(self.verifier_address.to_string()))?
        };

        let mut frame = [0u8; PLAINTEXT_LEN];
        frame[..BLINDING_LEN].copy_from_slice(&self.blinding.to_be_bytes()[1..]);
        frame[31..39].copy_from_slice(&self.amounts[0].to_le_bytes());
        frame[39..47].copy_from_slice(&self.amounts[1].to_le_bytes());
        frame[47..55].copy_from_slice(&(asset_index as u64).to_le_bytes());
        frame[55..63].copy_from_slice(&(verifier_index as u64).to_le_bytes());
        frame[63..71].copy_from_slice(&self.pool_type.to_le_bytes());
        Ok(frame)
    }

    /// Box-encrypts the note to its owner's encryption key under a fresh
    /// ephemeral sender key. Output is `ENCRYPTED_UTXO_LEN` bytes:
    /// ephemeral pubkey (32) || ciphertext (87).
    ///
    /// The nonce is the first 24 bytes of the little-endian commitment, so
    /// it is never transmitted.
    ///
    /// The frame has no room for the app data hash, so programmable notes
    /// carrying app data are refused.
    pub fn encrypt<R: RngCore + CryptoRng + ?Sized>(
        &self,
        constants: &ProtocolConstants,
        rng: &mut R,
    ) -> Result<Vec<u8>> {
        if !self.app_data_hash.is_zero() {
            return Err(PoolError::Encryption(
                "notes carrying app data cannot be encrypted automatically".into(),
            ));
        }
        let frame = self.plaintext(constants)?;
        let nonce_bytes = nonce_from_commitment(&self.commitment()?);

        let mut ephemeral = [0u8; 32];
        rng.fill_bytes(&mut ephemeral);
        let ephemeral = SecretKey::from(ephemeral);
        let salsa = SalsaBox::new(&self.keypair.encryption_public_key(), &ephemeral);
        let ciphertext = salsa
            .encrypt(Nonce::<SalsaBox>::from_slice(&nonce_bytes), frame.as_slice())
            .map_err(|e| PoolError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(ENCRYPTED_UTXO_LEN);
        out.extend_from_slice(ephemeral.public_key().as_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Attempts to open an encrypted note stored under leaf `commitment`.
    ///
    /// Returns `None` when the note is not addressed to `keypair`, when the
    /// frame is malformed, or when the rebuilt UTXO does not hash to
    /// `commitment`. Scanning mostly meets foreign notes, so none of these
    /// are errors.
    pub fn decrypt(
        encrypted: &[u8],
        keypair: &Keypair,
        commitment: &FieldElement,
        index: u64,
        constants: &ProtocolConstants,
    ) -> Option<Utxo> {
        if encrypted.len() < ENCRYPTED_UTXO_LEN {
            return None;
        }
        let secret = keypair.encryption_secret_key()?;
        let mut sender = [0u8; 32];
        sender.copy_from_slice(&encrypted[..32]);
        let salsa = SalsaBox::new(&crypto_box::PublicKey::from(sender), &secret);
        let nonce_bytes = nonce_from_commitment(commitment);
        let frame = salsa
            .decrypt(
                Nonce::<SalsaBox>::from_slice(&nonce_bytes),
                &encrypted[32..ENCRYPTED_UTXO_LEN],
            )
            .ok()?;
        if frame.len() != PLAINTEXT_LEN {
            return None;
        }

        let mut blinding = [0u8; 32];
        blinding[1..].copy_from_slice(&frame[..BLINDING_LEN]);
        let read_u64 = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&frame[at..at + 8]);
            u64::from_le_bytes(word)
        };
        let amounts = [read_u64(31), read_u64(39)];
        let asset_index = usize::try_from(read_u64(47)).ok()?;
        let verifier_index = usize::try_from(read_u64(55)).ok()?;
        let pool_type = read_u64(63);

        let asset = *constants.asset_lookup_table.get(asset_index)?;
        let verifier = if verifier_index == 0 {
            Pubkey::SYSTEM
        } else {
            *constants.verifier_lookup_table.get(verifier_index)?
        };

        let utxo = match FieldElement::from_be_bytes(&blinding).and_then(|b| {
            Utxo::from_parts(keypair.clone(), &[Pubkey::SYSTEM, asset], &amounts, b)
        }) {
            Ok(utxo) => utxo.with_pool_type(pool_type).with_verifier(verifier).with_index(index),
            Err(err) => {
                warn!(%err, index, "authenticated utxo payload failed to parse");
                return None;
            }
        };
        match utxo.commitment() {
            Ok(c) if c == *commitment => Some(utxo),
            _ => {
                warn!(index, "decrypted utxo does not match its leaf commitment");
                None
            }
        }
    }
}

fn random_blinding<R: RngCore + ?Sized>(rng: &mut R) -> FieldElement {
    let mut bytes = [0u8; BLINDING_LEN];
    rng.fill_bytes(&mut bytes);
    FieldElement::from_be_bytes_mod_order(&bytes)
}

fn nonce_from_commitment(commitment: &FieldElement) -> [u8; 24] {
    let mut nonce = [0u8; 24];
    nonce.copy_from_slice(&commitment.to_le_bytes()[..24]);
    nonce
}
