use thiserror::Error;

pub type Result<T> = core::result::Result<T, PoolError>;

/// Every failure the pool core can surface.
///
/// Decryption failures are deliberately absent: scanning foreign notes is the
/// common case and is reported as `None` by the decrypt functions.
#[derive(Debug, Error)]
pub enum PoolError {
    // ---- validation -------------------------------------------------------
    #[error("the note has invalid format")]
    InvalidNoteFormat,
    #[error("too many {kind} utxos: {got} > {max}")]
    TooManyUtxos { kind: &'static str, got: usize, max: usize },
    #[error("asset pubkeys must be pairwise distinct, with at most one token")]
    DistinctAssetsRequired,
    #[error("deposit yields a negative external amount for asset slot {slot}")]
    NegativeDeposit { slot: usize },
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("merkle tree is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("utxo with a positive amount needs its merkle index and owner private key")]
    MissingIndexOrKey,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("asset {0} not found")]
    AssetNotFound(String),
    #[error("input commitment {0} was not found in the merkle tree")]
    CommitmentNotFound(String),
    #[error("invalid shielded address: {0}")]
    InvalidAddress(String),
    #[error("seed too short: {0} < 32 characters")]
    InvalidSeed(usize),
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),
    #[error("invalid app data: {0}")]
    InvalidAppData(String),
    #[error("a relayer is required for {0}")]
    MissingRelayer(&'static str),
    #[error("invalid public amount: {0}")]
    InvalidPublicAmount(String),
    #[error("account `{0}` is required by this instruction")]
    MissingAccount(&'static str),
    #[error("verifier {0} is not in the lookup table")]
    VerifierNotFound(String),
    #[error("invalid protocol configuration: {0}")]
    Config(String),

    // ---- crypto -----------------------------------------------------------
    #[error("poseidon: {0}")]
    Hash(String),
    #[error("encryption failed: {0}")]
    Encryption(String),

    // ---- transport --------------------------------------------------------
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("{tape} replay failed at batch {batch} after {attempts} attempts: {source}")]
    TapeReplayFailed {
        tape: &'static str,
        batch: usize,
        attempts: u32,
        #[source]
        source: Box<PoolError>,
    },
    #[error("proof generation took too long (>{secs}s); retry the whole transaction")]
    ProverTimeout { secs: u64 },
    #[error("prover: {0}")]
    Prover(String),

    // ---- storage ----------------------------------------------------------
    #[error("invalid storage account: {0}")]
    InvalidStorageAccount(String),

    // ---- protocol invariant ----------------------------------------------
    #[error(
        "{tape} trace diverges at position {position}: expected {expected:?}, found {found:?}"
    )]
    ProtocolInvariant {
        tape: &'static str,
        position: usize,
        expected: Option<u8>,
        found: Option<u8>,
    },
}

impl PoolError {
    /// Transport failures that a fixed-delay resubmission may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, PoolError::Submission(_))
    }
}
