use crate::error::{PoolError, Result};
use crate::ledger::{AccountMeta, FlowAccounts, LedgerContext, LedgerInstruction, Pubkey};

/// Public inputs that fit the prepare-inputs init instruction.
pub const MAX_PREPARED_INPUTS_LEN: usize = 208;
pub const PREPARE_INPUTS_INIT_LEN: usize = 2 + MAX_PREPARED_INPUTS_LEN;
/// Two G1 points (A and C) or one G2 point (B), uncompressed.
pub const PROOF_PAYLOAD_LEN: usize = 192;

// System program instruction tags (u32 LE).
const SYSTEM_TRANSFER: u32 = 2;
const SYSTEM_CREATE_WITH_SEED: u32 = 3;

/// Second data byte: which remote account family an instruction drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Selector {
    MerkleTree = 0,
    MillerLoop = 1,
    FinalExp = 2,
    PrepareInputs = 3,
}

/// Named protocol opcodes. Plain tape entries outside this list travel as
/// raw bytes inside `MillerStep`, `FinalExpStep` and `InsertStep`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    InitTree,
    BeginDeposit,
    InsertStep,
    PrepareInputsInit,
    NewAccumulator,
    WriteBack,
    CombineFirst,
    CombineSecond,
    PullPreparedInputs,
    LoadProofAC,
    LoadProofB,
    CoefficientPrimary,
    CoefficientSecondary,
    CoefficientCombo1,
    CoefficientCombo2,
    CoefficientCombo3,
    AdditionStep1,
    AdditionStep2,
    AdditionStep3,
    MillerFinalize,
    Verify1,
    Verify2,
    Verify3,
    Verify4,
    Withdraw,
}

impl Opcode {
    pub const fn code(self) -> u8 {
        match self {
            Opcode::InitTree => 240,
            Opcode::BeginDeposit => 34,
            Opcode::InsertStep => 1,
            Opcode::PrepareInputsInit => 0,
            Opcode::NewAccumulator => 1,
            Opcode::WriteBack => 6,
            Opcode::CombineFirst => 7,
            Opcode::CombineSecond => 8,
            Opcode::PullPreparedInputs => 251,
            Opcode::LoadProofAC => 230,
            Opcode::LoadProofB => 237,
            Opcode::CoefficientPrimary => 225,
            Opcode::CoefficientSecondary => 226,
            Opcode::CoefficientCombo1 => 231,
            Opcode::CoefficientCombo2 => 232,
            Opcode::CoefficientCombo3 => 233,
            Opcode::AdditionStep1 => 234,
            Opcode::AdditionStep2 => 235,
            Opcode::AdditionStep3 => 236,
            Opcode::MillerFinalize => 255,
            Opcode::Verify1 => 121,
            Opcode::Verify2 => 122,
            Opcode::Verify3 => 123,
            Opcode::Verify4 => 124,
            Opcode::Withdraw => 103,
        }
    }
}

// =============================================================================
//                              INSTRUCTIONS
// =============================================================================

/// One on-chain instruction with a fixed data layout per variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// System program: creates `create_with_seed(base, seed, owner)` funded by the payer.
    CreateAccountWithSeed {
        base: Pubkey,
        seed: String,
        lamports: u64,
        space: u64,
        owner: Pubkey,
    },
    /// System program: payer -> `to`.
    SystemTransfer { to: Pubkey, lamports: u64 },
    InitTree,
    BeginDeposit,
    InsertLeaf { leaf: [u8; 32] },
    InsertStep,
    PrepareInputsInit { inputs: Vec<u8> },
    PrepareInputsStep { opcode: u8 },
    PrepareInputsIndexed { round: u8, index: u8 },
    PullPreparedInputs,
    LoadProofAC { payload: Box<[u8; PROOF_PAYLOAD_LEN]> },
    LoadProofB { payload: Box<[u8; PROOF_PAYLOAD_LEN]> },
    MillerStep { opcode: u8 },
    MillerFinalize,
    FinalExpStep { opcode: u8 },
    FinalExpWithdraw,
}

impl Instruction {
    pub fn prepare_inputs_init(inputs: &[u8]) -> Result<Self> {
        if inputs.len() > MAX_PREPARED_INPUTS_LEN {
            return Err(PoolError::InvalidLength {
                expected: MAX_PREPARED_INPUTS_LEN,
                got: inputs.len(),
            });
        }
        Ok(Instruction::PrepareInputsInit {
            inputs: inputs.to_vec(),
        })
    }

    /// Opcode as it appears in a replay trace; `None` for system instructions.
    pub fn opcode(&self) -> Option<u8> {
        let code = match self {
            Instruction::CreateAccountWithSeed { .. } | Instruction::SystemTransfer { .. } => return None,
            Instruction::InitTree => Opcode::InitTree.code(),
            Instruction::BeginDeposit => Opcode::BeginDeposit.code(),
            Instruction::InsertLeaf { .. } | Instruction::InsertStep => Opcode::InsertStep.code(),
            Instruction::PrepareInputsInit { .. } => Opcode::PrepareInputsInit.code(),
            Instruction::PrepareInputsStep { opcode }
            | Instruction::MillerStep { opcode }
            | Instruction::FinalExpStep { opcode } => *opcode,
            Instruction::PrepareInputsIndexed { round, .. } => round + 2,
            Instruction::PullPreparedInputs => Opcode::PullPreparedInputs.code(),
            Instruction::LoadProofAC { .. } => Opcode::LoadProofAC.code(),
            Instruction::LoadProofB { .. } => Opcode::LoadProofB.code(),
            Instruction::MillerFinalize => Opcode::MillerFinalize.code(),
            Instruction::FinalExpWithdraw => Opcode::Withdraw.code(),
        };
        Some(code)
    }

    /// Instruction data exactly as the programs decode it.
    pub fn data(&self) -> Vec<u8> {
        let selected = |opcode: u8, selector: Selector| vec![opcode, selector as u8];
        match self {
            Instruction::CreateAccountWithSeed {
                base,
                seed,
                lamports,
                space,
                owner,
            } => {
                let mut data = Vec::with_capacity(4 + 32 + 8 + seed.len() + 16 + 32);
                data.extend_from_slice(&SYSTEM_CREATE_WITH_SEED.to_le_bytes());
                data.extend_from_slice(&base.0);
                data.extend_from_slice(&(seed.len() as u64).to_le_bytes());
                data.extend_from_slice(seed.as_bytes());
                data.extend_from_slice(&lamports.to_le_bytes());
                data.extend_from_slice(&space.to_le_bytes());
                data.extend_from_slice(&owner.0);
                data
            }
            Instruction::SystemTransfer { lamports, .. } => {
                let mut data = SYSTEM_TRANSFER.to_le_bytes().to_vec();
                data.extend_from_slice(&lamports.to_le_bytes());
                data
            }
            Instruction::InitTree => vec![Opcode::InitTree.code(), Selector::MerkleTree as u8, 1],
            Instruction::BeginDeposit => vec![Opcode::BeginDeposit.code(), Selector::MerkleTree as u8, 1],
            Instruction::InsertLeaf { leaf } => {
                let mut data = vec![Opcode::InsertStep.code(), Selector::MerkleTree as u8];
                data.extend_from_slice(leaf);
                data.push(0);
                data
            }
            Instruction::InsertStep => vec![Opcode::InsertStep.code(), Selector::MerkleTree as u8, 0],
            Instruction::PrepareInputsInit { inputs } => {
                let mut data = vec![0u8; PREPARE_INPUTS_INIT_LEN];
                data[0] = Opcode::PrepareInputsInit.code();
                data[1] = Selector::PrepareInputs as u8;
                data[2..2 + inputs.len()].copy_from_slice(inputs);
                data
            }
            Instruction::PrepareInputsStep { opcode } => selected(*opcode, Selector::PrepareInputs),
            Instruction::PrepareInputsIndexed { round, index } => {
                vec![round + 2, Selector::PrepareInputs as u8, *index]
            }
            Instruction::PullPreparedInputs => selected(Opcode::PullPreparedInputs.code(), Selector::MillerLoop),
            Instruction::LoadProofAC { payload } => {
                let mut data = selected(Opcode::LoadProofAC.code(), Selector::MillerLoop);
                data.extend_from_slice(payload.as_slice());
                data
            }
            Instruction::LoadProofB { payload } => {
                let mut data = selected(Opcode::LoadProofB.code(), Selector::MillerLoop);
                data.extend_from_slice(payload.as_slice());
                data
            }
            Instruction::MillerStep { opcode } => selected(*opcode, Selector::MillerLoop),
            Instruction::MillerFinalize => selected(Opcode::MillerFinalize.code(), Selector::MillerLoop),
            Instruction::FinalExpStep { opcode } => selected(*opcode, Selector::FinalExp),
            Instruction::FinalExpWithdraw => selected(Opcode::Withdraw.code(), Selector::FinalExp),
        }
    }

    /// Binds the instruction to its program and accounts. The payer always
    /// signs and comes first.
    pub fn resolve(&self, ctx: &LedgerContext, flow: &FlowAccounts) -> Result<LedgerInstruction> {
        let payer = AccountMeta::signer(flow.payer);
        let (program_id, accounts) = match self {
            Instruction::CreateAccountWithSeed { base, seed, owner, .. } => {
                let created = Pubkey::create_with_seed(base, seed, owner)?;
                (
                    Pubkey::SYSTEM,
                    vec![
                        AccountMeta::writable_signer(flow.payer),
                        AccountMeta::writable(created),
                        AccountMeta::signer(*base),
                    ],
                )
            }
            Instruction::SystemTransfer { to, .. } => (
                Pubkey::SYSTEM,
                vec![AccountMeta::writable_signer(flow.payer), AccountMeta::writable(*to)],
            ),
            Instruction::InitTree => (
                ctx.verifier_program,
                vec![payer, AccountMeta::writable(need(flow.merkle_tree, "merkle_tree")?)],
            ),
            Instruction::BeginDeposit => (
                ctx.verifier_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.hash_tmp, "hash_tmp")?),
                    AccountMeta::writable(need(flow.merkle_tree, "merkle_tree")?),
                    AccountMeta::writable(need(flow.deposit_tmp, "deposit_tmp")?),
                ],
            ),
            Instruction::InsertLeaf { .. } | Instruction::InsertStep => (
                ctx.verifier_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.hash_tmp, "hash_tmp")?),
                    AccountMeta::writable(need(flow.merkle_tree, "merkle_tree")?),
                ],
            ),
            Instruction::PrepareInputsInit { .. } => (
                ctx.prepare_inputs_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.prepare_inputs, "prepare_inputs")?),
                    AccountMeta::writable(need(flow.merkle_tree, "merkle_tree")?),
                ],
            ),
            Instruction::PrepareInputsStep { .. } | Instruction::PrepareInputsIndexed { .. } => (
                ctx.prepare_inputs_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.prepare_inputs, "prepare_inputs")?),
                ],
            ),
            Instruction::PullPreparedInputs => (
                ctx.verifier_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.miller_loop, "miller_loop")?),
                    AccountMeta::readonly(need(flow.prepare_inputs, "prepare_inputs")?),
                ],
            ),
            Instruction::LoadProofAC { .. } | Instruction::LoadProofB { .. } | Instruction::MillerStep { .. } => (
                ctx.verifier_program,
                vec![payer, AccountMeta::writable(need(flow.miller_loop, "miller_loop")?)],
            ),
            Instruction::MillerFinalize => (
                ctx.verifier_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.miller_loop, "miller_loop")?),
                    AccountMeta::writable(need(flow.final_exp, "final_exp")?),
                ],
            ),
            Instruction::FinalExpStep { opcode } => {
                let mut accounts = vec![payer, AccountMeta::writable(need(flow.final_exp, "final_exp")?)];
                if is_verify_step(*opcode) {
                    accounts.push(AccountMeta::writable(need(flow.merkle_tree, "merkle_tree")?));
                }
                (ctx.verifier_program, accounts)
            }
            Instruction::FinalExpWithdraw => (
                ctx.verifier_program,
                vec![
                    payer,
                    AccountMeta::writable(need(flow.final_exp, "final_exp")?),
                    AccountMeta::writable(need(flow.withdraw_from, "withdraw_from")?),
                    AccountMeta::writable(need(flow.withdraw_to, "withdraw_to")?),
                ],
            ),
        };
        Ok(LedgerInstruction {
            program_id,
            accounts,
            data: self.data(),
        })
    }
}

fn need(account: Option<Pubkey>, name: &'static str) -> Result<Pubkey> {
    account.ok_or(PoolError::MissingAccount(name))
}

/// Final-exponentiation steps that check the result against the tree.
fn is_verify_step(opcode: u8) -> bool {
    [Opcode::Verify1, Opcode::Verify2, Opcode::Verify3, Opcode::Verify4]
        .iter()
        .any(|op| op.code() == opcode)
}
