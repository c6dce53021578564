use rand::RngCore;
use tracing::{debug, info, warn};

use crate::config::{BatchLimits, ProtocolConstants};
use crate::error::{PoolError, Result};
use crate::field::FieldElement;
use crate::instruction::{Instruction, Opcode};
use crate::ledger::{FlowAccounts, Ledger, LedgerContext, LedgerInstruction, Pubkey, Signature};
use crate::prover::{ProofBytes, ProofOutput};
use crate::tapes::{
    coefficient_combo, insert_tape, prepare_inputs_trace, FINAL_EXP_TAPE, FINAL_EXP_TERMINAL,
    INSERT_OPEN, MILLER_LOOP_TAPE, MILLER_LOOP_TRACE,
};

pub const TAPE_CREATE_ACCOUNT: &str = "create_account";
pub const TAPE_INIT_TREE: &str = "init_tree";
pub const TAPE_INSERT: &str = "insert";
pub const TAPE_PREPARE_INPUTS: &str = "prepare_inputs";
pub const TAPE_MILLER_LOOP: &str = "miller_loop";
pub const TAPE_FINAL_EXP: &str = "final_exp";

/// Scratch account sizes the programs expect.
pub const HASH_TMP_ACCOUNT_SIZE: usize = 217;
pub const DEPOSIT_TMP_ACCOUNT_SIZE: usize = 0;
pub const VERIFIER_ACCOUNT_SIZE: usize = 4972;
/// Prepare-inputs init carries the public inputs, then this many plain init steps.
pub const PREPARE_INPUTS_INIT_STEPS: usize = 51;
pub const PREPARE_INPUTS_ROUNDS: u8 = 4;
pub const PREPARE_INPUTS_INDICES: usize = 256;

// =============================================================================
//                               SCHEDULES
// =============================================================================

/// A tape laid out as transactions, built before any I/O.
///
/// Each inner vector is one transaction. Batches go out strictly in order:
/// the remote account is a single accumulator.
#[derive(Clone, Debug)]
pub struct Schedule {
    pub tape: &'static str,
    pub batches: Vec<Vec<Instruction>>,
    /// Exact opcode sequence the remote account must see, when one is pinned.
    pub golden: Option<Vec<u8>>,
}

impl Schedule {
    /// Program opcodes in submission order; system instructions are left out.
    pub fn trace(&self) -> Vec<u8> {
        self.batches
            .iter()
            .flatten()
            .filter_map(Instruction::opcode)
            .collect()
    }

    pub fn instruction_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Fails at the first position where the trace leaves the golden one.
    pub fn verify(&self) -> Result<()> {
        let Some(golden) = &self.golden else {
            return Ok(());
        };
        let trace = self.trace();
        let len = trace.len().max(golden.len());
        match (0..len).find(|&i| trace.get(i) != golden.get(i)) {
            None => Ok(()),
            Some(position) => Err(PoolError::ProtocolInvariant {
                tape: self.tape,
                position,
                expected: golden.get(position).copied(),
                found: trace.get(position).copied(),
            }),
        }
    }
}

/// Funding transfer, deposit start and the leaf in one transaction, then the
/// hashing tape in batches of `limits.insert` entries. The tape's opening
/// entry already went out with the deposit.
pub fn insert_schedule(
    leaf: &FieldElement,
    deposit_tmp: Pubkey,
    lamports: u64,
    levels: usize,
    limits: &BatchLimits,
) -> Schedule {
    let mut batches = vec![vec![
        Instruction::SystemTransfer {
            to: deposit_tmp,
            lamports,
        },
        Instruction::BeginDeposit,
        Instruction::InsertLeaf {
            leaf: leaf.to_le_bytes(),
        },
    ]];
    for chunk in insert_tape(levels).chunks(limits.insert) {
        let batch: Vec<Instruction> = chunk
            .iter()
            .filter(|&&op| op != INSERT_OPEN)
            .map(|_| Instruction::InsertStep)
            .collect();
        if !batch.is_empty() {
            batches.push(batch);
        }
    }
    Schedule {
        tape: TAPE_INSERT,
        batches,
        golden: None,
    }
}

/// init (+51 steps), then per round: new accumulator, 256 indexed steps,
/// write-back; then the two combine steps.
pub fn prepare_inputs_schedule(inputs: &[u8], limits: &BatchLimits) -> Result<Schedule> {
    let mut init = vec![Instruction::prepare_inputs_init(inputs)?];
    init.extend((0..PREPARE_INPUTS_INIT_STEPS).map(|_| Instruction::PrepareInputsStep { opcode: 0 }));
    let mut batches = vec![init];

    let indices: Vec<u8> = (0..=u8::MAX).collect();
    for round in 0..PREPARE_INPUTS_ROUNDS {
        batches.push(vec![Instruction::PrepareInputsStep { opcode: 1 }]);
        for chunk in indices[..PREPARE_INPUTS_INDICES].chunks(limits.prepare_inputs) {
            batches.push(
                chunk
                    .iter()
                    .map(|&index| Instruction::PrepareInputsIndexed { round, index })
                    .collect(),
            );
        }
        batches.push(vec![Instruction::PrepareInputsStep { opcode: 6 }]);
    }
    batches.push(vec![
        Instruction::PrepareInputsStep { opcode: 7 },
        Instruction::PrepareInputsStep { opcode: 8 },
    ]);
    Ok(Schedule {
        tape: TAPE_PREPARE_INPUTS,
        batches,
        golden: Some(prepare_inputs_trace()),
    })
}

/// Pull prepared inputs, load the proof, replay the tape with coefficient
/// steps injected, read the result. Batches hold `limits.miller_loop` tape
/// entries; injected steps ride along uncounted.
pub fn miller_loop_schedule(proof: &ProofBytes, limits: &BatchLimits) -> Schedule {
    let mut batches = vec![
        vec![Instruction::PullPreparedInputs],
        vec![
            Instruction::LoadProofAC {
                payload: proof.a_c_payload(),
            },
            Instruction::LoadProofB {
                payload: proof.b_payload(),
            },
        ],
    ];
    for chunk in MILLER_LOOP_TAPE.chunks(limits.miller_loop) {
        let mut batch = Vec::with_capacity(chunk.len() * 2);
        for &entry in chunk {
            batch.extend(
                coefficient_combo(entry)
                    .iter()
                    .map(|&opcode| Instruction::MillerStep { opcode }),
            );
            batch.push(Instruction::MillerStep { opcode: entry });
        }
        batches.push(batch);
    }
    batches.push(vec![Instruction::MillerFinalize]);
    Schedule {
        tape: TAPE_MILLER_LOOP,
        batches,
        golden: Some(MILLER_LOOP_TRACE.to_vec()),
    }
}

/// Tape in batches of `limits.final_exp` entries minus the terminal ones,
/// which close the flow in a transaction of their own.
pub fn final_exp_schedule(limits: &BatchLimits) -> Schedule {
    let mut batches = Vec::new();
    for chunk in FINAL_EXP_TAPE.chunks(limits.final_exp) {
        let batch: Vec<Instruction> = chunk
            .iter()
            .filter(|op| !FINAL_EXP_TERMINAL.contains(*op))
            .map(|&opcode| Instruction::FinalExpStep { opcode })
            .collect();
        if !batch.is_empty() {
            batches.push(batch);
        }
    }
    let mut last: Vec<Instruction> = [Opcode::Verify1, Opcode::Verify2, Opcode::Verify3, Opcode::Verify4]
        .iter()
        .map(|op| Instruction::FinalExpStep { opcode: op.code() })
        .collect();
    last.push(Instruction::FinalExpWithdraw);
    batches.push(last);
    Schedule {
        tape: TAPE_FINAL_EXP,
        batches,
        golden: Some(FINAL_EXP_TAPE.to_vec()),
    }
}

// =============================================================================
//                              REPLAY ENGINE
// =============================================================================

/// Signatures of one replayed flow, one per batch.
#[derive(Clone, Debug, Default)]
pub struct ReplayReport {
    pub tape: &'static str,
    pub signatures: Vec<Signature>,
    pub instructions: usize,
}

/// Accounts created for one verification run.
#[derive(Clone, Debug)]
pub struct VerifierAccounts {
    pub prepare_inputs: Pubkey,
    pub miller_loop: Pubkey,
    pub final_exp: Pubkey,
}

/// Submits schedules against a ledger, one awaited transaction at a time.
///
/// No mid-tape cancellation or resume: after `TapeReplayFailed` the remote
/// account holds partial state and has to be inspected before deciding to
/// resume, restart or abandon.
pub struct ReplayEngine<'a, L: Ledger> {
    ledger: &'a L,
    ctx: &'a LedgerContext,
    constants: &'a ProtocolConstants,
}

impl<'a, L: Ledger> ReplayEngine<'a, L> {
    pub fn new(ledger: &'a L, ctx: &'a LedgerContext, constants: &'a ProtocolConstants) -> Self {
        ReplayEngine { ledger, ctx, constants }
    }

    pub fn ledger(&self) -> &L {
        self.ledger
    }

    /// Up to `retry.attempts` tries with a fixed delay between them. Only
    /// transient failures are retried.
    pub async fn submit_with_retry(
        &self,
        tape: &'static str,
        batch: usize,
        instructions: &[LedgerInstruction],
    ) -> Result<Signature> {
        let policy = &self.constants.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .ledger
                .submit(instructions, &[self.ctx.payer], self.ctx.commitment)
                .await
            {
                Ok(signature) => return Ok(signature),
                Err(err) if err.is_transient() && attempt < policy.attempts => {
                    warn!(tape, batch, attempt, %err, "submission failed, retrying");
                    tokio::time::sleep(policy.delay()).await;
                }
                Err(err) => {
                    return Err(PoolError::TapeReplayFailed {
                        tape,
                        batch,
                        attempts: attempt,
                        source: Box::new(err),
                    })
                }
            }
        }
    }

    /// Verifies the schedule, resolves every batch, then submits in order.
    /// Nothing is sent if verification or resolution fails.
    pub async fn run(&self, schedule: &Schedule, flow: &FlowAccounts) -> Result<ReplayReport> {
        schedule.verify()?;
        let resolved = schedule
            .batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|ix| ix.resolve(self.ctx, flow))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            tape = schedule.tape,
            batches = resolved.len(),
            instructions = schedule.instruction_count(),
            "replaying"
        );
        let mut report = ReplayReport {
            tape: schedule.tape,
            signatures: Vec::with_capacity(resolved.len()),
            instructions: schedule.instruction_count(),
        };
        for (index, batch) in resolved.iter().enumerate() {
            let signature = self.submit_with_retry(schedule.tape, index, batch).await?;
            debug!(tape = schedule.tape, batch = index, size = batch.len(), %signature, "batch confirmed");
            report.signatures.push(signature);
        }
        Ok(report)
    }

    /// Rent-exempt account at `create_with_seed(payer, seed, owner)`.
    pub async fn create_account(
        &self,
        seed: &str,
        space: usize,
        owner: &Pubkey,
    ) -> Result<(Pubkey, ReplayReport)> {
        let lamports = self.ledger.minimum_rent(space).await?;
        let pubkey = Pubkey::create_with_seed(&self.ctx.payer, seed, owner)?;
        let schedule = Schedule {
            tape: TAPE_CREATE_ACCOUNT,
            batches: vec![vec![Instruction::CreateAccountWithSeed {
                base: self.ctx.payer,
                seed: seed.to_string(),
                lamports,
                space: space as u64,
                owner: *owner,
            }]],
            golden: None,
        };
        let report = self.run(&schedule, &FlowAccounts::new(self.ctx)).await?;
        info!(%pubkey, space, "account created");
        Ok((pubkey, report))
    }

    async fn create_scratch(&self, seed: String, space: usize, owner: &Pubkey) -> Result<Pubkey> {
        self.create_account(&seed, space, owner).await.map(|(pubkey, _)| pubkey)
    }

    pub async fn init_tree(&self) -> Result<ReplayReport> {
        let schedule = Schedule {
            tape: TAPE_INIT_TREE,
            batches: vec![vec![Instruction::InitTree]],
            golden: None,
        };
        self.run(&schedule, &FlowAccounts::new(self.ctx)).await
    }

    /// Deposits `lamports` and appends `leaf` to the on-chain tree.
    pub async fn insert_leaf<R: RngCore + ?Sized>(
        &self,
        leaf: &FieldElement,
        lamports: u64,
        rng: &mut R,
    ) -> Result<ReplayReport> {
        let (hash_seed, deposit_seed) = (scratch_seed(rng), scratch_seed(rng));
        let program = self.ctx.verifier_program;
        let hash_tmp = self.create_scratch(hash_seed, HASH_TMP_ACCOUNT_SIZE, &program).await?;
        let deposit_tmp = self
            .create_scratch(deposit_seed, DEPOSIT_TMP_ACCOUNT_SIZE, &program)
            .await?;

        let mut flow = FlowAccounts::new(self.ctx);
        flow.hash_tmp = Some(hash_tmp);
        flow.deposit_tmp = Some(deposit_tmp);
        let schedule = insert_schedule(
            leaf,
            deposit_tmp,
            lamports,
            self.constants.merkle_tree_levels,
            &self.constants.batch_limits,
        );
        self.run(&schedule, &flow).await
    }

    pub async fn prepare_inputs(&self, prepare_inputs: Pubkey, proof: &ProofOutput) -> Result<ReplayReport> {
        let schedule = prepare_inputs_schedule(&proof.prepared_inputs_bytes()?, &self.constants.batch_limits)?;
        let mut flow = FlowAccounts::new(self.ctx);
        flow.prepare_inputs = Some(prepare_inputs);
        self.run(&schedule, &flow).await
    }

    pub async fn miller_loop(&self, accounts: &VerifierAccounts, proof: &ProofBytes) -> Result<ReplayReport> {
        let schedule = miller_loop_schedule(proof, &self.constants.batch_limits);
        let mut flow = FlowAccounts::new(self.ctx);
        flow.prepare_inputs = Some(accounts.prepare_inputs);
        flow.miller_loop = Some(accounts.miller_loop);
        flow.final_exp = Some(accounts.final_exp);
        self.run(&schedule, &flow).await
    }

    /// Funds move from `withdraw_from` to `withdraw_to` in the last batch.
    pub async fn final_exponentiation(
        &self,
        final_exp: Pubkey,
        withdraw_from: Pubkey,
        withdraw_to: Pubkey,
    ) -> Result<ReplayReport> {
        let schedule = final_exp_schedule(&self.constants.batch_limits);
        let mut flow = FlowAccounts::new(self.ctx);
        flow.final_exp = Some(final_exp);
        flow.withdraw_from = Some(withdraw_from);
        flow.withdraw_to = Some(withdraw_to);
        self.run(&schedule, &flow).await
    }

    /// Creates the three verifier accounts, then prepare-inputs, Miller loop
    /// and final exponentiation, each finishing before the next starts.
    pub async fn verify_and_withdraw<R: RngCore + ?Sized>(
        &self,
        proof: &ProofOutput,
        recipient: Pubkey,
        rng: &mut R,
    ) -> Result<Vec<ReplayReport>> {
        // All seeds are drawn before the first await.
        let seeds = [scratch_seed(rng), scratch_seed(rng), scratch_seed(rng)];
        let [miller_seed, final_seed, prepare_seed] = seeds;
        let verifier = self.ctx.verifier_program;
        let accounts = VerifierAccounts {
            miller_loop: self.create_scratch(miller_seed, VERIFIER_ACCOUNT_SIZE, &verifier).await?,
            final_exp: self.create_scratch(final_seed, VERIFIER_ACCOUNT_SIZE, &verifier).await?,
            prepare_inputs: self
                .create_scratch(prepare_seed, VERIFIER_ACCOUNT_SIZE, &self.ctx.prepare_inputs_program)
                .await?,
        };

        info!("preparing public inputs");
        let prepared = self.prepare_inputs(accounts.prepare_inputs, proof).await?;
        info!("running miller loop");
        let miller = self.miller_loop(&accounts, &proof.proof).await?;
        info!("running final exponentiation");
        let final_exp = self
            .final_exponentiation(accounts.final_exp, self.ctx.merkle_tree, recipient)
            .await?;
        Ok(vec![prepared, miller, final_exp])
    }
}

/// 15 random bytes as 30 hex chars; fits the 32-byte seed limit.
fn scratch_seed<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 15];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx() -> LedgerContext {
        LedgerContext {
            payer: Pubkey([1; 32]),
            verifier_program: Pubkey([2; 32]),
            prepare_inputs_program: Pubkey([3; 32]),
            merkle_tree: Pubkey([4; 32]),
            commitment: Default::default(),
        }
    }

    fn fast_constants() -> ProtocolConstants {
        let mut c = ProtocolConstants::default();
        c.retry.delay_ms = 1;
        c
    }

    #[test]
    fn test_miller_schedule_matches_trace() {
        let schedule = miller_loop_schedule(&ProofBytes::zeroed(), &BatchLimits::default());
        schedule.verify().unwrap();
        // pull, load, 13 tape batches, read
        assert_eq!(schedule.batches.len(), 2 + 13 + 1);
        assert_eq!(schedule.instruction_count(), MILLER_LOOP_TRACE.len());
    }

    #[test]
    fn test_prepare_inputs_schedule_shape() {
        let schedule = prepare_inputs_schedule(&[1; 192], &BatchLimits::default()).unwrap();
        schedule.verify().unwrap();
        assert_eq!(schedule.batches[0].len(), 52);
        let sizes: Vec<usize> = schedule.batches[1..6].iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1, 100, 100, 56, 1]);
        assert_eq!(schedule.batches.len(), 1 + 4 * 5 + 1);
    }

    #[test]
    fn test_final_exp_schedule_ends_with_withdraw() {
        let schedule = final_exp_schedule(&BatchLimits::default());
        schedule.verify().unwrap();
        let last = schedule.batches.last().unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last[4], Instruction::FinalExpWithdraw);
        assert!(schedule.batches[..schedule.batches.len() - 1]
            .iter()
            .all(|b| b.len() <= 80));
    }

    #[test]
    fn test_insert_schedule_skips_opening_entry() {
        let schedule = insert_schedule(&FieldElement::from_u64(7), Pubkey([9; 32]), 10, 11, &BatchLimits::default());
        assert_eq!(schedule.batches[0].len(), 3);
        let steps: usize = schedule.batches[1..].iter().map(Vec::len).sum();
        assert_eq!(steps, insert_tape(11).len() - 1);
        assert_eq!(schedule.batches[1].len(), 99);
        assert_eq!(schedule.trace()[..2], [34, 1]);
    }

    #[test]
    fn test_divergent_trace_is_protocol_invariant() {
        let mut schedule = miller_loop_schedule(&ProofBytes::zeroed(), &BatchLimits::default());
        schedule.batches[2][0] = Instruction::MillerStep { opcode: 254 };
        match schedule.verify() {
            Err(PoolError::ProtocolInvariant { position, expected, found, .. }) => {
                assert_eq!(position, 3);
                assert_eq!(expected, Some(MILLER_LOOP_TRACE[3]));
                assert_eq!(found, Some(254));
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut short = final_exp_schedule(&BatchLimits::default());
        short.batches.pop();
        assert!(matches!(
            short.verify(),
            Err(PoolError::ProtocolInvariant { found: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_one_failure() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        ledger.fail_next(1);
        let report = engine.init_tree().await.unwrap();
        assert_eq!(report.signatures.len(), 1);
        assert_eq!(ledger.submission_count(), 1);
        assert_eq!(ledger.submissions()[0].instructions[0].data, vec![240, 0, 1]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_with_batch_context() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        ledger.fail_next(2);
        let err = engine.init_tree().await.unwrap_err();
        match err {
            PoolError::TapeReplayFailed { tape, batch, attempts, source } => {
                assert_eq!((tape, batch, attempts), (TAPE_INIT_TREE, 0, 2));
                assert!(source.is_transient());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_account_stops_before_submission() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        let schedule = miller_loop_schedule(&ProofBytes::zeroed(), &constants.batch_limits);
        let err = engine.run(&schedule, &FlowAccounts::new(&ctx)).await.unwrap_err();
        assert!(matches!(err, PoolError::MissingAccount(_)));
        assert_eq!(ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_insert_leaf_creates_scratch_accounts() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        let mut rng = StdRng::seed_from_u64(3);
        let report = engine.insert_leaf(&FieldElement::from_u64(5), 1_000, &mut rng).await.unwrap();
        assert_eq!(report.tape, TAPE_INSERT);
        // two account creations, the deposit batch and four hashing batches
        assert_eq!(ledger.submission_count(), 2 + 1 + 4);
        let found = ledger
            .accounts_by_size(&ctx.verifier_program, HASH_TMP_ACCOUNT_SIZE)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
