#[cfg(test)]
mod scenarios {
    use light_pool_lib::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "seed phrase used by the cross-module scenarios";

    fn token() -> Pubkey {
        Pubkey([0x33; 32])
    }

    fn constants() -> ProtocolConstants {
        let mut c = ProtocolConstants::default();
        c.asset_lookup_table.push(token());
        c
    }

    #[test]
    fn test_single_leaf_tree() {
        let mut tree = MerkleTree::new(11).unwrap();
        let leaf = FieldElement::from_u64(123);
        tree.insert(leaf).unwrap();

        assert_eq!(tree.index_of(&leaf), Some(0));
        let path = tree.path(0).unwrap();
        assert_eq!(path.path_elements.len(), 11);
        assert!(tree.verify_path(&leaf, &path, &tree.root()).unwrap());
    }

    #[test]
    fn test_token_utxo_encryption() {
        let mut rng = StdRng::seed_from_u64(7);
        let constants = constants();
        let keypair = Keypair::from_seed(SEED).unwrap();
        let utxo = Utxo::new(keypair.clone(), &[Pubkey::SYSTEM, token()], &[0, 5], &mut rng).unwrap();
        let commitment = utxo.commitment().unwrap();

        let encrypted = utxo.encrypt(&constants, &mut rng).unwrap();
        let opened = Utxo::decrypt(&encrypted, &keypair, &commitment, 3, &constants).unwrap();
        assert_eq!(opened.amounts()[1], 5);
        assert_eq!(opened.assets()[1], token());
        assert_eq!(opened.index(), Some(3));

        let stranger = Keypair::from_seed("a different seed phrase entirely, also long").unwrap();
        assert!(Utxo::decrypt(&encrypted, &stranger, &commitment, 3, &constants).is_none());
    }

    #[test]
    fn test_deposit_note_string() {
        let nullifier = [0x0a; 32];
        let secret = [0x0b; 32];
        let text = format!("light-SOL-1.5-0x{}{}", hex::encode(nullifier), hex::encode(secret));

        let note = DepositNote::parse(&text).unwrap();
        assert_eq!(note.currency, "SOL");
        assert_eq!(note.amount, "1.5");

        let rebuilt = DepositNote {
            currency: "SOL".into(),
            amount: "1.5".into(),
            nullifier,
            secret,
        };
        assert_eq!(note.commitment().unwrap(), rebuilt.commitment().unwrap());
        assert_eq!(note.nullifier_hash().unwrap(), rebuilt.nullifier_hash().unwrap());
        assert_eq!(rebuilt.to_string(), text);
    }

    #[test]
    fn test_self_deposit_has_no_fee() {
        let mut rng = StdRng::seed_from_u64(4);
        let keypair = Keypair::from_seed(SEED).unwrap();
        let out = Utxo::new(keypair, &[Pubkey::SYSTEM, token()], &[0, 10], &mut rng).unwrap();
        let request = TransactionRequest::new(Action::Shield, Pubkey([1; 32]), Pubkey([2; 32])).with_outputs(vec![out]);
        let tree = MerkleTree::new(11).unwrap();
        let params = TransactionParameters::build(request, &tree, &constants(), &mut rng).unwrap();

        assert_eq!(params.public_amount_spl, FieldElement::from_u64(10));
        assert_eq!(params.public_amount_sol, FieldElement::zero());
        assert_eq!(params.relayer.fee, 0);
        assert_eq!(params.root, tree.root());

        let json = serde_json::to_value(params.proof_input()).unwrap();
        assert_eq!(json["publicAmountSpl"], "10");
        assert_eq!(json["txIntegrityHash"], json["internalTxIntegrityHash"]);
    }
}

#[cfg(test)]
mod replay {
    use light_pool_lib::instruction::Selector;
    use light_pool_lib::replay::{final_exp_schedule, TAPE_CREATE_ACCOUNT};
    use light_pool_lib::tapes::{prepare_inputs_trace, FINAL_EXP_TAPE, MILLER_LOOP_TRACE};
    use light_pool_lib::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx() -> LedgerContext {
        LedgerContext {
            payer: Pubkey([1; 32]),
            verifier_program: Pubkey([2; 32]),
            prepare_inputs_program: Pubkey([3; 32]),
            merkle_tree: Pubkey([4; 32]),
            commitment: CommitmentLevel::Finalized,
        }
    }

    fn fast_constants() -> ProtocolConstants {
        let mut c = ProtocolConstants::default();
        c.retry.delay_ms = 1;
        c
    }

    fn proof() -> ProofOutput {
        ProofOutput {
            proof: ProofBytes::zeroed(),
            public_inputs: (1..=6).map(FieldElement::from_u64).collect(),
        }
    }

    /// First data bytes of every submitted instruction matching `keep`.
    fn submitted_opcodes(ledger: &MemoryLedger, keep: impl Fn(&Pubkey, &[u8]) -> bool) -> Vec<u8> {
        ledger
            .submissions()
            .iter()
            .flat_map(|s| s.instructions.iter())
            .filter(|ix| keep(&ix.program_id, &ix.data))
            .map(|ix| ix.data[0])
            .collect()
    }

    #[tokio::test]
    async fn test_verification_submits_golden_traces() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        let mut rng = StdRng::seed_from_u64(11);

        let recipient = Pubkey([9; 32]);
        let reports = engine.verify_and_withdraw(&proof(), recipient, &mut rng).await.unwrap();
        assert_eq!(reports.len(), 3);

        let prepare = submitted_opcodes(&ledger, |program, _| *program == ctx.prepare_inputs_program);
        assert_eq!(prepare, prepare_inputs_trace());

        let miller = submitted_opcodes(&ledger, |program, data| {
            *program == ctx.verifier_program && data.len() >= 2 && data[1] == Selector::MillerLoop as u8
        });
        assert_eq!(miller, MILLER_LOOP_TRACE.to_vec());

        let final_exp = submitted_opcodes(&ledger, |program, data| {
            *program == ctx.verifier_program && data.len() >= 2 && data[1] == Selector::FinalExp as u8
        });
        assert_eq!(final_exp, final_exp_schedule(&constants.batch_limits).trace());
        assert_eq!(final_exp.len(), FINAL_EXP_TAPE.len());
        assert_eq!(final_exp.last(), Some(&103));

        // Withdrawal moves funds from the pool account to the recipient.
        let last = ledger.submissions().last().cloned().unwrap();
        let withdraw = last.instructions.last().unwrap();
        let keys: Vec<Pubkey> = withdraw.accounts.iter().map(|a| a.pubkey).collect();
        assert!(keys.contains(&ctx.merkle_tree));
        assert!(keys.contains(&recipient));
        assert!(ledger.submissions().iter().all(|s| s.commitment == CommitmentLevel::Finalized));
    }

    #[tokio::test]
    async fn test_batches_keep_submission_order() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        let mut rng = StdRng::seed_from_u64(12);
        engine.verify_and_withdraw(&proof(), Pubkey([9; 32]), &mut rng).await.unwrap();

        // Three account creations, then every prepare batch before any
        // miller batch, and every miller batch before any final-exp batch.
        let phases: Vec<u8> = ledger
            .submissions()
            .iter()
            .map(|s| {
                let ix = &s.instructions[0];
                if ix.program_id == Pubkey::SYSTEM {
                    0
                } else if ix.program_id == ctx.prepare_inputs_program {
                    1
                } else if ix.data[1] == Selector::MillerLoop as u8 {
                    2
                } else {
                    3
                }
            })
            .collect();
        assert_eq!(&phases[..3], &[0, 0, 0]);
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_exhausted_retries_stop_the_flow() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = fast_constants();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        let mut rng = StdRng::seed_from_u64(13);
        ledger.fail_next(constants.retry.attempts);

        let err = engine
            .verify_and_withdraw(&proof(), Pubkey([9; 32]), &mut rng)
            .await
            .unwrap_err();
        match err {
            PoolError::TapeReplayFailed { tape, batch, attempts, .. } => {
                assert_eq!(tape, TAPE_CREATE_ACCOUNT);
                assert_eq!(batch, 0);
                assert_eq!(attempts, constants.retry.attempts);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.submission_count(), 0);
    }
}

#[cfg(test)]
mod deposit_and_sync {
    use light_pool_lib::sync::{
        check_deposit, nullifier_marker, parse_storage_account, sync_balance, LeavesAccount, LEAVES_ENCRYPTED_LEN,
    };
    use light_pool_lib::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "seed phrase used by the deposit and sync scenarios";

    fn ctx() -> LedgerContext {
        LedgerContext {
            payer: Pubkey([1; 32]),
            verifier_program: Pubkey([2; 32]),
            prepare_inputs_program: Pubkey([3; 32]),
            merkle_tree: Pubkey([4; 32]),
            commitment: CommitmentLevel::Finalized,
        }
    }

    #[tokio::test]
    async fn test_deposit_note_found_in_storage() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = ProtocolConstants::default();
        let engine = ReplayEngine::new(&ledger, &ctx, &constants);
        let mut rng = StdRng::seed_from_u64(21);

        let note = DepositNote::generate("SOL", "0.1", &mut rng).unwrap();
        let commitment = note.commitment().unwrap();
        let report = engine.insert_leaf(&commitment, 100_000_000, &mut rng).await.unwrap();
        assert!(!report.signatures.is_empty());

        // The in-memory ledger does not run the tree program; write the
        // storage account the program would have produced.
        let snapshot = StorageSnapshot {
            height: constants.merkle_tree_levels as u64,
            next_index: 2,
            leaves: vec![FieldElement::from_u64(1).to_le_bytes(), commitment.to_le_bytes()],
            nullifiers: vec![],
        };
        ledger.set_account(ctx.merkle_tree, ctx.verifier_program, snapshot.to_bytes());

        let data = ledger.get_account(&ctx.merkle_tree).await.unwrap().unwrap();
        let parsed = parse_storage_account(&data, constants.merkle_tree_levels).unwrap();
        let status = check_deposit(&note, &parsed).unwrap();
        assert_eq!(status.leaf_position, Some(1));
        assert!(status.is_last_leaf);
        assert!(!status.found_nullifier);
        assert_eq!(parsed.tree().unwrap().index_of(&commitment), Some(1));
    }

    #[tokio::test]
    async fn test_shield_sync_unshield() {
        let ledger = MemoryLedger::new();
        let ctx = ctx();
        let constants = ProtocolConstants::default();
        let keypair = Keypair::from_seed(SEED).unwrap();
        let mut rng = StdRng::seed_from_u64(22);

        let publish = |params: &TransactionParameters, pair: u64| {
            let account = LeavesAccount {
                left_index: pair * 2,
                merkle_tree: ctx.merkle_tree,
                left: params.output_commitments[0],
                right: params.output_commitments[1],
                encrypted_outputs: params.encrypted_outputs[..LEAVES_ENCRYPTED_LEN].to_vec(),
            };
            ledger.set_account(Pubkey([0x40 + pair as u8; 32]), ctx.verifier_program, account.to_bytes());
            for nullifier in &params.input_nullifiers {
                let marker = nullifier_marker(&ctx, nullifier).unwrap();
                ledger.set_account(marker, ctx.verifier_program, Vec::new());
            }
        };

        let out = Utxo::new(keypair.clone(), &[Pubkey::SYSTEM], &[500], &mut rng).unwrap();
        let shield = TransactionParameters::build(
            TransactionRequest::new(Action::Shield, ctx.payer, ctx.merkle_tree).with_outputs(vec![out]),
            &MerkleTree::new(constants.merkle_tree_levels).unwrap(),
            &constants,
            &mut rng,
        )
        .unwrap();
        publish(&shield, 0);

        let state = sync_balance(&ledger, &ctx, &keypair, &constants).await.unwrap();
        assert_eq!(state.tree.len(), 2);
        assert_eq!(state.balance.total_amounts()[&Pubkey::SYSTEM], (500, 0));

        let inputs = state.balance.select_inputs(&Pubkey::SYSTEM, 210, constants.inputs).unwrap();
        let change = Utxo::new(keypair.clone(), &[Pubkey::SYSTEM], &[290], &mut rng).unwrap();
        let unshield = TransactionParameters::build(
            TransactionRequest::new(Action::Unshield, ctx.payer, ctx.merkle_tree)
                .with_inputs(inputs)
                .with_outputs(vec![change])
                .with_relayer(ctx.payer, 10)
                .with_recipient_sol(Pubkey([9; 32])),
            &state.tree,
            &constants,
            &mut rng,
        )
        .unwrap();
        assert_eq!(unshield.public_amount_sol, -FieldElement::from_u64(210));
        publish(&unshield, 1);

        let state = sync_balance(&ledger, &ctx, &keypair, &constants).await.unwrap();
        let native = &state.balance.tokens[&Pubkey::SYSTEM];
        assert_eq!(native.spent_utxos.len(), 1);
        assert_eq!(native.totals(), (290, 0));
        assert_eq!(state.tree.len(), 4);
    }
}

#[cfg(test)]
mod properties {
    use light_pool_lib::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "seed phrase used by the property tests only";

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_every_path_leads_to_root(values in prop::collection::vec(1u64..u64::MAX, 1..20)) {
            let leaves: Vec<FieldElement> = values.iter().copied().map(FieldElement::from_u64).collect();
            let tree = MerkleTree::with_elements(5, &leaves).unwrap();
            let root = tree.root();
            for (i, leaf) in leaves.iter().enumerate() {
                let path = tree.path(i).unwrap();
                prop_assert_eq!(path.leaf_index(), i as u64);
                prop_assert!(tree.verify_path(leaf, &path, &root).unwrap());
            }
        }

        #[test]
        fn test_public_amount_balances(
            (input, change) in (1u64..1_000_000).prop_flat_map(|i| (Just(i), 0..=i)),
            fee in 0u64..1_000,
        ) {
            let mut rng = StdRng::seed_from_u64(input ^ change);
            let keypair = Keypair::from_seed(SEED).unwrap();
            let constants = ProtocolConstants::default();
            let note = Utxo::new(keypair.clone(), &[Pubkey::SYSTEM], &[input], &mut rng).unwrap();
            let out = Utxo::new(keypair, &[Pubkey::SYSTEM], &[change], &mut rng).unwrap();
            let mut tree = MerkleTree::new(4).unwrap();
            tree.insert(note.commitment().unwrap()).unwrap();

            let request = TransactionRequest::new(Action::Unshield, Pubkey([1; 32]), Pubkey([2; 32]))
                .with_inputs(vec![note])
                .with_outputs(vec![out])
                .with_relayer(Pubkey([3; 32]), fee)
                .with_recipient_sol(Pubkey([4; 32]));
            let params = TransactionParameters::build(request, &tree, &constants, &mut rng).unwrap();

            // Σ in + public = Σ out, in the field
            prop_assert_eq!(
                FieldElement::from_u64(input) + params.public_amount_sol,
                FieldElement::from_u64(change)
            );
            prop_assert_eq!(params.public_amount_spl, FieldElement::zero());
        }

        #[test]
        fn test_encryption_round_trip(sol in any::<u64>(), spl in any::<u64>(), index in 0u64..2048, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let token = Pubkey([0x44; 32]);
            let mut constants = ProtocolConstants::default();
            constants.asset_lookup_table.push(token);
            let keypair = Keypair::from_seed(SEED).unwrap();

            let utxo = Utxo::new(keypair.clone(), &[Pubkey::SYSTEM, token], &[sol, spl], &mut rng).unwrap();
            let commitment = utxo.commitment().unwrap();
            let encrypted = utxo.encrypt(&constants, &mut rng).unwrap();
            let opened = Utxo::decrypt(&encrypted, &keypair, &commitment, index, &constants).unwrap();

            prop_assert_eq!(opened.amounts(), [sol, spl]);
            prop_assert_eq!(opened.blinding(), utxo.blinding());
            prop_assert_eq!(opened.commitment().unwrap(), commitment);
        }
    }
}
