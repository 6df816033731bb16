//! Fork-choice determinism and atomic rollback on a failed reorg (§4.7).

use sia_consensus::block::Block;
use sia_consensus::consensus::Consensus;
use sia_consensus::id::{BlockID, Hash, UnlockHash};
use sia_consensus::params::ConsensusParameters;
use sia_consensus::transaction::SiacoinOutput;
use sia_consensus::{ConsensusError, Result};

fn burn_hash() -> UnlockHash {
    UnlockHash(Hash::ZERO)
}

fn mine(consensus: &Consensus, parent_id: BlockID, timestamp: u64, height: u64, params: &ConsensusParameters) -> Result<BlockID> {
    let block = Block {
        parent_id,
        timestamp,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(height), unlock_hash: burn_hash() }],
        transactions: vec![],
    };
    let id = block.id();
    consensus.accept_block(block)?;
    Ok(id)
}

/// A two-block side chain accumulates enough depth to overtake a one-block
/// chain that was accepted first, and the current path switches to it.
#[test]
fn longer_fork_overtakes_the_tip_by_depth() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let genesis_id = consensus.genesis_block().id();

    let b1 = mine(&consensus, genesis_id, params.genesis_timestamp + 10, 1, &params).unwrap();
    assert_eq!(consensus.height(), 1);
    assert_eq!(consensus.current_path(), vec![genesis_id, b1]);

    let c1 = mine(&consensus, genesis_id, params.genesis_timestamp + 20, 1, &params).unwrap();
    // A same-height sibling must not dethrone the incumbent tip (ties favor
    // whichever branch was accepted first).
    assert_eq!(consensus.current_path(), vec![genesis_id, b1]);

    let c2 = mine(&consensus, c1, params.genesis_timestamp + 30, 2, &params).unwrap();
    assert_eq!(consensus.height(), 2);
    assert_eq!(consensus.current_path(), vec![genesis_id, c1, c2], "the two-block fork should have overtaken the one-block tip");

    let (removed, added) = consensus.blocks_since(b1);
    assert_eq!(removed, vec![b1]);
    assert_eq!(added, vec![c1, c2]);

    let (removed, added) = consensus.blocks_since(genesis_id);
    assert!(removed.is_empty());
    assert_eq!(added, vec![c1, c2]);
}

/// A block whose miner-payout sum is wrong still links into the tree (it
/// passes the cheap pre-checks) but fails when its diffs are generated;
/// accept_block must report the failure, mark it bad, and leave the tip and
/// live set exactly as they were (I7, §4.7 step 4a).
#[test]
fn invalid_extension_is_rejected_without_mutating_the_tip() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let genesis_id = consensus.genesis_block().id();

    let b1 = mine(&consensus, genesis_id, params.genesis_timestamp + 10, 1, &params).unwrap();
    assert_eq!(consensus.current_path(), vec![genesis_id, b1]);

    let bad_block = Block {
        parent_id: b1,
        timestamp: params.genesis_timestamp + 20,
        nonce: 0,
        miner_payouts: vec![], // wrong: should equal coinbase(2)
        transactions: vec![],
    };
    let bad_id = bad_block.id();
    let err = consensus.accept_block(bad_block).unwrap_err();
    assert_eq!(err, ConsensusError::MinerPayout);

    assert_eq!(consensus.height(), 1, "tip must not advance on a failed block");
    assert_eq!(consensus.current_path(), vec![genesis_id, b1]);

    // Resubmitting the same (now bad) block is rejected up front.
    let resubmit = Block { parent_id: b1, timestamp: params.genesis_timestamp + 20, nonce: 0, miner_payouts: vec![], transactions: vec![] };
    assert_eq!(resubmit.id(), bad_id);
    assert_eq!(consensus.accept_block(resubmit).unwrap_err(), ConsensusError::BadBlock(bad_id));
}

/// An already-known block (whether on the current path or not) is rejected
/// rather than silently re-applied.
#[test]
fn known_block_is_rejected() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let genesis_id = consensus.genesis_block().id();
    let b1_block = Block {
        parent_id: genesis_id,
        timestamp: params.genesis_timestamp + 10,
        nonce: 0,
        miner_payouts: vec![SiacoinOutput { value: params.coinbase(1), unlock_hash: burn_hash() }],
        transactions: vec![],
    };
    let duplicate = b1_block.clone();
    consensus.accept_block(b1_block).unwrap();
    let id = duplicate.id();
    assert_eq!(consensus.accept_block(duplicate).unwrap_err(), ConsensusError::BlockKnown(id));
}

/// A two-block candidate fork outweighs the tip and starts rolling forward;
/// its first block applies cleanly, but its second fails validation. The
/// unwind path must revert the already-applied first block (not just the
/// reverted incumbent) before restoring the original tip exactly (§4.7 step
/// 4, fork.rs's `reorg` with a non-empty `applied`).
#[test]
fn second_block_of_overtaking_fork_fails_and_unwinds_the_first() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let genesis_id = consensus.genesis_block().id();

    let b1 = mine(&consensus, genesis_id, params.genesis_timestamp + 10, 1, &params).unwrap();
    assert_eq!(consensus.current_path(), vec![genesis_id, b1]);

    // c1 is a valid sibling of b1; alone it doesn't overtake (tie), so it's
    // linked into the tree without its diffs ever being generated.
    let c1 = mine(&consensus, genesis_id, params.genesis_timestamp + 20, 1, &params).unwrap();
    assert_eq!(consensus.current_path(), vec![genesis_id, b1]);

    let state_hash_before = consensus.state_hash();

    // c2 extends c1 with a wrong miner-payout sum. The two-block c1/c2 fork
    // still outweighs the one-block tip by depth, so accept_block attempts a
    // reorg: it must generate c1's diffs for the first time (rolling it
    // forward), then fail on c2, then unwind c1 and restore b1.
    let bad_c2 = Block {
        parent_id: c1,
        timestamp: params.genesis_timestamp + 30,
        nonce: 0,
        miner_payouts: vec![], // wrong: should equal coinbase(2)
        transactions: vec![],
    };
    let bad_c2_id = bad_c2.id();
    let err = consensus.accept_block(bad_c2).unwrap_err();
    assert_eq!(err, ConsensusError::MinerPayout);

    assert_eq!(consensus.height(), 1, "tip must not advance when the overtaking fork fails partway");
    assert_eq!(consensus.current_path(), vec![genesis_id, b1], "the original tip must be restored exactly, not left mid-unwind");
    assert_eq!(consensus.state_hash(), state_hash_before, "a failed reorg must leave the state hash unchanged (I7)");

    // The bad block itself is marked bad; c1 is still known (and can still
    // accept other children) even though it never made it onto current_path.
    assert_eq!(consensus.accept_block(Block { parent_id: c1, timestamp: params.genesis_timestamp + 30, nonce: 0, miner_payouts: vec![], transactions: vec![] }).unwrap_err(), ConsensusError::BadBlock(bad_c2_id));
}

/// An orphan (parent not yet known) is reported distinctly and doesn't touch
/// the tree; once its parent arrives it is still not auto-replayed (the
/// engine surfaces the orphan relationship for the caller to retry, it
/// doesn't queue retries itself).
#[test]
fn orphan_block_is_reported() {
    let params = ConsensusParameters::test();
    let consensus = Consensus::from_params(params.clone());
    let unknown_parent = BlockID(Hash([0x42; 32]));
    let block = Block { parent_id: unknown_parent, timestamp: params.genesis_timestamp + 10, nonce: 0, miner_payouts: vec![], transactions: vec![] };
    let id = block.id();
    assert_eq!(consensus.accept_block(block).unwrap_err(), ConsensusError::Orphan(id));
    assert_eq!(consensus.height(), 0);
}
