//! Fork-choice and reorganization (C7, §4.7).

use crate::apply::generate_diffs;
use crate::block::Block;
use crate::block_tree::{BlockTree, NodeIndex};
use crate::diff::{commit, Direction};
use crate::error::{ConsensusError, Result};
use crate::params::ConsensusParameters;
use crate::state::ConsensusSet;
use num_bigint::BigUint;
use tracing::{debug, warn};

/// §4.7's acceptance entry point. `now` is the caller's wall-clock time
/// (injected rather than read internally, so reorg/timestamp behavior is
/// deterministic under test). Returns whether the tip changed.
pub fn accept_block(tree: &mut BlockTree, set: &mut ConsensusSet, params: &ConsensusParameters, block: Block, now: u64) -> Result<bool> {
    let id = block.id();
    if tree.is_bad(&id) {
        return Err(ConsensusError::BadBlock(id));
    }
    if tree.contains(&id) {
        return Err(ConsensusError::BlockKnown(id));
    }
    let parent_idx = match tree.index_of(&block.parent_id) {
        Some(idx) => idx,
        None => {
            tree.add_orphan(block.parent_id, block);
            return Err(ConsensusError::Orphan(id));
        }
    };

    let parent = tree.node(parent_idx);
    if !parent.target_for_children.meets(&id) {
        return Err(ConsensusError::MissedTarget);
    }
    let earliest = tree.earliest_child_timestamp(parent_idx, params);
    if block.timestamp <= earliest {
        return Err(ConsensusError::EarlyTimestamp);
    }
    if block.timestamp > now + params.future_threshold {
        return Err(ConsensusError::FutureTimestamp(block.timestamp, now));
    }
    let encoded_len = block.encoded_len();
    if encoded_len > params.block_size_limit {
        return Err(ConsensusError::LargeBlock(encoded_len, params.block_size_limit));
    }

    let new_idx = tree.insert_child(parent_idx, block, params);
    debug!(height = tree.node(new_idx).height, "block linked into tree");

    let tip_idx = tree.tip_index();
    let new_depth = tree.node(new_idx).depth;
    let tip_depth = tree.node(tip_idx).depth;
    if !exceeds_by_surpass_threshold(&new_depth, &tip_depth, params) {
        return Ok(false);
    }

    warn!(new_height = tree.node(new_idx).height, "candidate fork exceeds tip weight, reorganizing");
    reorg(tree, set, params, new_idx)?;
    Ok(true)
}

fn exceeds_by_surpass_threshold(new_depth: &crate::target::Depth, tip_depth: &crate::target::Depth, params: &ConsensusParameters) -> bool {
    let new_big = new_depth.to_biguint();
    let tip_big = tip_depth.to_biguint();
    let denom = BigUint::from(params.surpass_threshold.denominator);
    let num = BigUint::from(params.surpass_threshold.numerator);
    tip_big * denom > new_big * (&denom + &num)
}

/// §4.7's reorg protocol: backtrack to the common ancestor, rewind the
/// current fork, roll forward the candidate. On any validation failure
/// while rolling forward, unwinds back to the original tip exactly (I7)
/// and marks the offending node (and its descendants) bad.
fn reorg(tree: &mut BlockTree, set: &mut ConsensusSet, params: &ConsensusParameters, target_idx: NodeIndex) -> Result<()> {
    let old_tip_idx = tree.tip_index();
    let old_path = tree.path_to(old_tip_idx);
    let new_path = tree.path_to(target_idx);

    let common_len = old_path.iter().zip(new_path.iter()).take_while(|(a, b)| a == b).count();
    let reverted: Vec<NodeIndex> = old_path[common_len..].iter().rev().copied().collect();
    let forward: Vec<NodeIndex> = new_path[common_len..].to_vec();

    for &idx in &reverted {
        let diffs = tree.node(idx).diffs.clone().expect("nodes on current_path always have diffs generated");
        commit(set, &diffs, Direction::Revert);
    }

    let mut applied: Vec<NodeIndex> = Vec::new();
    let mut failure: Option<ConsensusError> = None;
    for &idx in &forward {
        let height = tree.node(idx).height;
        let result = if tree.node(idx).diffs_generated {
            Ok(tree.node(idx).diffs.clone().unwrap())
        } else {
            let block = tree.node(idx).block.clone();
            let path_snapshot = current_path_ids(tree, &old_path[..common_len], &forward, &applied);
            generate_diffs(&block, height, set, params, &|h| path_snapshot.get(h as usize).copied())
        };
        match result {
            Ok(diffs) => {
                commit(set, &diffs, Direction::New);
                let node = tree.node_mut(idx);
                node.diffs = Some(diffs);
                node.diffs_generated = true;
                applied.push(idx);
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if let Some(e) = failure {
        let bad_idx = forward[applied.len()];
        let _removed = tree.mark_bad_recursive(bad_idx);
        for &idx in applied.iter().rev() {
            let diffs = tree.node(idx).diffs.clone().expect("just committed");
            commit(set, &diffs, Direction::Revert);
        }
        for &idx in &reverted {
            let diffs = tree.node(idx).diffs.clone().expect("previously generated");
            commit(set, &diffs, Direction::New);
        }
        return Err(e);
    }

    let mut new_path_ids: Vec<_> = old_path[..common_len].iter().map(|&i| tree.node(i).block.id()).collect();
    new_path_ids.extend(forward.iter().map(|&i| tree.node(i).block.id()));
    tree.set_current_path(new_path_ids, target_idx);

    #[cfg(debug_assertions)]
    assert_replay_consistency(tree, set, params);

    Ok(())
}

/// §4.7's consistency check: after a successful reorg, recompute the
/// consensus-set hash from genesis by rewinding to root and rolling forward
/// along the new `current_path`, and assert it matches the hash already
/// reflected in the incrementally-maintained `set`. Debug-only since it
/// replays the whole chain.
#[cfg(debug_assertions)]
fn assert_replay_consistency(tree: &BlockTree, set: &ConsensusSet, params: &ConsensusParameters) {
    let genesis = tree.node(0).block.clone();
    let mut replay = ConsensusSet::new(params);
    let path = tree.path_to(tree.tip_index());
    for &idx in &path[1..] {
        let height = tree.node(idx).height;
        let block = tree.node(idx).block.clone();
        let diffs = generate_diffs(&block, height, &replay, params, &|h| tree.id_at_height(h))
            .expect("blocks already accepted onto current_path must re-validate identically");
        commit(&mut replay, &diffs, Direction::New);
    }
    let expected = crate::consensus::compute_state_hash(tree, set, &genesis, params);
    let actual = crate::consensus::compute_state_hash(tree, &replay, &genesis, params);
    assert_eq!(expected, actual, "state hash diverged after reorg replay");
}

/// Builds a height-indexed lookup of block ids usable mid-reorg, before
/// `current_path` itself has been updated: the common prefix plus whichever
/// prefix of the candidate fork has already rolled forward successfully
/// (`applied` is always `forward`'s first `applied.len()` entries, since
/// rolling forward proceeds strictly in order and stops at the first
/// failure).
fn current_path_ids(tree: &BlockTree, common: &[NodeIndex], forward: &[NodeIndex], applied: &[NodeIndex]) -> Vec<crate::id::BlockID> {
    let mut ids: Vec<_> = common.iter().map(|&i| tree.node(i).block.id()).collect();
    ids.extend(forward[..applied.len()].iter().map(|&i| tree.node(i).block.id()));
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unlock::UnlockConditions;

    fn genesis_tree_and_set() -> (BlockTree, ConsensusSet, ConsensusParameters) {
        let params = ConsensusParameters::test();
        let genesis = Block::genesis(params.genesis_timestamp, params.siafund_count, &params.genesis_claim_unlock_conditions);
        let tree = BlockTree::new(genesis, &params);
        let set = ConsensusSet::new(&params);
        (tree, set, params)
    }

    #[test]
    fn accepts_valid_empty_block() {
        let (mut tree, mut set, params) = genesis_tree_and_set();
        let parent_id = tree.tip_id();
        let block = Block {
            parent_id,
            timestamp: params.genesis_timestamp + 10,
            nonce: 0,
            miner_payouts: vec![crate::transaction::SiacoinOutput { value: params.coinbase(1), unlock_hash: crate::id::UnlockHash(crate::id::Hash::ZERO) }],
            transactions: vec![],
        };
        let changed = accept_block(&mut tree, &mut set, &params, block.clone(), params.genesis_timestamp + 20).unwrap();
        assert!(changed);
        assert_eq!(tree.id_at_height(1), Some(block.id()));
    }

    #[test]
    fn rejects_future_timestamp() {
        let (mut tree, mut set, params) = genesis_tree_and_set();
        let parent_id = tree.tip_id();
        let block = Block { parent_id, timestamp: params.genesis_timestamp + 100_000, nonce: 0, miner_payouts: vec![], transactions: vec![] };
        let err = accept_block(&mut tree, &mut set, &params, block, params.genesis_timestamp).unwrap_err();
        assert!(matches!(err, ConsensusError::FutureTimestamp(_, _)));
    }

    #[test]
    fn rejects_early_timestamp() {
        let (mut tree, mut set, params) = genesis_tree_and_set();
        let parent_id = tree.tip_id();
        let block = Block { parent_id, timestamp: params.genesis_timestamp, nonce: 0, miner_payouts: vec![], transactions: vec![] };
        let err = accept_block(&mut tree, &mut set, &params, block, params.genesis_timestamp + 10).unwrap_err();
        assert_eq!(err, ConsensusError::EarlyTimestamp);
    }

    #[test]
    fn orphan_is_reported_and_retriable() {
        let (mut tree, mut set, params) = genesis_tree_and_set();
        let unknown_parent = crate::id::BlockID(crate::id::Hash([9u8; 32]));
        let block = Block { parent_id: unknown_parent, timestamp: params.genesis_timestamp + 1, nonce: 0, miner_payouts: vec![], transactions: vec![] };
        let err = accept_block(&mut tree, &mut set, &params, block, params.genesis_timestamp + 10).unwrap_err();
        assert!(matches!(err, ConsensusError::Orphan(_)));
    }
}
