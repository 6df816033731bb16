//! The public engine (§5, §6): a cheaply-cloneable handle around the single
//! reader-writer lock that serializes every consensus mutation.

use crate::block::Block;
use crate::block_tree::BlockTree;
use crate::currency::Currency;
use crate::error::{ConsensusError, Result};
use crate::fork::accept_block as fork_accept_block;
use crate::id::{merkle_root, hash_encodable, BlockID, FileContractID, Hash, SiacoinOutputID, SiafundOutputID};
use crate::params::{ConsensusParameters, Network};
use crate::state::ConsensusSet;
use crate::subscribe::SubscriptionBus;
use crate::target::{Depth, Target};
use crate::transaction::{FileContract, SiacoinOutput, SiafundOutput, Transaction};
use crate::unlock::BlockHeight;
use crate::validation::{validate_contextual, validate_standalone, verify_storage_proof};
use parking_lot::RwLock;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

struct Inner {
    tree: BlockTree,
    set: ConsensusSet,
}

/// The outward-facing handle: `Arc<RwLock<Inner>>` plus the immutable
/// parameters and the subscriber list (its own lock, independent of
/// consensus-mutation frequency per §5).
#[derive(Clone)]
pub struct Consensus {
    inner: Arc<RwLock<Inner>>,
    params: Arc<ConsensusParameters>,
    subscribers: Arc<SubscriptionBus>,
    genesis: Arc<Block>,
}

impl Consensus {
    pub fn new(network: Network) -> Self {
        let params = ConsensusParameters::from_network(network);
        Self::from_params(params)
    }

    /// Builds an engine from an explicit parameter set (used by tests that
    /// need [`ConsensusParameters::test`] rather than a named network).
    pub fn from_params(params: ConsensusParameters) -> Self {
        let genesis = Block::genesis(params.genesis_timestamp, params.siafund_count, &params.genesis_claim_unlock_conditions);
        let tree = BlockTree::new(genesis.clone(), &params);
        let mut set = ConsensusSet::new(&params);
        seed_genesis_outputs(&mut set, &genesis);
        Consensus {
            inner: Arc::new(RwLock::new(Inner { tree, set })),
            params: Arc::new(params),
            subscribers: Arc::new(SubscriptionBus::new()),
            genesis: Arc::new(genesis),
        }
    }

    pub fn genesis_block(&self) -> Block {
        (*self.genesis).clone()
    }

    pub fn accept_block(&self, block: Block) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs();
        let mut inner = self.inner.write();
        let tip_changed = fork_accept_block(&mut inner.tree, &mut inner.set, &self.params, block, now)?;
        drop(inner);
        if tip_changed {
            info!("consensus tip changed, notifying subscribers");
            self.subscribers.notify_all();
        }
        Ok(())
    }

    pub fn current_block(&self) -> Block {
        let inner = self.inner.read();
        inner.tree.node(inner.tree.tip_index()).block.clone()
    }

    pub fn current_target(&self) -> Target {
        let inner = self.inner.read();
        inner.tree.node(inner.tree.tip_index()).target_for_children
    }

    pub fn current_depth(&self) -> Depth {
        let inner = self.inner.read();
        inner.tree.node(inner.tree.tip_index()).depth
    }

    pub fn height(&self) -> BlockHeight {
        self.inner.read().tree.height()
    }

    pub fn current_path(&self) -> Vec<BlockID> {
        let inner = self.inner.read();
        (0..=inner.tree.height()).filter_map(|h| inner.tree.id_at_height(h)).collect()
    }

    pub fn earliest_timestamp(&self) -> u64 {
        let inner = self.inner.read();
        inner.tree.earliest_child_timestamp(inner.tree.tip_index(), &self.params)
    }

    pub fn state_hash(&self) -> Hash {
        let inner = self.inner.read();
        compute_state_hash(&inner.tree, &inner.set, &self.genesis, &self.params)
    }

    pub fn block_at_height(&self, h: BlockHeight) -> Option<Block> {
        let inner = self.inner.read();
        let id = inner.tree.id_at_height(h)?;
        let idx = inner.tree.index_of(&id)?;
        Some(inner.tree.node(idx).block.clone())
    }

    pub fn block(&self, id: BlockID) -> Option<Block> {
        let inner = self.inner.read();
        let idx = inner.tree.index_of(&id)?;
        Some(inner.tree.node(idx).block.clone())
    }

    pub fn height_of_block(&self, id: BlockID) -> Option<BlockHeight> {
        let inner = self.inner.read();
        let idx = inner.tree.index_of(&id)?;
        Some(inner.tree.node(idx).height)
    }

    pub fn siacoin_output(&self, id: SiacoinOutputID) -> Option<SiacoinOutput> {
        self.inner.read().set.siacoin_outputs.get(&id).cloned()
    }

    pub fn file_contract(&self, id: FileContractID) -> Option<FileContract> {
        self.inner.read().set.file_contracts.get(&id).cloned()
    }

    pub fn siafund_output(&self, id: SiafundOutputID) -> Option<SiafundOutput> {
        self.inner.read().set.siafund_outputs.get(&id).cloned()
    }

    /// §4.2.1: the segment index a host must prove for `fcid` at the
    /// current height.
    pub fn storage_proof_segment(&self, fcid: FileContractID) -> Result<u64> {
        let inner = self.inner.read();
        let contract = inner.set.file_contracts.get(&fcid).ok_or(ConsensusError::UnknownContract(fcid))?;
        if contract.start == 0 {
            return Err(ConsensusError::TriggerBlockNotReached);
        }
        let trigger_id = inner.tree.id_at_height(contract.start - 1).ok_or(ConsensusError::TriggerBlockNotReached)?;
        Ok(crate::validation::segment_index(&trigger_id, &fcid, contract.file_size, self.params.segment_size))
    }

    pub fn valid_transaction(&self, tx: &Transaction) -> Result<()> {
        let inner = self.inner.read();
        let height = inner.tree.height() + 1;
        validate_standalone(tx, &self.params, height)?;
        validate_contextual(tx, &inner.set, height, &|h| inner.tree.id_at_height(h))
    }

    pub fn valid_storage_proofs(&self, tx: &Transaction) -> Result<()> {
        let inner = self.inner.read();
        for proof in &tx.storage_proofs {
            verify_storage_proof(proof, &inner.set, inner.tree.height(), &|h| inner.tree.id_at_height(h))?;
        }
        Ok(())
    }

    pub fn subscribe(&self) -> Receiver<()> {
        self.subscribers.subscribe()
    }

    /// Describes how to catch a peer up from `ancestor` to the current tip:
    /// the ids that would be removed (if `ancestor` isn't on the current
    /// path, the nodes between its last common ancestor with the tip and
    /// the tip) and the ids that would be added (the current path from
    /// there forward).
    pub fn blocks_since(&self, ancestor: BlockID) -> (Vec<BlockID>, Vec<BlockID>) {
        let inner = self.inner.read();
        if inner.tree.is_on_current_path(&ancestor) {
            let h = inner.tree.index_of(&ancestor).map(|idx| inner.tree.node(idx).height).unwrap_or(0);
            let added = ((h + 1)..=inner.tree.height()).filter_map(|height| inner.tree.id_at_height(height)).collect();
            return (Vec::new(), added);
        }
        match inner.tree.index_of(&ancestor) {
            Some(idx) => {
                let ancestor_path = inner.tree.path_to(idx);
                let tip_path = inner.tree.path_to(inner.tree.tip_index());
                let common = ancestor_path.iter().zip(tip_path.iter()).take_while(|(a, b)| a == b).count();
                let removed = ancestor_path[common..].iter().map(|&i| inner.tree.node(i).block.id()).collect();
                let added = tip_path[common..].iter().map(|&i| inner.tree.node(i).block.id()).collect();
                (removed, added)
            }
            None => (Vec::new(), inner.tree.path_to(inner.tree.tip_index()).iter().map(|&i| inner.tree.node(i).block.id()).collect()),
        }
    }

    /// Dry-run validates `txns` in sequence against the current tip, chaining
    /// each transaction's effects into the next so later transactions in the
    /// set can spend earlier ones' outputs; never touches the live state.
    /// Returns the total miner fee the set would pay (§6 additions).
    pub fn try_transaction_set(&self, txns: &[Transaction]) -> Result<Currency> {
        let inner = self.inner.read();
        let height = inner.tree.height() + 1;
        let mut scratch = inner.set.clone();
        let mut fees = Currency::zero();
        for tx in txns {
            crate::apply::transaction_diffs(tx, height, &mut scratch, &self.params, &|h| inner.tree.id_at_height(h))?;
            fees = fees.checked_add(&tx.miner_fee_sum());
        }
        Ok(fees)
    }
}

fn seed_genesis_outputs(set: &mut ConsensusSet, genesis: &Block) {
    let tx = &genesis.transactions[0];
    for (i, output) in tx.siafund_outputs.iter().enumerate() {
        set.siafund_outputs.insert(tx.siafund_output_id(i), output.clone());
    }
}

/// Hashes a `(id, value)` pair's canonical encoding into one leaf, without
/// needing a generic tuple [`Encodable`] impl that would overlap the
/// `(&T, u64)` one `transaction.rs` already defines.
fn hash_pair<A: crate::encoding::Encodable, B: crate::encoding::Encodable>(a: &A, b: &B) -> Hash {
    let mut buf = Vec::new();
    a.encode(&mut buf);
    b.encode(&mut buf);
    crate::id::hash_bytes(&buf)
}

fn hash_triple<A: crate::encoding::Encodable, B: crate::encoding::Encodable, C: crate::encoding::Encodable>(a: &A, b: &B, c: &C) -> Hash {
    let mut buf = Vec::new();
    a.encode(&mut buf);
    b.encode(&mut buf);
    c.encode(&mut buf);
    crate::id::hash_bytes(&buf)
}

pub(crate) fn compute_state_hash(tree: &BlockTree, set: &ConsensusSet, genesis: &Block, params: &ConsensusParameters) -> Hash {
    let mut leaves = Vec::new();
    leaves.push(hash_encodable(&genesis.id()));
    leaves.push(hash_encodable(&tree.tip_id()));
    leaves.push(hash_encodable(&tree.height()));
    leaves.push(hash_encodable(&tree.node(tree.tip_index()).target_for_children));
    leaves.push(hash_encodable(&tree.node(tree.tip_index()).depth));
    leaves.push(hash_encodable(&tree.earliest_child_timestamp(tree.tip_index(), params)));
    for h in 0..=tree.height() {
        if let Some(id) = tree.id_at_height(h) {
            leaves.push(hash_encodable(&id));
        }
    }

    let mut siacoin_ids: Vec<_> = set.siacoin_outputs.keys().copied().collect();
    siacoin_ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    for id in siacoin_ids {
        leaves.push(hash_pair(&id, &set.siacoin_outputs[&id]));
    }

    let mut contract_ids: Vec<_> = set.file_contracts.keys().copied().collect();
    contract_ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    for id in contract_ids {
        leaves.push(hash_pair(&id, &set.file_contracts[&id]));
    }

    let mut siafund_ids: Vec<_> = set.siafund_outputs.keys().copied().collect();
    siafund_ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    for id in siafund_ids {
        leaves.push(hash_pair(&id, &set.siafund_outputs[&id]));
    }

    for (&height, bucket) in &set.delayed_siacoin_outputs {
        let mut ids: Vec<_> = bucket.keys().copied().collect();
        ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        for id in ids {
            leaves.push(hash_triple(&height, &id, &bucket[&id]));
        }
    }

    merkle_root(&leaves)
}
