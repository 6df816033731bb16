//! Arena-based block-tree store (§4.4, §9 "block tree via pointers-and-arena").
//!
//! Nodes live in a flat `Vec` and reference each other by index rather than
//! by pointer, so the bad-block invalidation sweep (§4.7 step 4a) is a plain
//! iterative traversal with no ownership cycles to worry about.

use crate::block::Block;
use crate::diff::DiffSet;
use crate::id::BlockID;
use crate::params::ConsensusParameters;
use crate::target::{combine_depth, retarget, Depth, Target};
use crate::unlock::BlockHeight;
use std::collections::{HashMap, HashSet};

pub type NodeIndex = usize;

#[derive(Clone)]
pub struct BlockNode {
    pub block: Block,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub height: BlockHeight,
    pub depth: Depth,
    pub target_for_children: Target,
    pub diffs_generated: bool,
    pub diffs: Option<DiffSet>,
}

pub struct BlockTree {
    nodes: Vec<BlockNode>,
    block_map: HashMap<BlockID, NodeIndex>,
    bad_blocks: HashSet<BlockID>,
    orphans: HashMap<BlockID, HashMap<BlockID, Block>>,
    current_path: Vec<BlockID>,
    current_tip: NodeIndex,
}

impl BlockTree {
    pub fn new(genesis: Block, params: &ConsensusParameters) -> Self {
        let id = genesis.id();
        let node = BlockNode {
            block: genesis,
            parent: None,
            children: Vec::new(),
            height: 0,
            depth: params.root_depth,
            target_for_children: params.root_target,
            diffs_generated: false,
            diffs: None,
        };
        let mut block_map = HashMap::new();
        block_map.insert(id, 0);
        BlockTree {
            nodes: vec![node],
            block_map,
            bad_blocks: HashSet::new(),
            orphans: HashMap::new(),
            current_path: vec![id],
            current_tip: 0,
        }
    }

    pub fn contains(&self, id: &BlockID) -> bool {
        self.block_map.contains_key(id)
    }

    pub fn is_bad(&self, id: &BlockID) -> bool {
        self.bad_blocks.contains(id)
    }

    pub fn index_of(&self, id: &BlockID) -> Option<NodeIndex> {
        self.block_map.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &BlockNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut BlockNode {
        &mut self.nodes[idx]
    }

    pub fn tip_index(&self) -> NodeIndex {
        self.current_tip
    }

    pub fn tip_id(&self) -> BlockID {
        *self.current_path.last().expect("current_path always has the genesis entry")
    }

    pub fn height(&self) -> BlockHeight {
        (self.current_path.len() - 1) as BlockHeight
    }

    pub fn id_at_height(&self, h: BlockHeight) -> Option<BlockID> {
        self.current_path.get(h as usize).copied()
    }

    pub fn is_on_current_path(&self, id: &BlockID) -> bool {
        self.index_of(id)
            .map(|idx| self.id_at_height(self.nodes[idx].height) == Some(*id))
            .unwrap_or(false)
    }

    /// Inserts `block` as a child of `parent_idx`, computing its target and
    /// cumulative depth, but does not touch `current_path`/`current_tip`
    /// (that happens only once the node's diffs are committed, §4.6 step 6).
    pub fn insert_child(&mut self, parent_idx: NodeIndex, block: Block, params: &ConsensusParameters) -> NodeIndex {
        let id = block.id();
        let height = self.nodes[parent_idx].height + 1;
        let target_for_children = self.child_target(parent_idx, params);
        let parent = &self.nodes[parent_idx];
        let depth = combine_depth(&parent.target_for_children, &parent.depth);
        let node = BlockNode {
            block,
            parent: Some(parent_idx),
            children: Vec::new(),
            height,
            depth,
            target_for_children,
            diffs_generated: false,
            diffs: None,
        };
        let idx = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent_idx].children.push(idx);
        self.block_map.insert(id, idx);
        idx
    }

    /// The difficulty retarget (§4.1): looks back `target_window` blocks (or
    /// to genesis if shallower) from `parent_idx` and compares elapsed time
    /// against the expected duration for that many blocks.
    fn child_target(&self, parent_idx: NodeIndex, params: &ConsensusParameters) -> Target {
        let parent = &self.nodes[parent_idx];
        let mut ancestor_idx = parent_idx;
        let mut steps = 0u64;
        while steps < params.target_window {
            match self.nodes[ancestor_idx].parent {
                Some(p) => {
                    ancestor_idx = p;
                    steps += 1;
                }
                None => break,
            }
        }
        if steps == 0 {
            return parent.target_for_children;
        }
        let ancestor = &self.nodes[ancestor_idx];
        let time_passed = parent.block.timestamp as i64 - ancestor.block.timestamp as i64;
        let expected_time_passed = (params.block_frequency * steps) as i64;
        retarget(
            &parent.target_for_children,
            time_passed,
            expected_time_passed,
            params.max_adjustment_up.as_tuple(),
            params.max_adjustment_down.as_tuple(),
        )
    }

    /// Median of up to `median_timestamp_window` timestamps ending at and
    /// including `idx`, walking parent pointers (§4.1).
    pub fn earliest_child_timestamp(&self, idx: NodeIndex, params: &ConsensusParameters) -> u64 {
        let mut timestamps = Vec::with_capacity(params.median_timestamp_window);
        let mut cur = Some(idx);
        while let Some(i) = cur {
            timestamps.push(self.nodes[i].block.timestamp);
            if timestamps.len() >= params.median_timestamp_window {
                break;
            }
            cur = self.nodes[i].parent;
        }
        timestamps.sort_unstable();
        timestamps[timestamps.len() / 2]
    }

    /// Marks `idx` and every descendant as bad, removing each from
    /// `block_map` (§4.7 step 4a). Returns the removed ids, deepest-first
    /// order is not guaranteed.
    pub fn mark_bad_recursive(&mut self, idx: NodeIndex) -> Vec<BlockID> {
        let mut removed = Vec::new();
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            let id = self.nodes[i].block.id();
            self.bad_blocks.insert(id);
            self.block_map.remove(&id);
            removed.push(id);
            stack.extend(self.nodes[i].children.iter().copied());
        }
        removed
    }

    pub fn set_current_path(&mut self, path: Vec<BlockID>, tip: NodeIndex) {
        self.current_path = path;
        self.current_tip = tip;
    }

    pub fn add_orphan(&mut self, parent_id: BlockID, block: Block) {
        self.orphans.entry(parent_id).or_default().insert(block.id(), block);
    }

    pub fn take_orphans(&mut self, parent_id: &BlockID) -> Vec<Block> {
        self.orphans.remove(parent_id).map(|m| m.into_values().collect()).unwrap_or_default()
    }

    /// Walks from `idx` toward genesis, returning the path from genesis to
    /// `idx` inclusive.
    pub fn path_to(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut path = Vec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            path.push(i);
            cur = self.nodes[i].parent;
        }
        path.reverse();
        path
    }
}
