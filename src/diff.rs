//! The reversible diff model (§4.5, §9 "diffs as tagged variants").
//!
//! Every mutation the engine ever makes to the live consensus set is
//! recorded as a diff carrying the complete value, tagged `New` or `Revert`.
//! `commit` is the only function allowed to mutate [`ConsensusSet`]'s maps;
//! its internal assertions are what make invariant I7 (apply-then-revert is
//! the identity) a property of the code rather than of careful bookkeeping
//! elsewhere.

use crate::currency::Currency;
use crate::id::{FileContractID, SiacoinOutputID, SiafundOutputID};
use crate::state::ConsensusSet;
use crate::transaction::{FileContract, SiacoinOutput, SiafundOutput};
use crate::unlock::BlockHeight;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    New,
    Revert,
}

impl Direction {
    fn flip(self) -> Direction {
        match self {
            Direction::New => Direction::Revert,
            Direction::Revert => Direction::New,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SiacoinOutputDiff {
    pub direction: Direction,
    pub id: SiacoinOutputID,
    pub output: SiacoinOutput,
}

#[derive(Clone, Debug)]
pub struct FileContractDiff {
    pub direction: Direction,
    pub id: FileContractID,
    pub contract: FileContract,
}

#[derive(Clone, Debug)]
pub struct SiafundOutputDiff {
    pub direction: Direction,
    pub id: SiafundOutputID,
    pub output: SiafundOutput,
}

#[derive(Clone, Debug)]
pub struct DelayedSiacoinOutputDiff {
    pub direction: Direction,
    pub maturity_height: BlockHeight,
    pub id: SiacoinOutputID,
    pub output: SiacoinOutput,
}

/// `previous`/`adjusted` rather than a signed delta: the pool only ever
/// moves in one direction per block (up, by the tax+claim accounting in
/// §4.6), but storing both endpoints means revert needs no arithmetic.
#[derive(Clone, Debug)]
pub struct SiafundPoolDiff {
    pub previous: Currency,
    pub adjusted: Currency,
}

/// One block's complete effect on the consensus set (§4.5).
#[derive(Clone, Debug, Default)]
pub struct DiffSet {
    pub siacoin_output_diffs: Vec<SiacoinOutputDiff>,
    pub file_contract_diffs: Vec<FileContractDiff>,
    pub siafund_output_diffs: Vec<SiafundOutputDiff>,
    pub delayed_siacoin_output_diffs: Vec<DelayedSiacoinOutputDiff>,
    pub siafund_pool_diff: Option<SiafundPoolDiff>,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::New
    }
}

/// The single mutator for [`ConsensusSet`]'s maps (§4.5). `Direction::New`
/// under `Apply` inserts; under `Revert` the same diff deletes. Asserts
/// enforce that every insert targets a previously-absent key and every
/// delete a present one, which is how I7 holds by construction rather than
/// by caller discipline.
pub fn commit(set: &mut ConsensusSet, diffs: &DiffSet, apply: Direction) {
    for d in &diffs.siacoin_output_diffs {
        apply_one(&mut set.siacoin_outputs, d.id, d.output.clone(), d.direction, apply);
    }
    for d in &diffs.file_contract_diffs {
        apply_one(&mut set.file_contracts, d.id, d.contract.clone(), d.direction, apply);
    }
    for d in &diffs.siafund_output_diffs {
        apply_one(&mut set.siafund_outputs, d.id, d.output.clone(), d.direction, apply);
    }
    for d in &diffs.delayed_siacoin_output_diffs {
        let bucket = set.delayed_siacoin_outputs.entry(d.maturity_height).or_default();
        apply_one(bucket, d.id, d.output.clone(), d.direction, apply);
    }
    if let Some(pool_diff) = &diffs.siafund_pool_diff {
        set.siafund_pool = match apply {
            Direction::New => pool_diff.adjusted.clone(),
            Direction::Revert => pool_diff.previous.clone(),
        };
    }
}

fn apply_one<K: std::hash::Hash + Eq + Copy + std::fmt::Debug, V>(
    map: &mut std::collections::HashMap<K, V>,
    id: K,
    value: V,
    diff_direction: Direction,
    apply: Direction,
) {
    let effective = match apply {
        Direction::New => diff_direction,
        Direction::Revert => diff_direction.flip(),
    };
    match effective {
        Direction::New => {
            let previous = map.insert(id, value);
            assert!(previous.is_none(), "diff commit inserted over an existing key {:?}", id);
        }
        Direction::Revert => {
            let removed = map.remove(&id);
            assert!(removed.is_some(), "diff commit deleted a missing key {:?}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Hash, UnlockHash};
    use crate::params::ConsensusParameters;

    #[test]
    fn apply_then_revert_is_identity() {
        let params = ConsensusParameters::test();
        let mut set = ConsensusSet::new(&params);
        let before = set.siacoin_outputs.len();
        let id = SiacoinOutputID(Hash([7u8; 32]));
        let output = SiacoinOutput { value: Currency::from_u64(5), unlock_hash: UnlockHash(Hash::ZERO) };
        let diffs = DiffSet {
            siacoin_output_diffs: vec![SiacoinOutputDiff { direction: Direction::New, id, output }],
            ..Default::default()
        };
        commit(&mut set, &diffs, Direction::New);
        assert_eq!(set.siacoin_outputs.len(), before + 1);
        commit(&mut set, &diffs, Direction::Revert);
        assert_eq!(set.siacoin_outputs.len(), before);
    }

    #[test]
    #[should_panic]
    fn double_insert_panics() {
        let params = ConsensusParameters::test();
        let mut set = ConsensusSet::new(&params);
        let id = SiacoinOutputID(Hash([9u8; 32]));
        let output = SiacoinOutput { value: Currency::from_u64(1), unlock_hash: UnlockHash(Hash::ZERO) };
        let diffs = DiffSet {
            siacoin_output_diffs: vec![SiacoinOutputDiff { direction: Direction::New, id, output: output.clone() }],
            ..Default::default()
        };
        commit(&mut set, &diffs, Direction::New);
        commit(&mut set, &diffs, Direction::New);
    }
}
