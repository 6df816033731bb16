//! The live consensus set (§4.4): the maps `commit` (§4.5) mutates.

use crate::currency::Currency;
use crate::id::{FileContractID, SiacoinOutputID, SiafundOutputID};
use crate::params::ConsensusParameters;
use crate::transaction::{FileContract, SiacoinOutput, SiafundOutput};
use crate::unlock::BlockHeight;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug)]
pub struct ConsensusSet {
    pub siacoin_outputs: HashMap<SiacoinOutputID, SiacoinOutput>,
    pub file_contracts: HashMap<FileContractID, FileContract>,
    pub siafund_outputs: HashMap<SiafundOutputID, SiafundOutput>,
    pub siafund_pool: Currency,
    pub delayed_siacoin_outputs: BTreeMap<BlockHeight, HashMap<SiacoinOutputID, SiacoinOutput>>,
}

impl ConsensusSet {
    pub fn new(_params: &ConsensusParameters) -> Self {
        ConsensusSet {
            siacoin_outputs: HashMap::new(),
            file_contracts: HashMap::new(),
            siafund_outputs: HashMap::new(),
            siafund_pool: Currency::zero(),
            delayed_siacoin_outputs: BTreeMap::new(),
        }
    }

    pub fn total_siafunds(&self) -> Currency {
        self.siafund_outputs.values().map(|o| o.value.clone()).sum()
    }
}
