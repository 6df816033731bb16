//! Transaction element classes (§3) and the derived-id machinery that binds
//! each output/contract id to the complete transaction body.

use crate::currency::Currency;
use crate::encoding::Encodable;
use crate::id::{
    hash_with_specifier, FileContractID, Hash, SiacoinOutputID, SiafundOutputID, SPECIFIER_FILE_CONTRACT,
    SPECIFIER_SIACOIN_OUTPUT, SPECIFIER_SIAFUND_OUTPUT,
};
use crate::unlock::{AlgorithmSpecifier, BlockHeight, UnlockConditions};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SiacoinOutput {
    pub value: Currency,
    pub unlock_hash: crate::id::UnlockHash,
}

impl Encodable for SiacoinOutput {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.value.encode(buf);
        self.unlock_hash.encode(buf);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SiacoinInput {
    pub parent_id: SiacoinOutputID,
    pub unlock_conditions: UnlockConditions,
}

impl Encodable for SiacoinInput {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode(buf);
        self.unlock_conditions.encode(buf);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SiafundOutput {
    pub value: Currency,
    pub unlock_hash: crate::id::UnlockHash,
    /// Wire form must be zero (§4.2 standalone rule e); the engine
    /// overwrites it with the siafund pool value at the moment the output
    /// is created (§4.6 step 2), so later spends know how much of the pool
    /// has already been claimed against it.
    pub claim_start: Currency,
}

impl Encodable for SiafundOutput {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.value.encode(buf);
        self.unlock_hash.encode(buf);
        self.claim_start.encode(buf);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SiafundInput {
    pub parent_id: SiafundOutputID,
    pub unlock_conditions: UnlockConditions,
    pub claim_unlock_hash: crate::id::UnlockHash,
}

impl Encodable for SiafundInput {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode(buf);
        self.unlock_conditions.encode(buf);
        self.claim_unlock_hash.encode(buf);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct FileContract {
    pub file_size: u64,
    pub file_merkle_root: Hash,
    pub start: BlockHeight,
    pub expiration: BlockHeight,
    pub payout: Currency,
    pub valid_proof_outputs: Vec<SiacoinOutput>,
    pub missed_proof_outputs: Vec<SiacoinOutput>,
    pub termination_hash: crate::id::UnlockHash,
}

impl Encodable for FileContract {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.file_size.encode(buf);
        self.file_merkle_root.encode(buf);
        self.start.encode(buf);
        self.expiration.encode(buf);
        self.payout.encode(buf);
        self.valid_proof_outputs.encode(buf);
        self.missed_proof_outputs.encode(buf);
        self.termination_hash.encode(buf);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct FileContractTermination {
    pub parent_id: FileContractID,
    pub termination_conditions: UnlockConditions,
    pub payouts: Vec<SiacoinOutput>,
}

impl Encodable for FileContractTermination {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode(buf);
        self.termination_conditions.encode(buf);
        self.payouts.encode(buf);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct StorageProof {
    pub parent_id: FileContractID,
    pub segment: Vec<u8>,
    pub hash_set: Vec<Hash>,
}

impl Encodable for StorageProof {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode(buf);
        crate::encoding::encode_bytes(&self.segment, buf);
        self.hash_set.encode(buf);
    }
}

/// A bitfield ("whole transaction") plus per-element-class index lists
/// (§4.3). `whole_transaction` and explicit index lists are mutually
/// exclusive.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct CoveredFields {
    pub whole_transaction: bool,
    pub siacoin_inputs: Vec<u64>,
    pub siacoin_outputs: Vec<u64>,
    pub file_contracts: Vec<u64>,
    pub file_contract_terminations: Vec<u64>,
    pub storage_proofs: Vec<u64>,
    pub siafund_inputs: Vec<u64>,
    pub siafund_outputs: Vec<u64>,
    pub miner_fees: Vec<u64>,
    pub arbitrary_data: Vec<u64>,
    pub signatures: Vec<u64>,
}

impl Encodable for CoveredFields {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.whole_transaction.encode(buf);
        self.siacoin_inputs.encode(buf);
        self.siacoin_outputs.encode(buf);
        self.file_contracts.encode(buf);
        self.file_contract_terminations.encode(buf);
        self.storage_proofs.encode(buf);
        self.siafund_inputs.encode(buf);
        self.siafund_outputs.encode(buf);
        self.miner_fees.encode(buf);
        self.arbitrary_data.encode(buf);
        self.signatures.encode(buf);
    }
}

impl CoveredFields {
    /// The seven element-class lists plus `miner_fees`/`arbitrary_data`,
    /// excluding `signatures` (checked separately since its bound comes
    /// from the transaction's own `signatures` field, still being built
    /// while this runs).
    fn index_lists(&self) -> [&Vec<u64>; 9] {
        [
            &self.siacoin_inputs,
            &self.siacoin_outputs,
            &self.file_contracts,
            &self.file_contract_terminations,
            &self.storage_proofs,
            &self.siafund_inputs,
            &self.siafund_outputs,
            &self.miner_fees,
            &self.arbitrary_data,
        ]
    }

    /// Strictly-increasing and bounded by the length of the corresponding
    /// element in `tx`; rejects malformed fields before any hashing happens
    /// (§4.3, §9 design notes).
    pub fn is_well_formed(&self, tx: &Transaction) -> bool {
        if !strictly_increasing(&self.signatures) {
            return false;
        }
        if let Some(&last) = self.signatures.last() {
            if last as usize >= tx.signatures.len() {
                return false;
            }
        }
        if self.whole_transaction {
            return self.index_lists().iter().all(|l| l.is_empty());
        }
        let bounds: [usize; 9] = [
            tx.siacoin_inputs.len(),
            tx.siacoin_outputs.len(),
            tx.file_contracts.len(),
            tx.file_contract_terminations.len(),
            tx.storage_proofs.len(),
            tx.siafund_inputs.len(),
            tx.siafund_outputs.len(),
            tx.miner_fees.len(),
            tx.arbitrary_data.len(),
        ];
        for (list, bound) in self.index_lists().iter().zip(bounds.iter()) {
            if !strictly_increasing(list) {
                return false;
            }
            if let Some(&last) = list.last() {
                if last as usize >= *bound {
                    return false;
                }
            }
        }
        true
    }
}

fn strictly_increasing(list: &[u64]) -> bool {
    list.windows(2).all(|w| w[0] < w[1])
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TransactionSignature {
    pub parent_id: Hash,
    pub public_key_index: u64,
    pub timelock: BlockHeight,
    pub covered_fields: CoveredFields,
    pub signature: Vec<u8>,
}

impl Encodable for TransactionSignature {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode(buf);
        self.public_key_index.encode(buf);
        self.timelock.encode(buf);
        self.covered_fields.encode(buf);
        crate::encoding::encode_bytes(&self.signature, buf);
    }
}

pub fn unused_algorithm() -> AlgorithmSpecifier {
    [0u8; 16]
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct Transaction {
    pub siacoin_inputs: Vec<SiacoinInput>,
    pub siacoin_outputs: Vec<SiacoinOutput>,
    pub file_contracts: Vec<FileContract>,
    pub file_contract_terminations: Vec<FileContractTermination>,
    pub storage_proofs: Vec<StorageProof>,
    pub siafund_inputs: Vec<SiafundInput>,
    pub siafund_outputs: Vec<SiafundOutput>,
    pub miner_fees: Vec<Currency>,
    pub arbitrary_data: Vec<Vec<u8>>,
    pub signatures: Vec<TransactionSignature>,
}

impl Encodable for Transaction {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.siacoin_inputs.encode(buf);
        self.siacoin_outputs.encode(buf);
        self.file_contracts.encode(buf);
        self.file_contract_terminations.encode(buf);
        self.storage_proofs.encode(buf);
        self.siafund_inputs.encode(buf);
        self.siafund_outputs.encode(buf);
        self.miner_fees.encode(buf);
        self.arbitrary_data.encode(buf);
        // signatures are intentionally excluded from the id preimage: ids
        // must be stable before every co-signer has attached their signature.
    }
}

impl Transaction {
    pub fn id(&self) -> crate::id::TransactionID {
        crate::id::TransactionID(crate::id::hash_encodable(self))
    }

    pub fn siacoin_output_id(&self, index: usize) -> SiacoinOutputID {
        SiacoinOutputID(hash_with_specifier(&SPECIFIER_SIACOIN_OUTPUT, &(self, index as u64)))
    }

    pub fn file_contract_id(&self, index: usize) -> FileContractID {
        FileContractID(hash_with_specifier(&SPECIFIER_FILE_CONTRACT, &(self, index as u64)))
    }

    pub fn siafund_output_id(&self, index: usize) -> SiafundOutputID {
        SiafundOutputID(hash_with_specifier(&SPECIFIER_SIAFUND_OUTPUT, &(self, index as u64)))
    }

    pub fn siacoin_output_sum(&self) -> Currency {
        self.siacoin_outputs.iter().map(|o| o.value.clone()).sum()
    }

    pub fn siacoin_input_ids(&self) -> impl Iterator<Item = &SiacoinOutputID> {
        self.siacoin_inputs.iter().map(|i| &i.parent_id)
    }

    pub fn miner_fee_sum(&self) -> Currency {
        self.miner_fees.iter().cloned().sum()
    }

    pub fn encoded_len(&self) -> usize {
        crate::encoding::encode(self).len()
    }
}

impl<T: Encodable> Encodable for (&T, u64) {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf);
        self.1.encode(buf);
    }
}
