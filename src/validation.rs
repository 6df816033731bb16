//! Transaction validator (C2, §4.2): standalone rules that need no
//! consensus set, and contextual rules that check a transaction against it.

use crate::currency::Currency;
use crate::error::{ConsensusError, Result};
use crate::id::{verify_merkle_proof, BlockID, FileContractID, Hash};
use crate::params::ConsensusParameters;
use crate::signatures::verify_signatures;
use crate::state::ConsensusSet;
use crate::transaction::Transaction;
use crate::unlock::BlockHeight;
use std::collections::HashSet;

/// Rules a-h of §4.2: checkable with no reference to the live consensus set.
pub fn validate_standalone(tx: &Transaction, params: &ConsensusParameters, current_height: BlockHeight) -> Result<()> {
    // (a) size
    if tx.encoded_len() > params.block_size_limit.saturating_sub(5_000) {
        return Err(ConsensusError::TransactionTooLarge);
    }

    // (b) storage-proof exclusivity
    if !tx.storage_proofs.is_empty()
        && (!tx.siacoin_outputs.is_empty()
            || !tx.siafund_outputs.is_empty()
            || !tx.file_contracts.is_empty()
            || !tx.file_contract_terminations.is_empty())
    {
        return Err(ConsensusError::StorageProofExclusivity);
    }

    // (c) no duplicate input/contract-action ids
    let mut seen_siacoin_inputs = HashSet::new();
    for i in &tx.siacoin_inputs {
        if !seen_siacoin_inputs.insert(i.parent_id) {
            return Err(ConsensusError::DoubleSpend);
        }
    }
    let mut seen_siafund_inputs = HashSet::new();
    for i in &tx.siafund_inputs {
        if !seen_siafund_inputs.insert(i.parent_id) {
            return Err(ConsensusError::DoubleSpend);
        }
    }
    let mut contract_actions = HashSet::new();
    for t in &tx.file_contract_terminations {
        if !contract_actions.insert(t.parent_id) {
            return Err(ConsensusError::DuplicateContractAction);
        }
    }
    for p in &tx.storage_proofs {
        if !contract_actions.insert(p.parent_id) {
            return Err(ConsensusError::DuplicateContractAction);
        }
    }

    // (d) strictly positive values
    for o in &tx.siacoin_outputs {
        if o.value.is_zero() {
            return Err(ConsensusError::NonPositiveValue);
        }
    }
    for o in &tx.siafund_outputs {
        if o.value.is_zero() {
            return Err(ConsensusError::NonPositiveValue);
        }
    }
    for c in &tx.file_contracts {
        if c.payout.is_zero() {
            return Err(ConsensusError::NonPositiveValue);
        }
    }

    // (e) siafund outputs carry a zero claim-start in wire form
    for o in &tx.siafund_outputs {
        if !o.claim_start.is_zero() {
            return Err(ConsensusError::NonZeroClaimStart);
        }
    }

    // (f) new contract windows and output sums
    for c in &tx.file_contracts {
        if !(c.start > current_height && c.expiration > c.start) {
            return Err(ConsensusError::InvalidContractWindow);
        }
        let tax = c.payout.mul_by_rational(params.siafund_portion.numerator, params.siafund_portion.denominator).round_down_to_multiple(params.siafund_count);
        let valid_sum: Currency = c.valid_proof_outputs.iter().map(|o| o.value.clone()).sum();
        let missed_sum: Currency = c.missed_proof_outputs.iter().map(|o| o.value.clone()).sum();
        let expected_valid = c.payout.checked_sub(&tax)?;
        if valid_sum != expected_valid || missed_sum != c.payout {
            return Err(ConsensusError::InvalidContractOutputSums);
        }
    }

    // (g) unlock-condition timelocks already elapsed
    for i in &tx.siacoin_inputs {
        if !i.unlock_conditions.timelock_satisfied(current_height) {
            return Err(ConsensusError::TimelockNotMet);
        }
    }
    for i in &tx.siafund_inputs {
        if !i.unlock_conditions.timelock_satisfied(current_height) {
            return Err(ConsensusError::TimelockNotMet);
        }
    }
    for t in &tx.file_contract_terminations {
        if !t.termination_conditions.timelock_satisfied(current_height) {
            return Err(ConsensusError::TimelockNotMet);
        }
    }

    // (h) signatures
    verify_signatures(tx, current_height)?;

    Ok(())
}

/// Rules i-l of §4.2: checked against the live consensus set. `block_at_height`
/// resolves a storage proof's trigger block (§4.2.1).
pub fn validate_contextual(
    tx: &Transaction,
    set: &ConsensusSet,
    current_height: BlockHeight,
    block_at_height: &dyn Fn(BlockHeight) -> Option<BlockID>,
) -> Result<()> {
    // (i) siacoin inputs
    let mut input_sum = Currency::zero();
    for input in &tx.siacoin_inputs {
        let output = set.siacoin_outputs.get(&input.parent_id).ok_or(ConsensusError::MissingOutput(input.parent_id))?;
        if input.unlock_conditions.unlock_hash() != output.unlock_hash {
            return Err(ConsensusError::InvalidSignature);
        }
        input_sum = input_sum.checked_add(&output.value);
    }
    let mut output_sum = tx.siacoin_output_sum();
    output_sum = output_sum.checked_add(&tx.miner_fee_sum());
    for c in &tx.file_contracts {
        output_sum = output_sum.checked_add(&c.payout);
    }
    if input_sum != output_sum {
        return Err(ConsensusError::FundsMismatch);
    }

    // (j) file-contract terminations
    for t in &tx.file_contract_terminations {
        let contract = set.file_contracts.get(&t.parent_id).ok_or(ConsensusError::MissingFileContract(t.parent_id))?;
        if current_height >= contract.start {
            return Err(ConsensusError::ContractWindowClosed);
        }
        if t.termination_conditions.unlock_hash() != contract.termination_hash {
            return Err(ConsensusError::InvalidSignature);
        }
        let payout_sum: Currency = t.payouts.iter().map(|o| o.value.clone()).sum();
        if payout_sum != contract.payout {
            return Err(ConsensusError::InvalidContractOutputSums);
        }
    }

    // (k) storage proofs
    for proof in &tx.storage_proofs {
        verify_storage_proof(proof, set, current_height, block_at_height)?;
    }

    // (l) siafund input/output sum
    let mut siafund_in = Currency::zero();
    for input in &tx.siafund_inputs {
        let output = set.siafund_outputs.get(&input.parent_id).ok_or(ConsensusError::MissingSiafundOutput(input.parent_id))?;
        if input.unlock_conditions.unlock_hash() != output.unlock_hash {
            return Err(ConsensusError::InvalidSignature);
        }
        siafund_in = siafund_in.checked_add(&output.value);
    }
    let siafund_out: Currency = tx.siafund_outputs.iter().map(|o| o.value.clone()).sum();
    if siafund_in != siafund_out {
        return Err(ConsensusError::SiafundMismatch);
    }

    Ok(())
}

/// §4.2.1: recomputes the required segment index and checks the proof's
/// Merkle path against the contract's recorded file root.
pub fn verify_storage_proof(
    proof: &crate::transaction::StorageProof,
    set: &ConsensusSet,
    current_height: BlockHeight,
    block_at_height: &dyn Fn(BlockHeight) -> Option<BlockID>,
) -> Result<()> {
    let contract = set.file_contracts.get(&proof.parent_id).ok_or(ConsensusError::MissingFileContract(proof.parent_id))?;
    if contract.start == 0 || current_height < contract.start - 1 {
        return Err(ConsensusError::TriggerBlockNotReached);
    }
    let trigger_id = block_at_height(contract.start - 1).ok_or(ConsensusError::TriggerBlockNotReached)?;
    let index = segment_index(&trigger_id, &proof.parent_id, contract.file_size, segment_size_of(contract));

    let leaf_hash = crate::id::hash_bytes(&proof.segment);
    let leaf_count = ceil_div(contract.file_size.max(1), segment_size_of(contract)) as usize;
    let root = verify_merkle_proof(leaf_hash, index as usize, leaf_count, &proof.hash_set);
    if root != contract.file_merkle_root {
        return Err(ConsensusError::StorageProofInvalid);
    }
    Ok(())
}

fn segment_size_of(_contract: &crate::transaction::FileContract) -> u64 {
    // A single fixed chunk size is used crate-wide; kept as a function for
    // the (future) possibility of per-contract sizing.
    64 * 1024
}

fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// `bigint(H(trigger_id ++ contract_id)) mod ceil(file_size / segment_size)` (§4.2.1).
pub fn segment_index(trigger_id: &BlockID, contract_id: &FileContractID, file_size: u64, segment_size: u64) -> u64 {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(trigger_id.as_bytes());
    buf.extend_from_slice(contract_id.as_bytes());
    let seed: Hash = crate::id::hash_bytes(&buf);
    let segment_count = ceil_div(file_size.max(1), segment_size).max(1);
    let n = num_bigint::BigUint::from_bytes_be(&seed.0);
    (n % num_bigint::BigUint::from(segment_count)).to_u64_digits().first().copied().unwrap_or(0)
}
