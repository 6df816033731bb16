//! Apply pipeline and maintenance (C6, §4.6).
//!
//! `generate_diffs` never mutates the caller's live [`ConsensusSet`]: it
//! works against a scratch clone, so a mid-block validation failure simply
//! means the scratch (and the diffs accumulated so far) are discarded. The
//! caller commits the returned [`DiffSet`] to the real set only once the
//! whole block has validated, which gives "revert the partial effect" for
//! free instead of needing an explicit rollback path.

use crate::block::Block;
use crate::currency::Currency;
use crate::diff::{commit, DelayedSiacoinOutputDiff, DiffSet, Direction, FileContractDiff, SiafundOutputDiff, SiacoinOutputDiff, SiafundPoolDiff};
use crate::error::{ConsensusError, Result};
use crate::id::{hash_with_specifier, BlockID, SiacoinOutputID, SPECIFIER_MISSED_PROOF_OUTPUT, SPECIFIER_MINER_PAYOUT, SPECIFIER_SIACLAIM_OUTPUT, SPECIFIER_VALID_PROOF_OUTPUT, SPECIFIER_FILE_CONTRACT_TERMINATION};
use crate::params::ConsensusParameters;
use crate::state::ConsensusSet;
use crate::transaction::Transaction;
use crate::unlock::BlockHeight;
use crate::validation::{validate_contextual, validate_standalone};

/// Produces the complete diff set for applying `block` on top of `set` at
/// `current_height = parent_height + 1`. Does not commit anything.
pub fn generate_diffs(
    block: &Block,
    current_height: BlockHeight,
    set: &ConsensusSet,
    params: &ConsensusParameters,
    block_at_height: &dyn Fn(BlockHeight) -> Option<BlockID>,
) -> Result<DiffSet> {
    let block_id = block.id();
    let mut scratch = set.clone();
    let mut diffs = DiffSet::default();

    // Miner payout sum must equal coinbase + fees, checked before any
    // transaction's effects are committed (§4.6 step 3).
    let fee_sum: Currency = block.transactions.iter().map(|tx| tx.miner_fee_sum()).sum();
    let expected_payout = params.coinbase(current_height).checked_add(&fee_sum);
    if block.miner_payout_sum() != expected_payout {
        return Err(ConsensusError::MinerPayout);
    }

    // Steps 1-2: validate and apply each transaction against the scratch set.
    for tx in &block.transactions {
        let tx_diffs = transaction_diffs(tx, current_height, &mut scratch, params, block_at_height)?;
        merge(&mut diffs, tx_diffs);
    }

    // Step 3: miner subsidy, delayed by maturity_delay.
    for (i, payout) in block.miner_payouts.iter().enumerate() {
        let id: SiacoinOutputID = hash_with_specifier(&SPECIFIER_MINER_PAYOUT, &(&block_id, i as u64)).into();
        diffs.delayed_siacoin_output_diffs.push(DelayedSiacoinOutputDiff {
            direction: Direction::New,
            maturity_height: current_height + params.maturity_delay,
            id,
            output: payout.clone(),
        });
    }

    // Step 4: mature delayed outputs scheduled for this height.
    if let Some(maturing) = scratch.delayed_siacoin_outputs.get(&current_height) {
        for (&id, output) in maturing {
            diffs.delayed_siacoin_output_diffs.push(DelayedSiacoinOutputDiff {
                direction: Direction::Revert,
                maturity_height: current_height,
                id,
                output: output.clone(),
            });
            diffs.siacoin_output_diffs.push(SiacoinOutputDiff { direction: Direction::New, id, output: output.clone() });
        }
    }

    // Step 5: expire file contracts whose window has closed without a proof.
    let expiring: Vec<_> = scratch.file_contracts.iter().filter(|(_, c)| c.expiration == current_height).map(|(id, c)| (*id, c.clone())).collect();
    for (id, contract) in expiring {
        diffs.file_contract_diffs.push(FileContractDiff { direction: Direction::Revert, id, contract: contract.clone() });
        for (i, payout) in contract.missed_proof_outputs.iter().enumerate() {
            let out_id = hash_with_specifier(&SPECIFIER_MISSED_PROOF_OUTPUT, &(&id, i as u64)).into();
            diffs.delayed_siacoin_output_diffs.push(DelayedSiacoinOutputDiff {
                direction: Direction::New,
                maturity_height: current_height + params.maturity_delay,
                id: out_id,
                output: payout.clone(),
            });
        }
    }

    Ok(diffs)
}

/// Validates and computes the diff set for a single transaction against
/// `scratch`, committing it into `scratch` before returning so later
/// transactions (or a caller probing a standalone transaction set) see its
/// effects. Shared between the per-block loop above and
/// [`crate::consensus::Consensus::try_transaction_set`].
pub fn transaction_diffs(
    tx: &Transaction,
    current_height: BlockHeight,
    scratch: &mut ConsensusSet,
    params: &ConsensusParameters,
    block_at_height: &dyn Fn(BlockHeight) -> Option<BlockID>,
) -> Result<DiffSet> {
    validate_standalone(tx, params, current_height)?;
    validate_contextual(tx, scratch, current_height, block_at_height)?;

    let mut tx_diffs = DiffSet::default();

    for input in &tx.siacoin_inputs {
        let output = scratch.siacoin_outputs.get(&input.parent_id).expect("validated to exist").clone();
        tx_diffs.siacoin_output_diffs.push(SiacoinOutputDiff { direction: Direction::Revert, id: input.parent_id, output });
    }
    for (i, output) in tx.siacoin_outputs.iter().enumerate() {
        let id = tx.siacoin_output_id(i);
        tx_diffs.siacoin_output_diffs.push(SiacoinOutputDiff { direction: Direction::New, id, output: output.clone() });
    }
    for (i, contract) in tx.file_contracts.iter().enumerate() {
        let id = tx.file_contract_id(i);
        tx_diffs.file_contract_diffs.push(FileContractDiff { direction: Direction::New, id, contract: contract.clone() });
    }
    for term in &tx.file_contract_terminations {
        let contract = scratch.file_contracts.get(&term.parent_id).expect("validated to exist").clone();
        tx_diffs.file_contract_diffs.push(FileContractDiff { direction: Direction::Revert, id: term.parent_id, contract });
        for (i, payout) in term.payouts.iter().enumerate() {
            let id = hash_with_specifier(&SPECIFIER_FILE_CONTRACT_TERMINATION, &(&term.parent_id, i as u64)).into();
            tx_diffs.delayed_siacoin_output_diffs.push(DelayedSiacoinOutputDiff {
                direction: Direction::New,
                maturity_height: current_height + params.maturity_delay,
                id,
                output: payout.clone(),
            });
        }
    }
    for proof in &tx.storage_proofs {
        let contract = scratch.file_contracts.get(&proof.parent_id).expect("validated to exist").clone();
        tx_diffs.file_contract_diffs.push(FileContractDiff { direction: Direction::Revert, id: proof.parent_id, contract: contract.clone() });
        let tax = contract.payout.mul_by_rational(params.siafund_portion.numerator, params.siafund_portion.denominator).round_down_to_multiple(params.siafund_count);
        let pool_before = scratch.siafund_pool.clone();
        let pool_after = pool_before.checked_add(&tax);
        tx_diffs.siafund_pool_diff = Some(SiafundPoolDiff { previous: pool_before, adjusted: pool_after.clone() });
        // a block's single storage proof moves the scratch pool forward so a
        // later siafund claim in the same block sees the updated value.
        scratch.siafund_pool = pool_after;
        for (i, valid_output) in contract.valid_proof_outputs.iter().enumerate() {
            let id = hash_with_specifier(&SPECIFIER_VALID_PROOF_OUTPUT, &(&proof.parent_id, i as u64)).into();
            tx_diffs.delayed_siacoin_output_diffs.push(DelayedSiacoinOutputDiff {
                direction: Direction::New,
                maturity_height: current_height + params.maturity_delay,
                id,
                output: valid_output.clone(),
            });
        }
    }
    for input in &tx.siafund_inputs {
        let output = scratch.siafund_outputs.get(&input.parent_id).expect("validated to exist").clone();
        tx_diffs.siafund_output_diffs.push(SiafundOutputDiff { direction: Direction::Revert, id: input.parent_id, output: output.clone() });
        let claim = scratch.siafund_pool.checked_sub(&output.claim_start).unwrap_or_else(|_| Currency::zero()).div(&Currency::from_u64(params.siafund_count));
        let id = hash_with_specifier(&SPECIFIER_SIACLAIM_OUTPUT, &input.parent_id).into();
        tx_diffs.delayed_siacoin_output_diffs.push(DelayedSiacoinOutputDiff {
            direction: Direction::New,
            maturity_height: current_height + params.maturity_delay,
            id,
            output: crate::transaction::SiacoinOutput { value: claim, unlock_hash: input.claim_unlock_hash },
        });
    }
    for (i, output) in tx.siafund_outputs.iter().enumerate() {
        let id = tx.siafund_output_id(i);
        let mut output = output.clone();
        output.claim_start = scratch.siafund_pool.clone();
        tx_diffs.siafund_output_diffs.push(SiafundOutputDiff { direction: Direction::New, id, output });
    }

    commit(scratch, &tx_diffs, Direction::New);
    Ok(tx_diffs)
}

fn merge(into: &mut DiffSet, from: DiffSet) {
    into.siacoin_output_diffs.extend(from.siacoin_output_diffs);
    into.file_contract_diffs.extend(from.file_contract_diffs);
    into.siafund_output_diffs.extend(from.siafund_output_diffs);
    into.delayed_siacoin_output_diffs.extend(from.delayed_siacoin_output_diffs);
    if let Some(pool_diff) = from.siafund_pool_diff {
        into.siafund_pool_diff = Some(match into.siafund_pool_diff.take() {
            Some(existing) => SiafundPoolDiff { previous: existing.previous, adjusted: pool_diff.adjusted },
            None => pool_diff,
        });
    }
}
