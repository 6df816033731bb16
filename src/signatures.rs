//! Signature sweep and covered-fields SigHash (§4.3).
//!
//! Verification walks every `UnlockConditions`-gated element once (siacoin
//! inputs, siafund inputs, file-contract terminations), builds a
//! requirements table keyed by the element's id, then sweeps the
//! transaction's flat signature list against it. This mirrors the source's
//! single linear pass rather than re-deriving requirements per signature.

use crate::encoding::{encode_bytes, Encodable};
use crate::error::{ConsensusError, Result};
use crate::id::{hash_bytes, Hash};
use crate::transaction::{CoveredFields, Transaction, TransactionSignature};
use crate::unlock::{SiaPublicKey, UnlockConditions, ALGORITHM_ED25519, ALGORITHM_ENTROPY};
use std::collections::{HashMap, HashSet};

/// `SigHash(i)`: the exact bytes signature `i` signs.
pub fn sig_hash(tx: &Transaction, sig: &TransactionSignature) -> Hash {
    let mut buf = Vec::new();
    if sig.covered_fields.whole_transaction {
        tx.encode(&mut buf);
    } else {
        encode_selected(&tx.siacoin_inputs, &sig.covered_fields.siacoin_inputs, &mut buf);
        encode_selected(&tx.siacoin_outputs, &sig.covered_fields.siacoin_outputs, &mut buf);
        encode_selected(&tx.file_contracts, &sig.covered_fields.file_contracts, &mut buf);
        encode_selected(&tx.file_contract_terminations, &sig.covered_fields.file_contract_terminations, &mut buf);
        encode_selected(&tx.storage_proofs, &sig.covered_fields.storage_proofs, &mut buf);
        encode_selected(&tx.siafund_inputs, &sig.covered_fields.siafund_inputs, &mut buf);
        encode_selected(&tx.siafund_outputs, &sig.covered_fields.siafund_outputs, &mut buf);
        encode_selected(&tx.miner_fees, &sig.covered_fields.miner_fees, &mut buf);
        encode_raw_selected(&tx.arbitrary_data, &sig.covered_fields.arbitrary_data, &mut buf);
    }
    // The signatures list is appended regardless of whole_transaction, so
    // co-signers can sign over each other's signatures without ordering
    // ambiguity.
    encode_selected(&tx.signatures, &sig.covered_fields.signatures, &mut buf);

    sig.parent_id.encode(&mut buf);
    sig.public_key_index.encode(&mut buf);
    sig.timelock.encode(&mut buf);
    hash_bytes(&buf)
}

fn encode_selected<T: Encodable>(items: &[T], indices: &[u64], buf: &mut Vec<u8>) {
    (indices.len() as u64).encode(buf);
    for &i in indices {
        items[i as usize].encode(buf);
    }
}

fn encode_raw_selected(items: &[Vec<u8>], indices: &[u64], buf: &mut Vec<u8>) {
    (indices.len() as u64).encode(buf);
    for &i in indices {
        encode_bytes(&items[i as usize], buf);
    }
}

struct Requirement {
    remaining: u64,
    keys: Vec<SiaPublicKey>,
    used: HashSet<u64>,
}

/// Verifies every signature in `tx` against the unlock conditions of every
/// siacoin input, siafund input, and file-contract termination, at
/// `current_height`. Fails closed: any element whose requirement isn't
/// driven to zero by sweep's end is a `MissingSignatures` error.
pub fn verify_signatures(tx: &Transaction, current_height: u64) -> Result<()> {
    let mut requirements: HashMap<Hash, Requirement> = HashMap::new();
    let mut register = |id: Hash, uc: &UnlockConditions| {
        requirements.insert(
            id,
            Requirement { remaining: uc.signatures_required, keys: uc.public_keys.clone(), used: HashSet::new() },
        );
    };

    for input in &tx.siacoin_inputs {
        register(input.parent_id.0, &input.unlock_conditions);
    }
    for input in &tx.siafund_inputs {
        register(input.parent_id.0, &input.unlock_conditions);
    }
    for term in &tx.file_contract_terminations {
        register(term.parent_id.0, &term.termination_conditions);
    }

    for sig in &tx.signatures {
        if !sig.covered_fields.is_well_formed(tx) {
            return Err(ConsensusError::InvalidSignature);
        }
        let req = requirements.get_mut(&sig.parent_id).ok_or(ConsensusError::InvalidSignature)?;
        if sig.public_key_index as usize >= req.keys.len() {
            return Err(ConsensusError::InvalidSignature);
        }
        if !req.used.insert(sig.public_key_index) {
            // duplicate use of the same public key index
            return Err(ConsensusError::InvalidSignature);
        }
        if current_height < sig.timelock {
            return Err(ConsensusError::InvalidSignature);
        }
        let pk = &req.keys[sig.public_key_index as usize];
        let message = sig_hash(tx, sig);
        verify_one(pk, &message, &sig.signature)?;
        req.remaining = req.remaining.saturating_sub(1);
    }

    if requirements.values().any(|r| r.remaining != 0) {
        return Err(ConsensusError::MissingSignatures);
    }
    Ok(())
}

/// Algorithm dispatch (§4.3). `entropy` always fails; `ed25519` verifies
/// normally; any other 16-byte tag is accepted unconditionally so future
/// schemes can soft-fork in without the verifier needing to understand them.
fn verify_one(pk: &SiaPublicKey, message: &Hash, signature: &[u8]) -> Result<()> {
    if pk.algorithm == ALGORITHM_ENTROPY {
        return Err(ConsensusError::InvalidSignature);
    }
    if pk.algorithm == ALGORITHM_ED25519 {
        use ed25519_dalek::{PublicKey, Signature, Verifier};
        let public = PublicKey::from_bytes(&pk.key).map_err(|_| ConsensusError::InvalidSignature)?;
        let sig = Signature::from_bytes(signature).map_err(|_| ConsensusError::InvalidSignature)?;
        return public.verify(&message.0, &sig).map_err(|_| ConsensusError::InvalidSignature);
    }
    // Unrecognized algorithm: trusted true, the forward-compatibility path.
    Ok(())
}
