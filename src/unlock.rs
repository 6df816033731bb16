//! Unlock conditions and the public-key/algorithm-tag plumbing they carry
//! (§3, §4.3).

use crate::encoding::Encodable;
use crate::id::{hash_encodable, merkle_root, Hash, UnlockHash};
use serde::{Deserialize, Serialize};

pub type BlockHeight = u64;

/// 16-byte algorithm specifier. `ed25519` and `entropy` are the two defined
/// behaviors; any other tag is "trusted true" so new schemes can soft-fork
/// in without a hard fork (§4.3).
pub type AlgorithmSpecifier = [u8; 16];

const fn specifier(s: &str) -> AlgorithmSpecifier {
    let bytes = s.as_bytes();
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

pub const ALGORITHM_ED25519: AlgorithmSpecifier = specifier("ed25519");
pub const ALGORITHM_ENTROPY: AlgorithmSpecifier = specifier("entropy");

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SiaPublicKey {
    pub algorithm: AlgorithmSpecifier,
    pub key: Vec<u8>,
}

impl SiaPublicKey {
    pub fn ed25519(key: [u8; 32]) -> Self {
        SiaPublicKey { algorithm: ALGORITHM_ED25519, key: key.to_vec() }
    }
}

impl Encodable for SiaPublicKey {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.algorithm.encode(buf);
        crate::encoding::encode_bytes(&self.key, buf);
    }
}

/// `(timelock, public-keys, required-signatures)` (§3). Keys sit between the
/// two low-entropy fields in the Merkle tree so each is adjacent to a
/// high-entropy sibling.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct UnlockConditions {
    pub timelock: BlockHeight,
    pub public_keys: Vec<SiaPublicKey>,
    pub signatures_required: u64,
}

impl Encodable for UnlockConditions {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.timelock.encode(buf);
        self.public_keys.encode(buf);
        self.signatures_required.encode(buf);
    }
}

impl UnlockConditions {
    /// Merkle root over `{H(timelock), H(pk_0), .., H(pk_n), H(required_sigs)}`.
    pub fn unlock_hash(&self) -> UnlockHash {
        let mut leaves = Vec::with_capacity(self.public_keys.len() + 2);
        leaves.push(hash_encodable(&self.timelock));
        for pk in &self.public_keys {
            leaves.push(hash_encodable(pk));
        }
        leaves.push(hash_encodable(&self.signatures_required));
        UnlockHash(merkle_root(&leaves))
    }

    pub fn timelock_satisfied(&self, current_height: BlockHeight) -> bool {
        self.timelock <= current_height
    }
}

pub fn hash_of(value: &impl Encodable) -> Hash {
    hash_encodable(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_hash_is_deterministic() {
        let uc = UnlockConditions {
            timelock: 0,
            public_keys: vec![SiaPublicKey::ed25519([7u8; 32])],
            signatures_required: 1,
        };
        assert_eq!(uc.unlock_hash(), uc.clone().unlock_hash());
    }

    #[test]
    fn unlock_hash_changes_with_keys() {
        let base = UnlockConditions { timelock: 0, public_keys: vec![], signatures_required: 0 };
        let mut with_key = base.clone();
        with_key.public_keys.push(SiaPublicKey::ed25519([1u8; 32]));
        assert_ne!(base.unlock_hash(), with_key.unlock_hash());
    }

    #[test]
    fn timelock_gating() {
        let uc = UnlockConditions { timelock: 100, public_keys: vec![], signatures_required: 0 };
        assert!(!uc.timelock_satisfied(99));
        assert!(uc.timelock_satisfied(100));
        assert!(uc.timelock_satisfied(101));
    }
}
