//! Identifier hashes and the specifiers that keep distinct entity kinds from
//! colliding even on identical payloads (§3).

use crate::encoding::{encode, Encodable};
use blake2::{Blake2b512, Digest as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-byte type-tag prefixed onto every id preimage.
pub type Specifier = [u8; 16];

const fn specifier(s: &str) -> Specifier {
    let bytes = s.as_bytes();
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

pub const SPECIFIER_SIACOIN_INPUT: Specifier = specifier("siacoin input");
pub const SPECIFIER_SIACOIN_OUTPUT: Specifier = specifier("siacoin output");
pub const SPECIFIER_FILE_CONTRACT: Specifier = specifier("file contract");
pub const SPECIFIER_FILE_CONTRACT_TERMINATION: Specifier = specifier("contract termination");
pub const SPECIFIER_STORAGE_PROOF: Specifier = specifier("storage proof");
pub const SPECIFIER_SIAFUND_INPUT: Specifier = specifier("siafund input");
pub const SPECIFIER_SIAFUND_OUTPUT: Specifier = specifier("siafund output");
pub const SPECIFIER_SIACLAIM_OUTPUT: Specifier = specifier("claim output");
pub const SPECIFIER_MINER_PAYOUT: Specifier = specifier("miner payout");
pub const SPECIFIER_VALID_PROOF_OUTPUT: Specifier = specifier("valid proof output");
pub const SPECIFIER_MISSED_PROOF_OUTPUT: Specifier = specifier("missed proof output");

/// 32-byte generic hash used as the basis for every identifier type.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Encodable for Hash {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

/// Computes the blake2b-256 hash of an already-encoded preimage.
pub fn hash_bytes(data: &[u8]) -> Hash {
    let digest = Blake2b512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    Hash(out)
}

/// Hashes the canonical encoding of a single value, with no specifier.
pub fn hash_encodable<T: Encodable>(value: &T) -> Hash {
    hash_bytes(&encode(value))
}

/// Hashes `specifier ++ encode(value)`, the pattern used for every derived id.
pub fn hash_with_specifier<T: Encodable>(spec: &Specifier, value: &T) -> Hash {
    let mut buf = Vec::new();
    buf.extend_from_slice(spec);
    value.encode(&mut buf);
    hash_bytes(&buf)
}

/// Merkle root over an arbitrary number of leaves (no padding to a power of
/// two): the tree is split at the largest power of two strictly less than
/// the leaf count, recursively, the same construction Sia uses so odd-sized
/// trees don't need dummy leaves.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    match leaves.len() {
        0 => Hash::ZERO,
        1 => leaves[0],
        n => {
            let split = largest_power_of_two_less_than(n);
            let left = merkle_root(&leaves[..split]);
            let right = merkle_root(&leaves[split..]);
            let mut buf = Vec::with_capacity(65);
            buf.push(1u8); // interior-node leading byte, keeps leaf/node preimages distinct
            buf.extend_from_slice(&left.0);
            buf.extend_from_slice(&right.0);
            hash_bytes(&buf)
        }
    }
}

fn largest_power_of_two_less_than(n: usize) -> usize {
    let mut p = 1usize;
    while p * 2 < n {
        p *= 2;
    }
    p
}

fn combine_nodes(left: Hash, right: Hash) -> Hash {
    let mut buf = Vec::with_capacity(65);
    buf.push(1u8);
    buf.extend_from_slice(&left.0);
    buf.extend_from_slice(&right.0);
    hash_bytes(&buf)
}

/// Recomputes the Merkle root of a tree of `leaf_count` leaves from one
/// leaf's hash, its index, and its authentication path (§4.2.1), mirroring
/// the same largest-power-of-two split `merkle_root` uses so a proof
/// generated against that construction verifies here. `path` carries
/// sibling hashes ordered from the leaf's level up to the root.
pub fn verify_merkle_proof(leaf_hash: Hash, index: usize, leaf_count: usize, path: &[Hash]) -> Hash {
    fn recurse(index: usize, leaf_count: usize, path: &mut std::slice::Iter<Hash>, leaf_hash: Hash) -> Hash {
        if leaf_count <= 1 {
            return leaf_hash;
        }
        let split = largest_power_of_two_less_than(leaf_count);
        if index < split {
            let left = recurse(index, split, path, leaf_hash);
            let right = *path.next().expect("merkle proof exhausted");
            combine_nodes(left, right)
        } else {
            let left = *path.next().expect("merkle proof exhausted");
            let right = recurse(index - split, leaf_count - split, path, leaf_hash);
            combine_nodes(left, right)
        }
    }
    recurse(index, leaf_count, &mut path.iter(), leaf_hash)
}

/// Builds the authentication path `verify_merkle_proof` expects for the
/// leaf at `index`. Used by storage-proof construction and by tests.
pub fn generate_merkle_proof(leaves: &[Hash], index: usize) -> Vec<Hash> {
    fn recurse(leaves: &[Hash], index: usize, path: &mut Vec<Hash>) {
        if leaves.len() <= 1 {
            return;
        }
        let split = largest_power_of_two_less_than(leaves.len());
        if index < split {
            recurse(&leaves[..split], index, path);
            path.push(merkle_root(&leaves[split..]));
        } else {
            path.push(merkle_root(&leaves[..split]));
            recurse(&leaves[split..], index - split, path);
        }
    }
    let mut path = Vec::new();
    recurse(leaves, index, &mut path);
    path
}

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Hash);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }
        }

        impl Encodable for $name {
            fn encode(&self, buf: &mut Vec<u8>) {
                self.0.encode(buf);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<Hash> for $name {
            fn from(h: Hash) -> Self {
                $name(h)
            }
        }
    };
}

id_type!(BlockID);
id_type!(SiacoinOutputID);
id_type!(SiafundOutputID);
id_type!(FileContractID);
id_type!(UnlockHash);
id_type!(TransactionID);
