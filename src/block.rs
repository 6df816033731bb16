//! Blocks (§3) and the genesis constant (§6).

use crate::currency::Currency;
use crate::encoding::Encodable;
use crate::id::{merkle_root, BlockID, Hash};
use crate::transaction::{SiacoinOutput, Transaction};
use crate::unlock::UnlockConditions;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Block {
    pub parent_id: BlockID,
    pub timestamp: u64,
    pub nonce: u64,
    pub miner_payouts: Vec<SiacoinOutput>,
    pub transactions: Vec<Transaction>,
}

impl Encodable for Block {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode(buf);
        self.timestamp.encode(buf);
        self.nonce.encode(buf);
        self.merkle_root_miner_payouts().encode(buf);
        self.merkle_root_transactions().encode(buf);
    }
}

impl Block {
    pub fn id(&self) -> BlockID {
        BlockID(crate::id::hash_encodable(self))
    }

    pub fn merkle_root_miner_payouts(&self) -> Hash {
        let leaves: Vec<Hash> = self.miner_payouts.iter().map(crate::id::hash_encodable).collect();
        merkle_root(&leaves)
    }

    pub fn merkle_root_transactions(&self) -> Hash {
        let leaves: Vec<Hash> = self.transactions.iter().map(crate::id::hash_encodable).collect();
        merkle_root(&leaves)
    }

    pub fn miner_payout_sum(&self) -> Currency {
        self.miner_payouts.iter().map(|o| o.value.clone()).sum()
    }

    pub fn encoded_len(&self) -> usize {
        // The header fields are cheap; the bulk of a block's size is its
        // transactions, so we measure those directly rather than the
        // (specifier-free) merkle roots used for hashing.
        let mut len = 8 + 8 + 32; // timestamp + nonce + parent_id
        len += crate::encoding::encode(&self.miner_payouts).len();
        len += crate::encoding::encode(&self.transactions).len();
        len
    }

    /// Builds the network genesis block: parent zero, nonce zero, a single
    /// siafund output of `siafund_count` to `claim_unlock_hash` (§6).
    pub fn genesis(timestamp: u64, siafund_count: u64, claim_unlock_conditions: &UnlockConditions) -> Block {
        let mut tx = Transaction::default();
        tx.siafund_outputs.push(crate::transaction::SiafundOutput {
            value: Currency::from_u64(siafund_count),
            unlock_hash: claim_unlock_conditions.unlock_hash(),
            claim_start: Currency::zero(),
        });
        Block {
            parent_id: BlockID(Hash::ZERO),
            timestamp,
            nonce: 0,
            miner_payouts: Vec::new(),
            transactions: vec![tx],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_siafund_output() {
        let uc = UnlockConditions::default();
        let genesis = Block::genesis(1_433_600_000, 10_000, &uc);
        assert_eq!(genesis.transactions.len(), 1);
        assert_eq!(genesis.transactions[0].siafund_outputs.len(), 1);
        assert_eq!(genesis.transactions[0].siafund_outputs[0].value, Currency::from_u64(10_000));
    }

    #[test]
    fn id_changes_with_nonce() {
        let uc = UnlockConditions::default();
        let mut b = Block::genesis(0, 1, &uc);
        let id1 = b.id();
        b.nonce = 1;
        assert_ne!(id1, b.id());
    }
}
