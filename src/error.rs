use crate::id::{BlockID, FileContractID, SiacoinOutputID, SiafundOutputID};
use thiserror::Error;

/// Every way `accept_block` and the validation pipeline it drives can fail.
///
/// Variants map 1:1 onto the error kinds a caller needs to distinguish:
/// `BlockKnown`/`BadBlock`/`Orphan` are informational and never corrupt
/// state, everything else is fatal for the block that triggered it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("block {0} is already known")]
    BlockKnown(BlockID),

    #[error("block {0} is in the bad block set")]
    BadBlock(BlockID),

    #[error("parent of block {0} is not known; treated as orphan")]
    Orphan(BlockID),

    #[error("block timestamp is not greater than the earliest allowed timestamp")]
    EarlyTimestamp,

    #[error("block timestamp {0} is too far in the future (now {1})")]
    FutureTimestamp(u64, u64),

    #[error("encoded block size {0} exceeds the limit {1}")]
    LargeBlock(usize, usize),

    #[error("block id does not meet the required target")]
    MissedTarget,

    #[error("transaction merkle root does not match the block's transactions")]
    BadMerkleRoot,

    #[error("sum of miner payouts does not equal coinbase plus fees")]
    MinerPayout,

    #[error("referenced siacoin output {0} is missing")]
    MissingOutput(SiacoinOutputID),

    #[error("referenced file contract {0} is missing")]
    MissingFileContract(FileContractID),

    #[error("referenced siafund output {0} is missing")]
    MissingSiafundOutput(SiafundOutputID),

    #[error("a signature failed to verify")]
    InvalidSignature,

    #[error("an input's required signatures were not all supplied")]
    MissingSignatures,

    #[error("storage proof failed to verify against the contract's merkle root")]
    StorageProofInvalid,

    #[error("a storage proof was combined with another element class in the same transaction")]
    StorageProofExclusivity,

    #[error("transaction inputs do not equal outputs plus fees plus payouts")]
    FundsMismatch,

    #[error("siafund inputs do not equal siafund outputs")]
    SiafundMismatch,

    #[error("an input id or element id is used twice")]
    DoubleSpend,

    #[error("a file contract is terminated or proven more than once")]
    DuplicateContractAction,

    #[error("a new file contract's output sums do not satisfy payout - tax / payout")]
    InvalidContractOutputSums,

    #[error("a file contract's window has already opened; terminations are locked out")]
    ContractWindowClosed,

    #[error("an unlock condition's timelock has not yet elapsed")]
    TimelockNotMet,

    #[error("an output, payout, or siafund value must be strictly positive")]
    NonPositiveValue,

    #[error("a siafund output's claim-start must be zero in its wire form")]
    NonZeroClaimStart,

    #[error("a new file contract's start/expiration heights are invalid")]
    InvalidContractWindow,

    #[error("transaction is too large")]
    TransactionTooLarge,

    #[error("attempted to query a contract before its storage-proof trigger block exists")]
    TriggerBlockNotReached,

    #[error("unknown block id {0}")]
    UnknownBlock(BlockID),

    #[error("unknown file contract id {0}")]
    UnknownContract(FileContractID),

    #[error("re-applying the originally reverted fork failed after an aborted reorg: {0}")]
    ReorgRollbackFailed(String),

    #[error("canonical encoding error: {0}")]
    Encoding(String),

    #[error("currency arithmetic underflowed")]
    CurrencyUnderflow,

    #[error("currency value does not fit the wire encoding (more than 255 bytes)")]
    CurrencyTooLarge,
}

pub type Result<T> = core::result::Result<T, ConsensusError>;
