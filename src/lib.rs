//! A proof-of-work blockchain consensus engine: block and transaction
//! validation, a reversible diff-based state model, fork-choice/reorg, and
//! change notification, built around siacoin/siafund outputs and
//! file-contract storage proofs.

pub mod apply;
pub mod block;
pub mod block_tree;
pub mod consensus;
pub mod currency;
pub mod diff;
pub mod encoding;
pub mod error;
pub mod fork;
pub mod id;
pub mod params;
pub mod signatures;
pub mod state;
pub mod subscribe;
pub mod target;
pub mod transaction;
pub mod unlock;
pub mod validation;

pub use consensus::Consensus;
pub use error::{ConsensusError, Result};
pub use params::{ConsensusParameters, Network};
