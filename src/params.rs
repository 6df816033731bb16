//! Protocol constants (§6, §9 "global constants" design note).
//!
//! Constants are grouped into an immutable [`ConsensusParameters`] value
//! selected by [`Network`] rather than mutable globals, so test code can
//! swap in a cheap profile via [`ConsensusParameters::test`] without any
//! shared mutable state.

use crate::currency::Currency;
use crate::target::{Depth, Target};
use crate::unlock::{SiaPublicKey, UnlockConditions};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Dev,
}

/// A clamping rational used for retarget/surpass bounds: `numerator / denominator`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Ratio { numerator, denominator }
    }

    pub fn as_tuple(&self) -> (u64, u64) {
        (self.numerator, self.denominator)
    }
}

#[derive(Clone, Debug)]
pub struct ConsensusParameters {
    pub network: Network,
    pub block_size_limit: usize,
    pub block_frequency: u64,
    pub target_window: u64,
    pub median_timestamp_window: usize,
    pub future_threshold: u64,
    pub siafund_count: u64,
    pub siafund_portion: Ratio,
    pub maturity_delay: u64,
    pub initial_coinbase: u64,
    pub minimum_coinbase: u64,
    pub coinbase_multiplier: u64,
    pub max_adjustment_up: Ratio,
    pub max_adjustment_down: Ratio,
    pub root_target: Target,
    pub root_depth: Depth,
    pub surpass_threshold: Ratio,
    pub genesis_timestamp: u64,
    pub genesis_claim_unlock_conditions: UnlockConditions,
    /// Fixed-size chunk a storage proof's segment index is drawn from
    /// (§4.2.1). Not in spec.md's protocol-constants table; resolved as an
    /// open question in DESIGN.md using the source's actual segment size.
    pub segment_size: u64,
}

impl ConsensusParameters {
    pub fn from_network(network: Network) -> Self {
        match network {
            Network::Mainnet => mainnet(),
            Network::Testnet => testnet(),
            Network::Dev => dev(),
        }
    }

    /// A `Dev`-like profile with tiny windows and limits, for fast property
    /// tests (§9: "isolate behind an explicit configure-for-tests entry
    /// point", mirroring how the source's test builds shrink constants).
    pub fn test() -> Self {
        dev()
    }

    /// `max(minimum_coinbase, initial_coinbase - height) * coinbase_multiplier` (§6).
    pub fn coinbase(&self, height: u64) -> Currency {
        let base = self.initial_coinbase.saturating_sub(height).max(self.minimum_coinbase);
        Currency::from_u64(base).checked_mul_u64(self.coinbase_multiplier)
    }
}

fn genesis_claim_conditions() -> UnlockConditions {
    // An always-unlockable (zero signatures required) claim address; the
    // released crate's actual genesis allocation is a deployment decision
    // made outside this library, so a harmless placeholder stands in here.
    UnlockConditions { timelock: 0, public_keys: Vec::<SiaPublicKey>::new(), signatures_required: 0 }
}

fn mainnet() -> ConsensusParameters {
    ConsensusParameters {
        network: Network::Mainnet,
        block_size_limit: 2_000_000,
        block_frequency: 600,
        target_window: 1_000,
        median_timestamp_window: 11,
        future_threshold: 3 * 3_600,
        siafund_count: 10_000,
        siafund_portion: Ratio::new(39, 1_000),
        maturity_delay: 144,
        initial_coinbase: 300_000,
        minimum_coinbase: 30_000,
        coinbase_multiplier: 100_000,
        max_adjustment_up: Ratio::new(25, 10),
        max_adjustment_down: Ratio::new(10, 25),
        root_target: Target([0, 0, 0, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
        root_depth: Target::MAX,
        surpass_threshold: Ratio::new(5, 100),
        genesis_timestamp: 1_433_600_000,
        genesis_claim_unlock_conditions: genesis_claim_conditions(),
        segment_size: 64 * 1024,
    }
}

fn testnet() -> ConsensusParameters {
    ConsensusParameters { network: Network::Testnet, block_frequency: 120, ..mainnet() }
}

fn dev() -> ConsensusParameters {
    ConsensusParameters {
        network: Network::Dev,
        block_size_limit: 100_000,
        block_frequency: 1,
        target_window: 20,
        median_timestamp_window: 11,
        future_threshold: 3 * 3_600,
        siafund_count: 10_000,
        siafund_portion: Ratio::new(39, 1_000),
        maturity_delay: 3,
        initial_coinbase: 300_000,
        minimum_coinbase: 30_000,
        coinbase_multiplier: 100_000,
        max_adjustment_up: Ratio::new(10_001, 10_000),
        max_adjustment_down: Ratio::new(9_999, 10_000),
        root_target: Target::MAX,
        root_depth: Target::MAX,
        surpass_threshold: Ratio::new(5, 100),
        genesis_timestamp: 1_433_600_000,
        genesis_claim_unlock_conditions: genesis_claim_conditions(),
        segment_size: 64 * 1024,
    }
}
