//! Target/difficulty arithmetic (§4.1).
//!
//! A `Target` is a 32-byte value read as a big-endian unsigned integer. A
//! block is valid when its id, read the same way, is less than or equal to
//! the parent's target-for-children. Smaller target == more work == a
//! "deeper" chain, which is also how `Depth` is represented: the two are
//! interchangeable for the harmonic-mean combination in `combine_depth`.

use crate::encoding::Encodable;
use crate::id::{BlockID, Hash};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(pub [u8; 32]);

impl Target {
    /// The easiest possible target: genesis starts here so the first blocks
    /// of a freshly-created chain are cheap to mine.
    pub const MAX: Target = Target([0xff; 32]);

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    pub fn from_biguint(v: &BigUint) -> Target {
        let bytes = v.to_bytes_be();
        let mut out = [0xffu8; 32];
        if bytes.len() >= 32 {
            out.copy_from_slice(&bytes[bytes.len() - 32..]);
        } else {
            out = [0u8; 32];
            out[32 - bytes.len()..].copy_from_slice(&bytes);
        }
        Target(out)
    }

    pub fn meets(&self, id: &BlockID) -> bool {
        id.as_bytes()[..] <= self.0[..]
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Encodable for Target {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", hex::encode(self.0))
    }
}

impl From<Hash> for Target {
    fn from(h: Hash) -> Self {
        Target(h.0)
    }
}

/// `Depth` shares `Target`'s representation (§3, §4.1).
pub type Depth = Target;

/// `inverse(1/parent_target + 1/parent_depth)`. Since `1/(1/a+1/b) = ab/(a+b)`
/// this needs no fractional arithmetic: both inputs and the result are
/// plain 256-bit unsigned magnitudes.
pub fn combine_depth(parent_target: &Target, parent_depth: &Depth) -> Depth {
    let a = parent_target.to_biguint();
    let b = parent_depth.to_biguint();
    if a == BigUint::from(0u8) && b == BigUint::from(0u8) {
        return Target::from_biguint(&BigUint::from(0u8));
    }
    let combined = (&a * &b) / (&a + &b);
    Target::from_biguint(&combined)
}

/// Child target of a block whose parent took `time_passed` seconds to
/// produce, measured against `expected_time_passed` for a window of blocks
/// ending `target_window` blocks back (§4.1).
pub fn retarget(
    parent_target: &Target,
    time_passed: i64,
    expected_time_passed: i64,
    max_adjustment_up: (u64, u64),
    max_adjustment_down: (u64, u64),
) -> Target {
    let expected = expected_time_passed.max(1) as u64;
    let passed = time_passed.max(1) as u64;

    let upper_bound = expected.saturating_mul(max_adjustment_up.0) / max_adjustment_up.1;
    let lower_bound = expected.saturating_mul(max_adjustment_down.0) / max_adjustment_down.1.max(1);

    let clamped = passed.clamp(lower_bound.max(1), upper_bound.max(lower_bound.max(1)));

    let parent = parent_target.to_biguint();
    let new_target = (parent * BigUint::from(clamped)) / BigUint::from(expected);
    Target::from_biguint(&new_target)
}
