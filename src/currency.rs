//! Arbitrary-precision, non-negative currency amounts (§3).
//!
//! All arithmetic returns a new value; there is no in-place mutation. The
//! wire form is a length byte followed by the big-endian minimal-length byte
//! representation of the value (max 255 bytes), matching the rest of the
//! crate's canonical encoding even though `Currency` needs its own format
//! rather than the usual fixed-width little-endian one.

use crate::encoding::Encodable;
use crate::error::{ConsensusError, Result};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(BigUint);

impl Currency {
    pub fn zero() -> Self {
        Currency(BigUint::zero())
    }

    pub fn from_u64(v: u64) -> Self {
        Currency(BigUint::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Currency) -> Currency {
        Currency(&self.0 + &other.0)
    }

    /// Fails (rather than wrapping/panicking) when the result would be negative.
    pub fn checked_sub(&self, other: &Currency) -> Result<Currency> {
        if self.0 < other.0 {
            Err(ConsensusError::CurrencyUnderflow)
        } else {
            Ok(Currency(&self.0 - &other.0))
        }
    }

    pub fn checked_mul(&self, other: &Currency) -> Currency {
        Currency(&self.0 * &other.0)
    }

    pub fn checked_mul_u64(&self, other: u64) -> Currency {
        Currency(&self.0 * BigUint::from(other))
    }

    pub fn div(&self, other: &Currency) -> Currency {
        if other.is_zero() {
            return Currency::zero();
        }
        Currency(&self.0 / &other.0)
    }

    /// `self * numerator / denominator`, truncating.
    pub fn mul_by_rational(&self, numerator: u64, denominator: u64) -> Currency {
        if denominator == 0 {
            return Currency::zero();
        }
        Currency((&self.0 * BigUint::from(numerator)) / BigUint::from(denominator))
    }

    /// Rounds `self` down to the nearest multiple of `n` (used for the
    /// siafund-pool tax split, §4.6).
    pub fn round_down_to_multiple(&self, n: u64) -> Currency {
        if n == 0 {
            return self.clone();
        }
        let n = BigUint::from(n);
        let rem = &self.0 % &n;
        Currency(&self.0 - rem)
    }

    pub fn sqrt(&self) -> Currency {
        Currency(self.0.sqrt())
    }

    pub fn to_wire_bytes(&self) -> Result<Vec<u8>> {
        let bytes = if self.0.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        };
        if bytes.len() > 255 {
            return Err(ConsensusError::CurrencyTooLarge);
        }
        Ok(bytes)
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Self {
        Currency(BigUint::from_bytes_be(bytes))
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::zero()
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Currency {
    type Output = Currency;
    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(&rhs)
    }
}

impl<'a> Add<&'a Currency> for &'a Currency {
    type Output = Currency;
    fn add(self, rhs: &'a Currency) -> Self::Output {
        self.checked_add(rhs)
    }
}

impl Sub for Currency {
    type Output = Currency;
    fn sub(self, rhs: Self) -> Self::Output {
        self.checked_sub(&rhs).expect("Currency subtraction underflowed")
    }
}

impl Mul for Currency {
    type Output = Currency;
    fn mul(self, rhs: Self) -> Self::Output {
        self.checked_mul(&rhs)
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |a, b| a.checked_add(&b))
    }
}

impl<'a> Sum<&'a Currency> for Currency {
    fn sum<I: Iterator<Item = &'a Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |a, b| a.checked_add(b))
    }
}

impl Encodable for Currency {
    fn encode(&self, buf: &mut Vec<u8>) {
        let bytes = self.to_wire_bytes().expect("currency exceeds wire limit");
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(&bytes);
    }
}
