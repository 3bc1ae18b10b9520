// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, prices, exchange rates, unit-of-account values, timestamps. each is a newtype
// so the compiler catches unit mixups (a refPerTok rate is not a price).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

// 1.1: exchange rate between a wrapped token and its reference asset,
// expressed as reference units per token. zero is legal (a fully drained
// pool), negative is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn one() -> Self {
        Self(Decimal::ONE)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Scale the rate by a factor, e.g. the retained fraction after hiding.
    pub fn scale(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: unit-of-account amount. backing values, liabilities, claimed rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UoaValue(Decimal);

impl UoaValue {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: UoaValue) -> Self {
        Self(self.0 + other.0)
    }
}

impl fmt::Display for UoaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for UoaValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UoaValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for UoaValue {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc.add(v))
    }
}

impl<'a> Sum<&'a UoaValue> for UoaValue {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc.add(*v))
    }
}

// 1.3: second-resolution timestamp. oracle feeds report whole seconds, and the
// grace window arithmetic only needs second granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Seconds elapsed since `earlier`. Saturates at zero for out-of-order inputs.
    pub fn secs_since(&self, earlier: Timestamp) -> i64 {
        (self.0 - earlier.0).max(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn exchange_rate_allows_zero() {
        assert!(ExchangeRate::new(Decimal::ZERO).is_some());
        assert!(ExchangeRate::new(dec!(-0.01)).is_none());
    }

    #[test]
    fn exchange_rate_max() {
        let a = ExchangeRate::new_unchecked(dec!(1.05));
        let b = ExchangeRate::new_unchecked(dec!(1.03));
        assert_eq!(a.max(b), a);
        assert_eq!(b.max(a), a);
    }

    #[test]
    fn timestamp_elapsed() {
        let t0 = Timestamp::from_secs(100);
        let t1 = Timestamp::from_secs(86_500);
        assert_eq!(t1.secs_since(t0), 86_400);
        // out-of-order reads saturate instead of going negative
        assert_eq!(t0.secs_since(t1), 0);
    }

    #[test]
    fn uoa_value_sum() {
        let total: UoaValue = [UoaValue::new(dec!(100)), UoaValue::new(dec!(250))]
            .iter()
            .sum();
        assert_eq!(total.value(), dec!(350));
    }
}
