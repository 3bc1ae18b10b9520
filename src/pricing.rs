// 4.0: price estimation. combines oracle feeds with the exposed exchange rate
// into a bounded (low, mid, high) estimate plus the peg price the monitor
// watches. three combination modes, one per collateral family, selected once
// at construction. all pricing math lives here.

use crate::oracle::{CheckedRead, FeedError, FeedReading, OracleHandle};
use crate::types::{ExchangeRate, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The feeds a collateral instance prices through. Each variant carries only
/// the feeds its mode needs, so a misconfigured instance cannot be built.
#[derive(Debug)]
pub enum FeedSet {
    /// One feed quoting the reference asset in the unit of account. The
    /// reference is expected to track a fiat target, so the same quote
    /// doubles as the peg reading.
    FiatPegged { uoa_per_ref: OracleHandle },
    /// One feed quoting the target (== reference) in the unit of account.
    /// The peg holds structurally: the asset is its own target.
    SelfReferential { uoa_per_target: OracleHandle },
    /// Two chained feeds: target units per reference (the peg reading) and
    /// unit of account per target.
    NonFiat {
        target_per_ref: OracleHandle,
        uoa_per_target: OracleHandle,
    },
}

/// Fresh quotes for one refresh, already reduced to what the estimate needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuotes {
    /// Product of the chained conversions: unit of account per reference unit.
    pub uoa_per_ref: Decimal,
    /// Observed target units per reference unit. 1 when structurally pegged.
    pub peg_price: Decimal,
    /// Number of independent feeds combined into `uoa_per_ref`.
    pub feed_count: u32,
    /// Update time of the least recently updated feed involved.
    pub oldest_update: Timestamp,
}

/// Why no price is available. Cached by the engine between refreshes; callers
/// must treat any of these as "price currently unknown", never as zero.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    #[error("feed '{feed}' is stale: age {age_secs}s exceeds timeout {timeout_secs}s")]
    StaleFeed {
        feed: String,
        age_secs: i64,
        timeout_secs: i64,
    },

    #[error("feed read failed: {0}")]
    FeedFailed(#[from] FeedError),

    #[error("exchange rate source failed: {0}")]
    RateUnavailable(FeedError),

    #[error("no refresh has completed yet")]
    NotRefreshed,
}

impl PriceError {
    /// Feed-reported staleness, when the failure carries one. A transport
    /// failure has no timestamp to measure from.
    pub fn reported_age_secs(&self) -> Option<i64> {
        match self {
            PriceError::StaleFeed { age_secs, .. } => Some(*age_secs),
            _ => None,
        }
    }
}

impl FeedSet {
    /// Read every feed of this mode, enforcing each feed's own timeout.
    /// Any stale or failed feed makes the whole read unpriceable.
    pub fn read(&self, now: Timestamp) -> Result<FeedQuotes, PriceError> {
        match self {
            FeedSet::FiatPegged { uoa_per_ref } => {
                let reading = require_fresh(uoa_per_ref, now)?;
                Ok(FeedQuotes {
                    uoa_per_ref: reading.price,
                    peg_price: reading.price,
                    feed_count: 1,
                    oldest_update: reading.updated_at,
                })
            }
            FeedSet::SelfReferential { uoa_per_target } => {
                let reading = require_fresh(uoa_per_target, now)?;
                Ok(FeedQuotes {
                    uoa_per_ref: reading.price,
                    peg_price: Decimal::ONE,
                    feed_count: 1,
                    oldest_update: reading.updated_at,
                })
            }
            FeedSet::NonFiat {
                target_per_ref,
                uoa_per_target,
            } => {
                let peg = require_fresh(target_per_ref, now)?;
                let uoa = require_fresh(uoa_per_target, now)?;
                Ok(FeedQuotes {
                    uoa_per_ref: peg.price * uoa.price,
                    peg_price: peg.price,
                    feed_count: 2,
                    oldest_update: peg.updated_at.min(uoa.updated_at),
                })
            }
        }
    }

    /// Every handle in the set, for construction-time timeout validation.
    pub fn handles(&self) -> Vec<&OracleHandle> {
        match self {
            FeedSet::FiatPegged { uoa_per_ref } => vec![uoa_per_ref],
            FeedSet::SelfReferential { uoa_per_target } => vec![uoa_per_target],
            FeedSet::NonFiat {
                target_per_ref,
                uoa_per_target,
            } => vec![target_per_ref, uoa_per_target],
        }
    }
}

fn require_fresh(handle: &OracleHandle, now: Timestamp) -> Result<FeedReading, PriceError> {
    match handle.read_checked(now)? {
        CheckedRead::Fresh(reading) => Ok(reading),
        CheckedRead::Stale { age_secs, .. } => Err(PriceError::StaleFeed {
            feed: handle.name().to_string(),
            age_secs,
            timeout_secs: handle.timeout_secs(),
        }),
    }
}

/// Bounded price estimate for one wrapped token, in the unit of account.
/// Recomputed each refresh, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub low: Decimal,
    pub mid: Decimal,
    pub high: Decimal,
    /// Target units per reference unit, compared against 1 by the monitor.
    pub peg_price: Decimal,
}

impl PriceEstimate {
    /// mid = uoa_per_ref * exposed rate, with an uncertainty band derived
    /// from the per-feed oracle error. Chained feeds compound: the combined
    /// relative error for n feeds is (1 + e)^n - 1, not n * e.
    pub fn build(quotes: &FeedQuotes, exposed_rate: ExchangeRate, oracle_error: Decimal) -> Self {
        let mid = quotes.uoa_per_ref * exposed_rate.value();
        let err = mid * combined_oracle_error(oracle_error, quotes.feed_count);
        Self {
            low: (mid - err).max(Decimal::ZERO),
            mid,
            high: mid + err,
            peg_price: quotes.peg_price,
        }
    }

    /// Absolute peg deviation as a fraction of the expected peg of 1.
    pub fn peg_deviation(&self) -> Decimal {
        (self.peg_price - Decimal::ONE).abs()
    }
}

/// Relative uncertainty after chaining `feeds` independent reads that each
/// carry relative error `e`.
pub fn combined_oracle_error(e: Decimal, feeds: u32) -> Decimal {
    let mut compound = Decimal::ONE;
    for _ in 0..feeds {
        compound *= Decimal::ONE + e;
    }
    compound - Decimal::ONE
}
