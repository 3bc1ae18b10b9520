// Oracle Integration
//
// This module abstracts how the engine reads external market data. The core
// engine is agnostic to whether quotes come from Chainlink, a pool contract,
// or a liquid staking rate provider. We define traits and types that any
// source can implement, plus staleness enforcement at the read site.

use crate::types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// A single reading from an oracle feed: a quote plus the moment the feed
/// last updated it. The update time comes from the feed itself, not from
/// the caller's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReading {
    pub price: Decimal,
    pub updated_at: Timestamp,
}

impl FeedReading {
    pub fn new(price: Decimal, updated_at: Timestamp) -> Self {
        Self { price, updated_at }
    }

    pub fn age_secs(&self, now: Timestamp) -> i64 {
        now.secs_since(self.updated_at)
    }
}

/// Errors a collaborator read can produce. These are caught at the engine
/// boundary and downgraded; they never abort a caller iterating many assets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("feed '{0}' is unavailable")]
    Unavailable(String),

    #[error("feed '{feed}' returned a non-positive quote: {quote}")]
    NonPositiveQuote { feed: String, quote: Decimal },

    #[error("exchange rate source '{0}' returned a negative rate")]
    NegativeRate(String),
}

/// Trait for price oracle feeds. Implement this to integrate a specific
/// unit conversion (reference-to-unit-of-account, target-per-reference, ...).
pub trait OracleFeed {
    /// Human readable name, used in error reporting.
    fn name(&self) -> &str;

    /// Fetch the latest quote and its update time. A revert or transport
    /// failure surfaces as `FeedError`, never as a panic.
    fn read(&self) -> Result<FeedReading, FeedError>;
}

/// Trait for raw exchange rate sources (pool share rates, staking rates).
/// Reports reference units per wrapped token. May be manipulated upward
/// transiently; the appreciation tracker defends against that.
pub trait ExchangeRateSource {
    fn name(&self) -> &str;

    fn rate(&self) -> Result<Decimal, FeedError>;
}

/// An oracle feed paired with its staleness timeout. Each feed enforces its
/// own timeout independently at read time.
pub struct OracleHandle {
    feed: Box<dyn OracleFeed>,
    timeout_secs: i64,
}

/// Outcome of a staleness-checked read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedRead {
    Fresh(FeedReading),
    /// The feed answered but its last update is older than the timeout.
    Stale { reading: FeedReading, age_secs: i64 },
}

impl OracleHandle {
    pub fn new(feed: Box<dyn OracleFeed>, timeout_secs: i64) -> Self {
        Self { feed, timeout_secs }
    }

    pub fn timeout_secs(&self) -> i64 {
        self.timeout_secs
    }

    pub fn name(&self) -> &str {
        self.feed.name()
    }

    /// Read the feed and classify the result against this handle's timeout.
    /// A non-positive quote is reported as a feed failure: zero is a known
    /// oracle sentinel for "no answer", not a real price.
    pub fn read_checked(&self, now: Timestamp) -> Result<CheckedRead, FeedError> {
        let reading = self.feed.read()?;
        if reading.price <= Decimal::ZERO {
            return Err(FeedError::NonPositiveQuote {
                feed: self.feed.name().to_string(),
                quote: reading.price,
            });
        }
        let age = reading.age_secs(now);
        if age > self.timeout_secs {
            Ok(CheckedRead::Stale {
                reading,
                age_secs: age,
            })
        } else {
            Ok(CheckedRead::Fresh(reading))
        }
    }
}

impl std::fmt::Debug for OracleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleHandle")
            .field("feed", &self.feed.name())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Forwarding impls so a scenario can keep a shared handle to a mock after
/// the engine has boxed its own copy of the same `Rc`.
impl<F: OracleFeed> OracleFeed for std::rc::Rc<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&self) -> Result<FeedReading, FeedError> {
        (**self).read()
    }
}

impl<S: ExchangeRateSource> ExchangeRateSource for std::rc::Rc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn rate(&self) -> Result<Decimal, FeedError> {
        (**self).rate()
    }
}

/// Mock feed for tests and the simulator. Interior mutability so a scenario
/// holding an `Rc<MockFeed>` can move the quote while the engine reads it.
pub struct MockFeed {
    name: String,
    state: RefCell<MockFeedState>,
}

struct MockFeedState {
    price: Decimal,
    updated_at: Timestamp,
    healthy: bool,
}

impl MockFeed {
    pub fn new(name: &str, price: Decimal, updated_at: Timestamp) -> Self {
        Self {
            name: name.to_string(),
            state: RefCell::new(MockFeedState {
                price,
                updated_at,
                healthy: true,
            }),
        }
    }

    pub fn shared(name: &str, price: Decimal, updated_at: Timestamp) -> std::rc::Rc<Self> {
        std::rc::Rc::new(Self::new(name, price, updated_at))
    }

    pub fn set_price(&self, price: Decimal, updated_at: Timestamp) {
        let mut state = self.state.borrow_mut();
        state.price = price;
        state.updated_at = updated_at;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.borrow_mut().healthy = healthy;
    }
}

impl OracleFeed for MockFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<FeedReading, FeedError> {
        let state = self.state.borrow();
        if state.healthy {
            Ok(FeedReading::new(state.price, state.updated_at))
        } else {
            Err(FeedError::Unavailable(self.name.clone()))
        }
    }
}

/// Mock exchange rate source for tests and the simulator.
pub struct MockRateSource {
    name: String,
    state: RefCell<MockRateState>,
}

struct MockRateState {
    rate: Decimal,
    healthy: bool,
}

impl MockRateSource {
    pub fn new(name: &str, rate: Decimal) -> Self {
        Self {
            name: name.to_string(),
            state: RefCell::new(MockRateState {
                rate,
                healthy: true,
            }),
        }
    }

    pub fn shared(name: &str, rate: Decimal) -> std::rc::Rc<Self> {
        std::rc::Rc::new(Self::new(name, rate))
    }

    pub fn set_rate(&self, rate: Decimal) {
        self.state.borrow_mut().rate = rate;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.borrow_mut().healthy = healthy;
    }
}

impl ExchangeRateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate(&self) -> Result<Decimal, FeedError> {
        let state = self.state.borrow();
        if !state.healthy {
            return Err(FeedError::Unavailable(self.name.clone()));
        }
        if state.rate < Decimal::ZERO {
            return Err(FeedError::NegativeRate(self.name.clone()));
        }
        Ok(state.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn handle(price: Decimal, updated_at: i64, timeout: i64) -> OracleHandle {
        let feed = MockFeed::new("test", price, Timestamp::from_secs(updated_at));
        OracleHandle::new(Box::new(feed), timeout)
    }

    #[test]
    fn fresh_read_within_timeout() {
        let h = handle(dec!(1.00), 1000, 3600);
        let result = h.read_checked(Timestamp::from_secs(1030)).unwrap();
        assert!(matches!(result, CheckedRead::Fresh(r) if r.price == dec!(1.00)));
    }

    #[test]
    fn read_exactly_at_timeout_is_fresh() {
        let h = handle(dec!(1.00), 1000, 3600);
        let result = h.read_checked(Timestamp::from_secs(4600)).unwrap();
        assert!(matches!(result, CheckedRead::Fresh(_)));
    }

    #[test]
    fn read_past_timeout_is_stale() {
        let h = handle(dec!(1.00), 1000, 3600);
        let result = h.read_checked(Timestamp::from_secs(4601)).unwrap();
        assert!(matches!(result, CheckedRead::Stale { age_secs: 3601, .. }));
    }

    #[test]
    fn zero_quote_is_a_feed_failure() {
        let h = handle(Decimal::ZERO, 1000, 3600);
        let result = h.read_checked(Timestamp::from_secs(1001));
        assert!(matches!(result, Err(FeedError::NonPositiveQuote { .. })));
    }

    #[test]
    fn unhealthy_feed_reports_unavailable() {
        let feed = MockFeed::shared("chainlink", dec!(1.00), Timestamp::from_secs(0));
        let h = OracleHandle::new(Box::new(feed.clone()), 3600);

        feed.set_healthy(false);
        let result = h.read_checked(Timestamp::from_secs(10));
        assert!(matches!(result, Err(FeedError::Unavailable(_))));
    }

    #[test]
    fn shared_feed_updates_are_visible_through_the_handle() {
        let feed = MockFeed::shared("chainlink", dec!(1.00), Timestamp::from_secs(0));
        let h = OracleHandle::new(Box::new(feed.clone()), 3600);

        feed.set_price(dec!(0.97), Timestamp::from_secs(100));
        let result = h.read_checked(Timestamp::from_secs(150)).unwrap();
        assert!(matches!(result, CheckedRead::Fresh(r) if r.price == dec!(0.97)));
    }

    #[test]
    fn rate_source_rejects_negative() {
        let src = MockRateSource::new("pool", dec!(1.02));
        assert_eq!(src.rate().unwrap(), dec!(1.02));

        src.set_rate(dec!(-1));
        assert!(matches!(src.rate(), Err(FeedError::NegativeRate(_))));
    }
}
