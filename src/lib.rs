// collateral-core: collateral valuation and default detection engine.
// soundness-first architecture: appreciation tracking, oracle-defended
// pricing and the default state machine take priority.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AssetId, ExchangeRate, UoaValue, Timestamp
//   2.x  config.rs: per-asset economic parameters, validation, presets
//   3.x  engine.rs: collateral engine: refresh cycle, cached price, rewards
//   4.x  pricing.rs: feed sets, bounded price estimates, peg deviation
//   5.x  oracle.rs: feed traits, staleness enforcement (mocked sources)
//   6.x  events.rs: state transition events for audit
//   7.x  rewards.rs: reward stream pass-through (mocked)
//   8.x  appreciation.rs: exchange rate high water mark, revenue hiding
//   9.x  status.rs: SOUND/IFFY/DEFAULT state machine with grace timer
//   10.x portfolio.rs: read-only aggregation over many engines

// core valuation modules
pub mod appreciation;
pub mod engine;
pub mod pricing;
pub mod status;
pub mod types;

// integration modules
pub mod config;
pub mod events;
pub mod oracle;
pub mod portfolio;
pub mod rewards;

// re exports for convenience
pub use appreciation::*;
pub use engine::*;
pub use pricing::*;
pub use status::*;
pub use types::*;
pub use config::{CollateralConfig, ConfigError};
pub use events::{
    Event, EventId, EventPayload, PeakRateUpdatedEvent, RewardsClaimedEvent, StatusChangedEvent,
};
pub use oracle::{
    CheckedRead, ExchangeRateSource, FeedError, FeedReading, MockFeed, MockRateSource, OracleFeed,
    OracleHandle,
};
pub use portfolio::{BasketShare, Portfolio, RegistryError};
pub use rewards::{MockRewardSource, RewardError, RewardSource};
