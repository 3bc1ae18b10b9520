// 2.0 config.rs: all the economic parameters of one collateral instance in
// one place. fixed at construction, shared read-only afterwards.
// 2.1 feed presence is structural (FeedSet variants), so validation here
// covers the numeric ranges and the per-feed timeouts.

use crate::types::AssetId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// Complete configuration for a collateral instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralConfig {
    pub asset_id: AssetId,
    // Wrapped token symbol (e.g. "cUSDC")
    pub symbol: String,
    // The economic peg this asset is expected to track (e.g. "USD", "ETH")
    pub target_name: String,
    // Relative uncertainty of a single oracle read (e.g. 0.005 = 0.5%)
    pub oracle_error: Decimal,
    // Largest lot the disposal layer may trade at once, in the unit of account
    pub max_trade_volume: Decimal,
    // Maximum tolerated peg deviation before the asset turns iffy
    pub default_threshold: Decimal,
    // Grace period an asset may spend iffy before being forced to default
    pub delay_until_default_secs: i64,
    // Absolute staleness bound: past this, an unknown price is itself a default
    pub price_timeout_secs: i64,
    // Fraction of appreciation withheld as a manipulation/loss buffer
    pub revenue_hiding: Decimal,
}

impl CollateralConfig {
    // Preset: a fiat-pegged interest-bearing stable wrapper
    pub fn fiat_stable(asset_id: AssetId, symbol: &str) -> Self {
        Self {
            asset_id,
            symbol: symbol.to_string(),
            target_name: "USD".to_string(),
            oracle_error: dec!(0.005),
            max_trade_volume: dec!(1_000_000),
            default_threshold: dec!(0.01),
            delay_until_default_secs: 86_400,
            price_timeout_secs: 604_800, // 1 week
            revenue_hiding: dec!(0.0001),
        }
    }

    // Preset: a liquid staking token priced against its own target
    pub fn staked_native(asset_id: AssetId, symbol: &str, target: &str) -> Self {
        Self {
            asset_id,
            symbol: symbol.to_string(),
            target_name: target.to_string(),
            oracle_error: dec!(0.01),
            max_trade_volume: dec!(5_000_000),
            default_threshold: dec!(0.02),
            delay_until_default_secs: 86_400,
            price_timeout_secs: 604_800,
            revenue_hiding: dec!(0.001),
        }
    }

    // Preset: a wrapped non-fiat asset priced through two chained feeds
    pub fn wrapped_non_fiat(asset_id: AssetId, symbol: &str, target: &str) -> Self {
        Self {
            asset_id,
            symbol: symbol.to_string(),
            target_name: target.to_string(),
            oracle_error: dec!(0.01),
            max_trade_volume: dec!(2_000_000),
            default_threshold: dec!(0.02),
            delay_until_default_secs: 86_400,
            price_timeout_secs: 604_800,
            revenue_hiding: dec!(0.0001),
        }
    }

    // Validate the configuration for internal consistency. A config that
    // fails here must never become a registered instance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() || self.target_name.is_empty() {
            return Err(ConfigError::MissingIdentity);
        }

        if self.oracle_error < Decimal::ZERO || self.oracle_error >= Decimal::ONE {
            return Err(ConfigError::InvalidFraction {
                field: "oracle_error",
                value: self.oracle_error,
            });
        }

        if self.revenue_hiding < Decimal::ZERO || self.revenue_hiding >= Decimal::ONE {
            return Err(ConfigError::InvalidFraction {
                field: "revenue_hiding",
                value: self.revenue_hiding,
            });
        }

        if self.default_threshold <= Decimal::ZERO || self.default_threshold >= Decimal::ONE {
            return Err(ConfigError::InvalidFraction {
                field: "default_threshold",
                value: self.default_threshold,
            });
        }

        if self.max_trade_volume <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveVolume {
                value: self.max_trade_volume,
            });
        }

        if self.delay_until_default_secs <= 0 {
            return Err(ConfigError::NonPositiveTimeout {
                field: "delay_until_default_secs",
                value: self.delay_until_default_secs,
            });
        }

        if self.price_timeout_secs <= 0 {
            return Err(ConfigError::NonPositiveTimeout {
                field: "price_timeout_secs",
                value: self.price_timeout_secs,
            });
        }

        Ok(())
    }
}

// Configuration validation errors. Construction-time and fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("symbol and target name must be non-empty")]
    MissingIdentity,

    #[error("{field} must be a fraction in [0, 1), got {value}")]
    InvalidFraction {
        field: &'static str,
        value: Decimal,
    },

    #[error("max_trade_volume must be positive, got {value}")]
    NonPositiveVolume { value: Decimal },

    #[error("{field} must be strictly positive, got {value}")]
    NonPositiveTimeout { field: &'static str, value: i64 },

    #[error("feed timeout for '{feed}' must be strictly positive, got {value}")]
    NonPositiveFeedTimeout { feed: String, value: i64 },
}
