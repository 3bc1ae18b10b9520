//! Portfolio read facade.
//!
//! Aggregates many collateral engines into portfolio-level views: total
//! backing value, per-asset basket shares, and a collateralization ratio
//! against an issued liability. Every per-asset read is fallible on its own;
//! an unpriceable or defaulted asset is zero-weighted and the traversal
//! continues. One bad asset must never block visibility into the others.

use crate::engine::CollateralEngine;
use crate::status::CollateralStatus;
use crate::types::{AssetId, Timestamp, UoaValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("asset {0:?} is already registered")]
    DuplicateAsset(AssetId),

    #[error("asset {0:?} is not registered")]
    UnknownAsset(AssetId),

    #[error("holding must be non-negative, got {0}")]
    NegativeHolding(Decimal),
}

/// One registered asset: the engine plus how many wrapped tokens the
/// protocol holds of it.
#[derive(Debug)]
struct Holding {
    engine: CollateralEngine,
    tokens: Decimal,
}

/// Valuation of a single asset inside a portfolio snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketShare {
    pub asset_id: AssetId,
    pub symbol: String,
    pub status: CollateralStatus,
    /// Conservative (low-price) value of the holding. Zero when the asset
    /// is unpriceable or defaulted.
    pub value: UoaValue,
    /// Fraction of the portfolio's countable backing, 0 when nothing counts.
    pub share: Decimal,
}

/// Registry of collateral engines. Insertion order is preserved for
/// deterministic iteration and reporting.
#[derive(Debug, Default)]
pub struct Portfolio {
    holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self {
            holdings: Vec::new(),
        }
    }

    /// Register an engine with its token holding. Engines that failed
    /// construction never reach this point; duplicates are rejected here.
    pub fn register(
        &mut self,
        engine: CollateralEngine,
        tokens: Decimal,
    ) -> Result<(), RegistryError> {
        if tokens < Decimal::ZERO {
            return Err(RegistryError::NegativeHolding(tokens));
        }
        let asset_id = engine.asset_id();
        if self.holdings.iter().any(|h| h.engine.asset_id() == asset_id) {
            return Err(RegistryError::DuplicateAsset(asset_id));
        }
        self.holdings.push(Holding { engine, tokens });
        Ok(())
    }

    pub fn set_holding(&mut self, asset_id: AssetId, tokens: Decimal) -> Result<(), RegistryError> {
        if tokens < Decimal::ZERO {
            return Err(RegistryError::NegativeHolding(tokens));
        }
        let holding = self
            .holdings
            .iter_mut()
            .find(|h| h.engine.asset_id() == asset_id)
            .ok_or(RegistryError::UnknownAsset(asset_id))?;
        holding.tokens = tokens;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn get(&self, asset_id: AssetId) -> Option<&CollateralEngine> {
        self.holdings
            .iter()
            .find(|h| h.engine.asset_id() == asset_id)
            .map(|h| &h.engine)
    }

    pub fn engines(&self) -> impl Iterator<Item = &CollateralEngine> {
        self.holdings.iter().map(|h| &h.engine)
    }

    /// Drive a refresh cycle across every registered asset. A defaulted or
    /// unpriceable asset cannot abort the sweep; refresh is infallible by
    /// design at the engine boundary.
    pub fn refresh_all(&mut self, now: Timestamp) {
        for holding in &mut self.holdings {
            holding.engine.refresh(now);
        }
    }

    /// Conservative value of one holding: tokens * low price. None when the
    /// asset currently has no defensible price.
    fn countable_value(holding: &Holding) -> Option<UoaValue> {
        if holding.engine.status() == CollateralStatus::Defaulted {
            return None;
        }
        let (low, _high) = holding.engine.price()?;
        Some(UoaValue::new(holding.tokens * low))
    }

    /// Total backing across priceable, non-defaulted assets. Skipped assets
    /// contribute zero rather than poisoning the sum.
    pub fn total_backing(&self) -> UoaValue {
        self.holdings
            .iter()
            .filter_map(Self::countable_value)
            .sum()
    }

    /// Per-asset valuation snapshot with portfolio shares.
    pub fn basket_breakdown(&self) -> Vec<BasketShare> {
        let total = self.total_backing();
        self.holdings
            .iter()
            .map(|holding| {
                let value = Self::countable_value(holding).unwrap_or_else(UoaValue::zero);
                let share = if total.is_zero() {
                    Decimal::ZERO
                } else {
                    value.value() / total.value()
                };
                BasketShare {
                    asset_id: holding.engine.asset_id(),
                    symbol: holding.engine.symbol().to_string(),
                    status: holding.engine.status(),
                    value,
                    share,
                }
            })
            .collect()
    }

    /// Backing per unit of issued liability. None when nothing is issued.
    pub fn collateralization_ratio(&self, issued: UoaValue) -> Option<Decimal> {
        if issued.value() <= Decimal::ZERO {
            return None;
        }
        Some(self.total_backing().value() / issued.value())
    }

    /// The most severe status across the basket. An empty portfolio is
    /// vacuously sound.
    pub fn worst_status(&self) -> CollateralStatus {
        self.holdings
            .iter()
            .map(|h| h.engine.status())
            .max()
            .unwrap_or(CollateralStatus::Sound)
    }
}
