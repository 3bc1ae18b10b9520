// 6.0: every observable state change produces an event. used for audit
// trails and for notifying external systems (the asset registry, keepers)
// without coupling the engine to them. the EventPayload enum lists all
// notification types the engine can emit.

use crate::status::CollateralStatus;
use crate::types::{AssetId, ExchangeRate, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Soundness events
    StatusChanged(StatusChangedEvent),

    // Valuation events
    PeakRateUpdated(PeakRateUpdatedEvent),

    // Reward events
    RewardsClaimed(RewardsClaimedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub asset_id: AssetId,
    pub from: CollateralStatus,
    pub to: CollateralStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakRateUpdatedEvent {
    pub asset_id: AssetId,
    pub peak_rate: ExchangeRate,
    pub exposed_rate: ExchangeRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsClaimedEvent {
    pub asset_id: AssetId,
    pub reward_token: String,
    // May be zero: a claim with nothing accrued is still reported
    pub amount: Decimal,
}
