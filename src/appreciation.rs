//! Appreciation tracking with revenue hiding.
//!
//! Interest-bearing collateral appreciates through its exchange rate. The
//! tracker keeps a high water mark of the true rate and reports a slightly
//! smaller exposed rate to the rest of the system. An attacker who can
//! transiently inflate the observed rate (flash-loan rate manipulation)
//! gains nothing below the hidden slice, and a small organic loss in the
//! underlying pool does not immediately break the reported backing.

use crate::types::ExchangeRate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// High water mark of the true exchange rate plus the hiding factor fixed
/// at construction. Owned by exactly one engine instance; mutated only
/// during refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppreciationState {
    /// Highest true rate ever observed. Monotonically non-decreasing.
    peak_rate: ExchangeRate,
    /// Fraction of appreciation withheld, 0 <= h < 1.
    hiding: Decimal,
}

impl AppreciationState {
    /// Start tracking from the first observed rate. Validation of `hiding`
    /// happens in config validation before any state is built.
    pub fn new(initial_rate: ExchangeRate, hiding: Decimal) -> Self {
        Self {
            peak_rate: initial_rate,
            hiding,
        }
    }

    pub fn peak_rate(&self) -> ExchangeRate {
        self.peak_rate
    }

    /// The rate reported to the rest of the system: peak * (1 - h).
    /// Non-decreasing across updates for fixed h, and never above the peak.
    pub fn exposed_rate(&self) -> ExchangeRate {
        self.peak_rate.scale(Decimal::ONE - self.hiding)
    }

    /// Observe the current true rate. Ratchets the peak upward only; a dip
    /// leaves the peak (and the exposed rate) where it was. Returns the
    /// exposed rate after the update.
    pub fn update(&mut self, raw_rate: ExchangeRate) -> ExchangeRate {
        self.peak_rate = self.peak_rate.max(raw_rate);
        self.exposed_rate()
    }

    /// A raw rate below the exposed rate means the underlying lost more
    /// than the hidden margin: the backing already promised to holders no
    /// longer exists. The monitor treats this as a peg-level fault; the
    /// peak is never unwound here.
    pub fn promise_broken(&self, raw_rate: ExchangeRate) -> bool {
        raw_rate < self.exposed_rate()
    }
}
