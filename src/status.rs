//! Soundness state machine.
//!
//! A collateral asset is Sound until its peg comes into question, Iffy while
//! the question is open, and Defaulted once the question has stood
//! unanswered for the configured grace period. Brief oracle blips must not
//! trip a permanent default, and a sustained peg break must not be tolerated
//! indefinitely; the grace window bounds that trade-off. Default is
//! terminal: recovery requires replacing the instance, not refreshing it.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered by severity: Sound < Iffy < Defaulted, so a portfolio's worst
/// status is a plain max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralStatus {
    Sound,
    Iffy,
    Defaulted,
}

impl fmt::Display for CollateralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollateralStatus::Sound => write!(f, "SOUND"),
            CollateralStatus::Iffy => write!(f, "IFFY"),
            CollateralStatus::Defaulted => write!(f, "DEFAULT"),
        }
    }
}

/// What one refresh cycle observed about the peg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PegObservation {
    /// Deviation under threshold and the appreciation promise intact.
    Healthy,
    /// Deviation over threshold, or the raw rate broke the exposed-rate
    /// promise.
    Breached,
    /// Price unknown this cycle (stale or failed feed) but still inside the
    /// price timeout window. Not evidence in either direction.
    Unknown,
    /// Price has been unknowable past the price timeout. The system cannot
    /// operate blind; this is itself a default condition.
    UnknownTooLong,
}

/// Mutable soundness state, owned by one engine instance and advanced only
/// during refresh. `iffy_since` is meaningful only while Iffy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundnessState {
    status: CollateralStatus,
    iffy_since: Option<Timestamp>,
}

impl SoundnessState {
    pub fn new() -> Self {
        Self {
            status: CollateralStatus::Sound,
            iffy_since: None,
        }
    }

    pub fn status(&self) -> CollateralStatus {
        self.status
    }

    pub fn iffy_since(&self) -> Option<Timestamp> {
        self.iffy_since
    }

    /// Apply one refresh observation. Returns the (from, to) pair when a
    /// transition happened, for event emission. Calling twice with the same
    /// observation at the same instant is idempotent: the second call makes
    /// no further transition.
    pub fn apply(
        &mut self,
        observation: PegObservation,
        now: Timestamp,
        delay_until_default_secs: i64,
    ) -> Option<(CollateralStatus, CollateralStatus)> {
        if self.status == CollateralStatus::Defaulted {
            return None;
        }

        if observation == PegObservation::UnknownTooLong {
            return Some(self.force_default());
        }

        // grace deadline check comes before the recovery check: a condition
        // observed to clear at or after the deadline still defaults.
        if let Some(since) = self.iffy_since {
            if now.secs_since(since) >= delay_until_default_secs {
                return Some(self.force_default());
            }
        }

        match (self.status, observation) {
            (CollateralStatus::Sound, PegObservation::Breached) => {
                self.status = CollateralStatus::Iffy;
                self.iffy_since = Some(now);
                Some((CollateralStatus::Sound, CollateralStatus::Iffy))
            }
            (CollateralStatus::Iffy, PegObservation::Healthy) => {
                self.status = CollateralStatus::Sound;
                self.iffy_since = None;
                Some((CollateralStatus::Iffy, CollateralStatus::Sound))
            }
            // already iffy and still breached: the clock keeps running.
            // unknown observations move nothing.
            _ => None,
        }
    }

    fn force_default(&mut self) -> (CollateralStatus, CollateralStatus) {
        let from = self.status;
        self.status = CollateralStatus::Defaulted;
        self.iffy_since = None;
        (from, CollateralStatus::Defaulted)
    }
}

impl Default for SoundnessState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;

    fn t(secs: i64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn starts_sound() {
        let state = SoundnessState::new();
        assert_eq!(state.status(), CollateralStatus::Sound);
        assert!(state.iffy_since().is_none());
    }

    #[test]
    fn breach_marks_iffy_and_records_entry_time() {
        let mut state = SoundnessState::new();
        let change = state.apply(PegObservation::Breached, t(0), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Sound, CollateralStatus::Iffy))
        );
        assert_eq!(state.iffy_since(), Some(t(0)));
    }

    #[test]
    fn repeated_breach_keeps_original_entry_time() {
        let mut state = SoundnessState::new();
        state.apply(PegObservation::Breached, t(0), DAY);
        let change = state.apply(PegObservation::Breached, t(500), DAY);
        assert!(change.is_none());
        assert_eq!(state.iffy_since(), Some(t(0)));
    }

    #[test]
    fn recovery_inside_grace_window_returns_sound() {
        let mut state = SoundnessState::new();
        state.apply(PegObservation::Breached, t(0), DAY);
        let change = state.apply(PegObservation::Healthy, t(500), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Iffy, CollateralStatus::Sound))
        );
        assert!(state.iffy_since().is_none());
    }

    #[test]
    fn breach_persisting_to_deadline_defaults() {
        let mut state = SoundnessState::new();
        state.apply(PegObservation::Breached, t(0), DAY);
        let change = state.apply(PegObservation::Breached, t(DAY), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Iffy, CollateralStatus::Defaulted))
        );
    }

    #[test]
    fn recovery_observed_at_deadline_still_defaults() {
        let mut state = SoundnessState::new();
        state.apply(PegObservation::Breached, t(0), DAY);
        let change = state.apply(PegObservation::Healthy, t(DAY), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Iffy, CollateralStatus::Defaulted))
        );
    }

    #[test]
    fn recovery_one_second_before_deadline_is_sound() {
        let mut state = SoundnessState::new();
        state.apply(PegObservation::Breached, t(0), DAY);
        let change = state.apply(PegObservation::Healthy, t(DAY - 1), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Iffy, CollateralStatus::Sound))
        );
    }

    #[test]
    fn unknown_observation_moves_nothing() {
        let mut state = SoundnessState::new();
        assert!(state.apply(PegObservation::Unknown, t(10), DAY).is_none());
        assert_eq!(state.status(), CollateralStatus::Sound);

        state.apply(PegObservation::Breached, t(20), DAY);
        assert!(state.apply(PegObservation::Unknown, t(30), DAY).is_none());
        assert_eq!(state.status(), CollateralStatus::Iffy);
        assert_eq!(state.iffy_since(), Some(t(20)));
    }

    #[test]
    fn unknown_too_long_defaults_from_any_state() {
        let mut sound = SoundnessState::new();
        let change = sound.apply(PegObservation::UnknownTooLong, t(10), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Sound, CollateralStatus::Defaulted))
        );

        let mut iffy = SoundnessState::new();
        iffy.apply(PegObservation::Breached, t(0), DAY);
        let change = iffy.apply(PegObservation::UnknownTooLong, t(10), DAY);
        assert_eq!(
            change,
            Some((CollateralStatus::Iffy, CollateralStatus::Defaulted))
        );
    }

    #[test]
    fn default_is_terminal() {
        let mut state = SoundnessState::new();
        state.apply(PegObservation::UnknownTooLong, t(0), DAY);
        assert_eq!(state.status(), CollateralStatus::Defaulted);

        for (obs, at) in [
            (PegObservation::Healthy, 10),
            (PegObservation::Breached, 20),
            (PegObservation::Unknown, 30),
            (PegObservation::UnknownTooLong, 40),
        ] {
            assert!(state.apply(obs, t(at), DAY).is_none());
            assert_eq!(state.status(), CollateralStatus::Defaulted);
        }
    }

    #[test]
    fn same_instant_reapply_is_idempotent() {
        let mut state = SoundnessState::new();
        let first = state.apply(PegObservation::Breached, t(100), DAY);
        let second = state.apply(PegObservation::Breached, t(100), DAY);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(state.iffy_since(), Some(t(100)));
    }
}
