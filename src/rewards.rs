// 7.0: reward pass-through. some wrapped tokens accrue a reward stream
// (governance or incentive tokens) outside the exchange-rate appreciation.
// claiming is an explicit capability call against the reward-bearing
// collaborator; the claimed amount comes back as an ordinary value. none of
// this touches valuation or soundness.

use rust_decimal::Decimal;
use std::cell::RefCell;
use std::rc::Rc;

/// Errors from the reward collaborator. Isolated from the pricing error
/// taxonomy: a failed claim is an inconvenience, never a soundness signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardError {
    #[error("reward source '{0}' is unavailable")]
    Unavailable(String),

    #[error("reward transfer failed: {0}")]
    TransferFailed(String),
}

/// Capability to sweep accrued rewards to the holder. Implementations wrap
/// whatever distribution mechanism the underlying protocol uses.
pub trait RewardSource {
    /// Symbol of the token this source pays out.
    fn reward_token(&self) -> &str;

    /// Claim everything currently accrued and return the amount moved.
    /// Zero is a legitimate result.
    fn claim(&mut self) -> Result<Decimal, RewardError>;
}

/// Mock reward source for tests and the simulator. Accrues whatever the
/// scenario deposits and drains on claim. Interior mutability so a scenario
/// holding an `Rc<MockRewardSource>` can keep accruing after the engine has
/// boxed its own copy of the same `Rc`.
pub struct MockRewardSource {
    token: String,
    state: RefCell<MockRewardState>,
}

struct MockRewardState {
    accrued: Decimal,
    healthy: bool,
}

impl MockRewardSource {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            state: RefCell::new(MockRewardState {
                accrued: Decimal::ZERO,
                healthy: true,
            }),
        }
    }

    pub fn shared(token: &str) -> Rc<Self> {
        Rc::new(Self::new(token))
    }

    pub fn accrue(&self, amount: Decimal) {
        self.state.borrow_mut().accrued += amount;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.borrow_mut().healthy = healthy;
    }

    fn drain(&self) -> Result<Decimal, RewardError> {
        let mut state = self.state.borrow_mut();
        if !state.healthy {
            return Err(RewardError::Unavailable(self.token.clone()));
        }
        let amount = state.accrued;
        state.accrued = Decimal::ZERO;
        Ok(amount)
    }
}

impl RewardSource for MockRewardSource {
    fn reward_token(&self) -> &str {
        &self.token
    }

    fn claim(&mut self) -> Result<Decimal, RewardError> {
        self.drain()
    }
}

impl RewardSource for Rc<MockRewardSource> {
    fn reward_token(&self) -> &str {
        &self.token
    }

    fn claim(&mut self) -> Result<Decimal, RewardError> {
        self.drain()
    }
}
