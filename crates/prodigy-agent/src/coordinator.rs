//! Per-category request rounds.
//!
//! A [`FetchRound`] is pure state: it decides *when* a category should
//! fetch and leaves timers and requests to the agent. Every transition
//! returns a [`Step`] telling the caller what to do next.
//!
//! ```text
//! Idle ──discover──▶ Debouncing ──timer──▶ (Dispatch) ──begin──▶ InFlight
//!   ▲                    │ ▲                    │                   │
//!   │                    └─┘ discover           └──skip──▶ Idle     │
//!   └─────────────── succeed / fail (pending re-enters Debouncing) ─┘
//! ```
//!
//! Rounds without a debounce go straight from `Idle` to `Dispatch`.

use std::time::Duration;

use crate::registry::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    /// Waiting for a timer tagged with `generation`. Used both for the
    /// debounce quiet period and for retry back-off.
    Debouncing { generation: u64 },
    /// A request is outstanding. `pending` records discoveries that arrived
    /// meanwhile.
    InFlight { pending: bool },
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing; the round is idle.
    Idle,
    /// Nothing yet; a timer or request will report back.
    Wait,
    /// Build and send the request now, then call [`FetchRound::begin`]
    /// (or [`FetchRound::skip`] if there is nothing to ask for).
    Dispatch,
    /// (Re)start the category timer; when it fires call
    /// [`FetchRound::timer_fired`] with `generation`.
    Schedule { generation: u64, delay: Duration },
}

#[derive(Debug, Clone)]
pub struct FetchRound {
    category: Category,
    debounce: Duration,
    retry_limit: u32,
    retry_backoff: Duration,
    state: RoundState,
    failures: u32,
    next_generation: u64,
}

impl FetchRound {
    #[must_use]
    pub fn new(
        category: Category,
        debounce: Duration,
        retry_limit: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            category,
            debounce,
            retry_limit,
            retry_backoff,
            state: RoundState::Idle,
            failures: 0,
            next_generation: 0,
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Consecutive failed rounds since the last success.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == RoundState::Idle
    }

    /// New containers were found for this category.
    pub fn discover(&mut self) -> Step {
        match &mut self.state {
            RoundState::InFlight { pending } => {
                *pending = true;
                Step::Wait
            }
            RoundState::Idle | RoundState::Debouncing { .. } => {
                if self.debounce.is_zero() {
                    // Invalidates any retry timer still outstanding.
                    self.next_generation += 1;
                    self.state = RoundState::Idle;
                    Step::Dispatch
                } else {
                    self.arm(self.debounce)
                }
            }
        }
    }

    /// A category timer elapsed. Stale generations are ignored.
    pub fn timer_fired(&mut self, generation: u64) -> Step {
        match self.state {
            RoundState::Debouncing { generation: current } if current == generation => {
                self.state = RoundState::Idle;
                Step::Dispatch
            }
            _ => Step::Wait,
        }
    }

    /// The request built after [`Step::Dispatch`] has been sent.
    pub fn begin(&mut self) {
        self.state = RoundState::InFlight { pending: false };
    }

    /// Nothing needed fetching after [`Step::Dispatch`].
    pub fn skip(&mut self) -> Step {
        self.state = RoundState::Idle;
        self.failures = 0;
        Step::Idle
    }

    pub fn succeed(&mut self) -> Step {
        self.failures = 0;
        let pending = self.take_pending();
        if pending {
            self.discover()
        } else {
            Step::Idle
        }
    }

    /// The request failed. A discovery that arrived while in flight is
    /// served first; otherwise a back-off retry is scheduled until the
    /// retry limit is reached.
    pub fn fail(&mut self) -> Step {
        self.failures += 1;
        if self.take_pending() {
            return self.discover();
        }
        if self.failures <= self.retry_limit {
            let exponent = (self.failures - 1).min(16);
            let delay = self.retry_backoff.saturating_mul(1u32 << exponent);
            return self.arm(delay);
        }
        tracing::warn!(
            category = %self.category,
            failures = self.failures,
            "retry limit reached, waiting for the next discovery"
        );
        Step::Idle
    }

    /// The response answered a question that no longer applies (the deal
    /// changed under it). Asks again without counting a failure.
    pub fn discard(&mut self) -> Step {
        self.state = RoundState::Idle;
        self.discover()
    }

    fn take_pending(&mut self) -> bool {
        let pending = matches!(self.state, RoundState::InFlight { pending: true });
        self.state = RoundState::Idle;
        pending
    }

    fn arm(&mut self, delay: Duration) -> Step {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.state = RoundState::Debouncing { generation };
        Step::Schedule { generation, delay }
    }
}
