// src/control/gate.rs - decides whether a recommendation is worth applying
use std::time::Duration;
use tokio::time::Instant;

/// Recommendations closer than this to the current duty are ignored.
pub const DEAD_BAND: i32 = 3;
/// Minimum spacing between transitions into or out of 0% duty.
pub const ZERO_HOLDOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NoChange,
    DeadBand,
    ZeroHoldoff { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Apply { duty: u8, zero_transition: bool },
    Suppress(SuppressReason),
}

/// Loop-owned state, updated only after a successful actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub applied_duty: Option<u8>,
    pub last_zero_transition: Instant,
}

impl ControlState {
    /// The hold-off clock starts when the loop starts.
    pub fn new(started: Instant) -> Self {
        Self { applied_duty: None, last_zero_transition: started }
    }

    /// Record an actuation that the hardware accepted.
    pub fn record_applied(&mut self, decision: GateDecision, now: Instant) {
        if let GateDecision::Apply { duty, zero_transition } = decision {
            self.applied_duty = Some(duty);
            if zero_transition {
                self.last_zero_transition = now;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGate {
    pub dead_band: i32,
    pub zero_holdoff: Duration,
}

impl Default for TransitionGate {
    fn default() -> Self {
        Self { dead_band: DEAD_BAND, zero_holdoff: ZERO_HOLDOFF }
    }
}

impl TransitionGate {
    pub fn new(zero_holdoff: Duration) -> Self {
        Self { zero_holdoff, ..Self::default() }
    }

    pub fn evaluate(
        &self,
        current_duty: u8,
        recommendation: Option<u8>,
        state: &ControlState,
        now: Instant,
    ) -> GateDecision {
        let Some(duty) = recommendation else {
            return GateDecision::Suppress(SuppressReason::NoChange);
        };

        let current = current_duty as i32;
        let target = duty as i32;
        if current - self.dead_band < target && target < current + self.dead_band {
            return GateDecision::Suppress(SuppressReason::DeadBand);
        }

        let zero_transition = current_duty == 0 || duty == 0;
        if zero_transition {
            let elapsed = now.saturating_duration_since(state.last_zero_transition);
            if elapsed < self.zero_holdoff {
                return GateDecision::Suppress(SuppressReason::ZeroHoldoff {
                    remaining: self.zero_holdoff - elapsed,
                });
            }
        }

        GateDecision::Apply { duty, zero_transition }
    }
}
