// src/control/mod.rs
// Decision engine: smoothing, duty policy, transition gate and the loop that drives them.
pub mod fan_loop;
pub mod gate;
pub mod policy;
pub mod smoother;

pub use fan_loop::{FanError, FanLoop, Tick, TickOutcome};
pub use gate::{ControlState, GateDecision, SuppressReason, TransitionGate};
pub use policy::{CURVE_55, CURVE_60, DutyPolicy, PolyCurve, hysteresis, poly_duty};
pub use smoother::Smoother;
