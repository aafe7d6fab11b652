//! Duty policies: temperature (and current duty) to a recommended fan duty.
//!
//! The hysteresis table is the primary strategy. A rule only fires when the
//! temperature has crossed a threshold *relative to the current duty*, so the
//! fan settles in a dead band instead of hunting around one setpoint.
//!
//! The polynomial curves are the alternative strategy: a fitted quartic per
//! target curve, clamped and nudged out of the fan's resonance band.

use crate::config::PolicyKind;

/// Condition half of a hysteresis rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `temp >= temp_at_least && duty < duty_below`
    Rising { temp_at_least: i32, duty_below: u8 },
    /// `temp <= temp_at_most && duty >= duty_from`
    Falling { temp_at_most: i32, duty_from: u8 },
}

impl Trigger {
    pub fn matches(&self, temp: i32, duty: u8) -> bool {
        match *self {
            Trigger::Rising { temp_at_least, duty_below } => temp >= temp_at_least && duty < duty_below,
            Trigger::Falling { temp_at_most, duty_from } => temp <= temp_at_most && duty >= duty_from,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub trigger: Trigger,
    pub recommend: u8,
}

const fn rising(temp_at_least: i32, duty_below: u8, recommend: u8) -> Rule {
    Rule { trigger: Trigger::Rising { temp_at_least, duty_below }, recommend }
}

const fn falling(temp_at_most: i32, duty_from: u8, recommend: u8) -> Rule {
    Rule { trigger: Trigger::Falling { temp_at_most, duty_from }, recommend }
}

/// Evaluated top to bottom, first match wins. Thresholds overlap, so the
/// order decides boundary temperatures and must not be changed.
pub const HYSTERESIS_RULES: [Rule; 10] = [
    rising(93, 70, 70),
    rising(85, 60, 60),
    rising(75, 40, 40),
    rising(65, 30, 30),
    rising(55, 17, 17),
    falling(50, 0, 0),
    falling(60, 17, 17),
    falling(70, 30, 30),
    falling(80, 40, 40),
    falling(85, 60, 60),
];

/// `None` means no change is recommended.
pub fn hysteresis(temp: i32, duty: u8) -> Option<u8> {
    HYSTERESIS_RULES
        .iter()
        .find(|rule| rule.trigger.matches(temp, duty))
        .map(|rule| rule.recommend)
}

/// Coefficients `c0..c4` of a fitted fan curve, lowest power first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyCurve {
    pub name: &'static str,
    pub coefficients: [f64; 5],
}

/// 50C -> 0%, 55C -> 16%, 65C -> 30%, 80C -> 60%, 90C -> 80%, 95C -> 100%
pub const CURVE_55: PolyCurve = PolyCurve {
    name: "curve55",
    coefficients: [
        -5.4286106843436141e+002,
        2.3728991363229298e+001,
        -3.6524575715902607e-001,
        2.3863150942693692e-003,
        -4.4444443842035524e-006,
    ],
};

/// 50C -> 0%, 60C -> 16%, 70C -> 30%, 80C -> 60%, 90C -> 80%, 95C -> 100%
pub const CURVE_60: PolyCurve = PolyCurve {
    name: "curve60",
    coefficients: [
        2.4175045589667269e+002,
        -1.5536009585339260e+001,
        3.3712625794344109e-001,
        -2.9768219530062990e-003,
        1.0345813829618101e-005,
    ],
};

pub const CURVE_MAX_DUTY: u8 = 60;
pub const CURVE_MIN_DUTY: f64 = 16.0;
/// Duties in this band make the fan drone; they are bumped to `RESONANCE_ESCAPE`.
pub const RESONANCE_BAND: (f64, f64) = (21.0, 26.0);
pub const RESONANCE_ESCAPE: u8 = 28;

impl PolyCurve {
    /// Raw polynomial value, Horner form.
    pub fn raw(&self, temp: i32) -> f64 {
        let t = temp as f64;
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }
}

pub fn poly_duty(curve: &PolyCurve, temp: i32) -> u8 {
    let raw = curve.raw(temp);
    if raw > CURVE_MAX_DUTY as f64 {
        return CURVE_MAX_DUTY;
    }
    if raw < CURVE_MIN_DUTY {
        return 0;
    }
    if (RESONANCE_BAND.0..=RESONANCE_BAND.1).contains(&raw) {
        return RESONANCE_ESCAPE;
    }
    raw.round_ties_even() as u8
}

/// The strategy the control loop asks for a recommendation each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DutyPolicy {
    #[default]
    Hysteresis,
    Curve(&'static PolyCurve),
}

impl From<PolicyKind> for DutyPolicy {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Hysteresis => DutyPolicy::Hysteresis,
            PolicyKind::Curve55 => DutyPolicy::Curve(&CURVE_55),
            PolicyKind::Curve60 => DutyPolicy::Curve(&CURVE_60),
        }
    }
}

impl DutyPolicy {
    pub fn recommend(&self, temp: i32, current_duty: u8) -> Option<u8> {
        match self {
            DutyPolicy::Hysteresis => hysteresis(temp, current_duty),
            DutyPolicy::Curve(curve) => Some(poly_duty(curve, temp)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DutyPolicy::Hysteresis => "hysteresis",
            DutyPolicy::Curve(curve) => curve.name,
        }
    }
}
