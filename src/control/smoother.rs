// src/control/smoother.rs
use crate::config::ConfigError;
use std::collections::VecDeque;

/// Moving average over the last `capacity` temperature samples.
#[derive(Debug, Clone)]
pub struct Smoother {
    window: VecDeque<i32>,
    capacity: usize,
}

impl Smoother {
    /// `capacity` is clamped to at least one sample. The buffer grows on
    /// demand.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Sized for `window_s` seconds of samples taken every `period_s`.
    /// The window must cover more than two periods.
    pub fn for_window(window_s: u64, period_s: u64) -> Result<Self, ConfigError> {
        if period_s == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if window_s <= period_s.saturating_mul(2) {
            return Err(ConfigError::WindowTooSmall { window_s, period_s });
        }
        let samples = window_s.div_ceil(period_s);
        Ok(Self::new(usize::try_from(samples).unwrap_or(usize::MAX)))
    }

    /// Add a temperature and return the rounded mean of the window.
    pub fn push(&mut self, temperature: i32) -> i32 {
        self.window.push_back(temperature);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.mean()
    }

    /// Mean rounded half-to-even, computed exactly on integers.
    fn mean(&self) -> i32 {
        let n = self.window.len() as i64;
        if n == 0 {
            return 0;
        }
        let sum: i64 = self.window.iter().map(|&t| t as i64).sum();
        let q = sum.div_euclid(n);
        let twice_rem = 2 * sum.rem_euclid(n);
        let rounded = if twice_rem > n || (twice_rem == n && q % 2 != 0) {
            q + 1
        } else {
            q
        };
        rounded as i32
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
