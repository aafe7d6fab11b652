// src/sim/mod.rs - Simulated embedded controller for dry runs and tests
//
// A single lumped thermal mass heated by CPU load and cooled through the
// chassis plus the fan. Readings advance the model by one period.
use crate::ec::{Actuator, EcError, EcReading, ReadingSource};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MAX_FAN_RPM: f32 = 4400.0;

#[derive(Debug, Clone)]
pub struct ThermalModel {
    pub die_temp: f32,     // °C
    pub ambient: f32,      // °C
    pub load: f32,         // 0.0-1.0
    pub duty: u8,          // commanded fan duty
    pub rpm: f32,
    pub noise: f32,        // peak sensor noise in °C
    /// Every Nth read reports an impossible duty, as a flaky EC does.
    pub glitch_every: Option<u32>,
    /// Fail the next N reads outright.
    pub fail_reads: u32,
    pub writes: Vec<u8>,
    reads: u32,
    rng: StdRng,
}

impl ThermalModel {
    pub fn new(ambient: f32, load: f32, seed: u64) -> Self {
        Self {
            die_temp: ambient,
            ambient,
            load: load.clamp(0.0, 1.0),
            duty: 0,
            rpm: 0.0,
            noise: 0.0,
            glitch_every: None,
            fail_reads: 0,
            writes: Vec::new(),
            reads: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn step(&mut self, dt: f32) {
        let heat_gain = 1.3 * self.load * dt;
        let cooling = 0.02 + 0.06 * self.rpm / MAX_FAN_RPM;
        self.die_temp += heat_gain - cooling * (self.die_temp - self.ambient) * dt;

        let target_rpm = self.duty as f32 / 100.0 * MAX_FAN_RPM;
        let ramp = 800.0 * dt;
        if self.rpm < target_rpm {
            self.rpm = (self.rpm + ramp).min(target_rpm);
        } else {
            self.rpm = (self.rpm - ramp).max(target_rpm);
        }
    }

    fn measure(&mut self) -> i32 {
        let jitter = if self.noise > 0.0 {
            self.rng.random_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        (self.die_temp + jitter).round() as i32
    }

    fn reading(&mut self) -> Result<EcReading, EcError> {
        self.reads += 1;
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(EcError::Unavailable("simulated EC timeout".to_string()));
        }
        let duty = match self.glitch_every {
            Some(n) if n > 0 && self.reads % n == 0 => 255,
            _ => self.duty as i64,
        };
        Ok(EcReading {
            cpu_temp_cels: self.measure(),
            duty,
            rpms: Some(self.rpm.round() as i32),
            gpu_temp_cels: None,
        })
    }
}

/// Cloneable handle usable as both the reading source and the actuator.
#[derive(Debug, Clone)]
pub struct SimulatedEc {
    model: Arc<Mutex<ThermalModel>>,
    dt: f32,
}

impl SimulatedEc {
    /// `dt` is how far the model advances per read, normally the loop period.
    pub fn new(model: ThermalModel, dt: f32) -> Self {
        Self { model: Arc::new(Mutex::new(model)), dt }
    }

    pub async fn snapshot(&self) -> ThermalModel {
        self.model.lock().await.clone()
    }

    pub async fn set_load(&self, load: f32) {
        self.model.lock().await.load = load.clamp(0.0, 1.0);
    }
}

#[async_trait]
impl ReadingSource for SimulatedEc {
    async fn read(&mut self) -> Result<EcReading, EcError> {
        let mut model = self.model.lock().await;
        model.step(self.dt);
        model.reading()
    }
}

#[async_trait]
impl Actuator for SimulatedEc {
    async fn apply_duty(&mut self, duty: u8) -> Result<(), EcError> {
        let mut model = self.model.lock().await;
        model.duty = duty.min(100);
        model.writes.push(duty);
        Ok(())
    }
}
