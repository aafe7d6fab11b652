// src/lib.rs - EC fan control: reading, smoothing, duty policy and the control loop
pub mod config;
pub mod control;
pub mod ec;
pub mod sim;

pub use config::{Config, ConfigError};
pub use control::{FanError, FanLoop};
pub use ec::{Actuator, EcCommand, EcError, EcReading, ReadingSource, Sample};
