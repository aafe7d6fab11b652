// src/ec/mod.rs - Embedded controller interface
pub mod command;

use crate::config::TempSource;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use command::EcCommand;

#[derive(Debug, Error)]
pub enum EcError {
    #[error("failed to run EC command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("EC command exited with {status}: {stderr}")]
    Status { status: std::process::ExitStatus, stderr: String },
    #[error("EC output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("EC invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("EC reported out-of-range duty {0}")]
    DutyOutOfRange(i64),
    #[error("EC unavailable: {0}")]
    Unavailable(String),
}

/// Record printed by the EC helper when run without arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EcReading {
    pub cpu_temp_cels: i32,
    pub duty: i64,
    #[serde(default)]
    pub rpms: Option<i32>,
    #[serde(default)]
    pub gpu_temp_cels: Option<i32>,
}

impl EcReading {
    pub fn parse(raw: &str) -> Result<Self, EcError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// One validated observation fed to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub temperature: i32,
    pub duty: u8,
}

impl Sample {
    /// Rejects duties outside 0..=100; the EC occasionally reports garbage.
    pub fn from_reading(reading: &EcReading, source: TempSource) -> Result<Self, EcError> {
        let duty = match u8::try_from(reading.duty) {
            Ok(d) if d <= 100 => d,
            _ => return Err(EcError::DutyOutOfRange(reading.duty)),
        };
        let temperature = match (source, reading.gpu_temp_cels) {
            (TempSource::Hottest, Some(gpu)) => reading.cpu_temp_cels.max(gpu),
            _ => reading.cpu_temp_cels,
        };
        Ok(Self { temperature, duty })
    }
}

#[async_trait]
pub trait ReadingSource: Send {
    async fn read(&mut self) -> Result<EcReading, EcError>;
}

#[async_trait]
pub trait Actuator: Send {
    /// `duty` is always within 0..=100.
    async fn apply_duty(&mut self, duty: u8) -> Result<(), EcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let raw = r#"{
  "duty": 30,
  "rpms": 2150,
  "cpu_temp_cels": 61,
  "gpu_temp_cels": 0
}"#;
        let reading = EcReading::parse(raw).unwrap();
        assert_eq!(reading.cpu_temp_cels, 61);
        assert_eq!(reading.duty, 30);
        assert_eq!(reading.rpms, Some(2150));
        assert_eq!(reading.gpu_temp_cels, Some(0));
    }

    #[test]
    fn test_parse_minimal_record() {
        let reading = EcReading::parse(r#"{"cpu_temp_cels": 48, "duty": 0}"#).unwrap();
        assert_eq!(reading.rpms, None);
        assert_eq!(reading.gpu_temp_cels, None);
    }

    #[test]
    fn test_parse_rejects_missing_field_and_garbage() {
        assert!(matches!(EcReading::parse(r#"{"duty": 10}"#), Err(EcError::Json(_))));
        assert!(matches!(EcReading::parse("unable to control EC"), Err(EcError::Json(_))));
    }

    #[test]
    fn test_sample_duty_range() {
        let mut reading = EcReading { cpu_temp_cels: 60, duty: 100, rpms: None, gpu_temp_cels: None };
        assert_eq!(Sample::from_reading(&reading, TempSource::Cpu).unwrap().duty, 100);
        reading.duty = 101;
        assert!(matches!(
            Sample::from_reading(&reading, TempSource::Cpu),
            Err(EcError::DutyOutOfRange(101))
        ));
        reading.duty = -1;
        assert!(matches!(
            Sample::from_reading(&reading, TempSource::Cpu),
            Err(EcError::DutyOutOfRange(-1))
        ));
    }

    #[test]
    fn test_sample_temp_source() {
        let reading = EcReading { cpu_temp_cels: 60, duty: 17, rpms: None, gpu_temp_cels: Some(72) };
        assert_eq!(Sample::from_reading(&reading, TempSource::Cpu).unwrap().temperature, 60);
        assert_eq!(Sample::from_reading(&reading, TempSource::Hottest).unwrap().temperature, 72);

        let cpu_only = EcReading { gpu_temp_cels: None, ..reading };
        assert_eq!(Sample::from_reading(&cpu_only, TempSource::Hottest).unwrap().temperature, 60);
    }
}
