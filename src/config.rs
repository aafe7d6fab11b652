//! # Fan loop configuration
//!
//! Settings come from an optional TOML file and are then overridden by CLI
//! flags. Every field has a default, so a file only needs what differs.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [ec]
//! bin = "/usr/local/bin/clevo-fancontrol"
//!
//! [control]
//! period_s = 3
//! mavg_window_s = 15
//! policy = "hysteresis"
//! temp_source = "cpu"
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! `Config::validate` must pass before the control loop is started; the loop
//! itself assumes the values are sane.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no EC binary configured (use --ecc-bin or [ec] bin)")]
    MissingBinary,
    #[error("could not find ecc-bin at {0}")]
    BinaryNotFound(PathBuf),
    #[error("period_s must be > 0")]
    ZeroPeriod,
    #[error("mavg_window_s ({window_s}) must be more than twice period_s ({period_s})")]
    WindowTooSmall { window_s: u64, period_s: u64 },
    #[error("exit_duty {0} is outside 0..=100")]
    ExitDutyOutOfRange(u8),
    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),
}

/// Which decision strategy maps temperature to duty.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Hysteresis,
    Curve55,
    Curve60,
}

/// Which EC temperature feeds the smoother.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TempSource {
    #[default]
    Cpu,
    /// max(cpu, gpu) when the EC reports a GPU temperature
    Hottest,
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ec: EcConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// EC helper binary. `bin` is a command line; extra words are passed through
/// as leading arguments.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EcConfig {
    #[serde(default)]
    pub bin: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_period_s")]
    pub period_s: u64,
    #[serde(default = "default_mavg_window_s")]
    pub mavg_window_s: u64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default)]
    pub temp_source: TempSource,
    #[serde(default = "default_zero_holdoff_s")]
    pub zero_holdoff_s: u64,
    /// Duty applied once when the daemon is asked to stop.
    #[serde(default)]
    pub exit_duty: Option<u8>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            period_s: default_period_s(),
            mavg_window_s: default_mavg_window_s(),
            dry_run: false,
            policy: PolicyKind::default(),
            temp_source: TempSource::default(),
            zero_holdoff_s: default_zero_holdoff_s(),
            exit_duty: None,
        }
    }
}

impl ControlConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_s)
    }

    pub fn zero_holdoff(&self) -> Duration {
        Duration::from_secs(self.zero_holdoff_s)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(self.level.trim())
            .map_err(|_| ConfigError::InvalidLogLevel(self.level.clone()))
    }
}

impl Config {
    /// Startup checks. Any failure here must keep the loop from starting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let program = self
            .ec
            .bin
            .split_whitespace()
            .next()
            .ok_or(ConfigError::MissingBinary)?;
        // Bare names are resolved through PATH at spawn time.
        if program.contains('/') && !Path::new(program).exists() {
            return Err(ConfigError::BinaryNotFound(PathBuf::from(program)));
        }

        let control = &self.control;
        if control.period_s == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if control.mavg_window_s <= control.period_s.saturating_mul(2) {
            return Err(ConfigError::WindowTooSmall {
                window_s: control.mavg_window_s,
                period_s: control.period_s,
            });
        }
        if let Some(duty) = control.exit_duty {
            if duty > 100 {
                return Err(ConfigError::ExitDutyOutOfRange(duty));
            }
        }
        self.logging.max_level()?;
        Ok(())
    }
}

// Default value functions
fn default_period_s() -> u64 { 3 }
fn default_mavg_window_s() -> u64 { 15 }
fn default_zero_holdoff_s() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path.display(), e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.ec.bin = "clevo-fancontrol".to_string();
        config
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.control.period_s, 3);
        assert_eq!(config.control.mavg_window_s, 15);
        assert_eq!(config.control.zero_holdoff_s, 30);
        assert_eq!(config.control.policy, PolicyKind::Hysteresis);
        assert_eq!(config.control.temp_source, TempSource::Cpu);
        assert!(!config.control.dry_run);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("fan.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            "[ec]\nbin = 'ecc'\n[control]\nperiod_s = 2\npolicy = 'curve60'\ntemp_source = 'hottest'"
        )
        .unwrap();
        file.flush().unwrap();
        let config = load_config(&file_path).unwrap();
        assert_eq!(config.ec.bin, "ecc");
        assert_eq!(config.control.period_s, 2);
        assert_eq!(config.control.policy, PolicyKind::Curve60);
        assert_eq!(config.control.temp_source, TempSource::Hottest);
        // Defaults for missing fields
        assert_eq!(config.control.mavg_window_s, 15);
        assert_eq!(config.control.exit_duty, None);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("nonexistent_file.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_failure_reaches_installed_subscriber() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            load_config(Path::new("nonexistent_fan.toml"))
        });
        assert!(matches!(result, Err(ConfigError::Io(_))));

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Failed to read config file 'nonexistent_fan.toml'"), "{output}");
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(&file_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_validate_accepts_defaults_with_binary() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_binary() {
        let result = Config::default().validate();
        assert!(matches!(result, Err(ConfigError::MissingBinary)));
    }

    #[test]
    fn test_validate_missing_binary_path() {
        let mut config = valid_config();
        config.ec.bin = "/definitely/not/here/ecc".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BinaryNotFound(_))));
    }

    #[test]
    fn test_validate_window_must_exceed_two_periods() {
        let mut config = valid_config();
        config.control.period_s = 5;
        config.control.mavg_window_s = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowTooSmall { window_s: 10, period_s: 5 })
        ));
        config.control.mavg_window_s = 11;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_huge_period_does_not_overflow() {
        let mut config = valid_config();
        config.control.period_s = u64::MAX;
        config.control.mavg_window_s = u64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::WindowTooSmall { .. })));

        config.control.period_s = 1;
        config.control.mavg_window_s = u64::MAX / 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_period() {
        let mut config = valid_config();
        config.control.period_s = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPeriod)));
    }

    #[test]
    fn test_validate_exit_duty_and_log_level() {
        let mut config = valid_config();
        config.control.exit_duty = Some(101);
        assert!(matches!(config.validate(), Err(ConfigError::ExitDutyOutOfRange(101))));

        let mut config = valid_config();
        config.logging.level = "chatty".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));
        config.logging.level = "DEBUG".to_string();
        assert_eq!(config.logging.max_level().unwrap(), tracing::Level::DEBUG);
    }
}
