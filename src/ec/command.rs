// src/ec/command.rs - EC helper binary driver
use super::{Actuator, EcError, EcReading, ReadingSource};
use async_trait::async_trait;
use tokio::process::Command;

/// Talks to the EC through the `clevo-fancontrol` style helper: no argument
/// dumps JSON, a single integer argument sets the fan duty.
#[derive(Debug, Clone)]
pub struct EcCommand {
    program: String,
    args: Vec<String>,
}

impl EcCommand {
    /// Returns `None` for an empty command line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self { program, args: words.collect() })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, extra: Option<String>) -> Result<String, EcError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(arg) = extra {
            cmd.arg(arg);
        }
        let output = cmd.output().await.map_err(|source| EcError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(EcError::Status {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

#[async_trait]
impl ReadingSource for EcCommand {
    async fn read(&mut self) -> Result<EcReading, EcError> {
        let stdout = self.run(None).await?;
        EcReading::parse(&stdout).inspect_err(|_| {
            tracing::error!("EC invalid JSON: {}", stdout.trim());
        })
    }
}

#[async_trait]
impl Actuator for EcCommand {
    async fn apply_duty(&mut self, duty: u8) -> Result<(), EcError> {
        let stdout = self.run(Some(duty.to_string())).await?;
        tracing::trace!("EC write response: {}", stdout.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_split() {
        let ec = EcCommand::from_command_line("sudo  /usr/bin/clevo-fancontrol").unwrap();
        assert_eq!(ec.program(), "sudo");
        assert_eq!(ec.args, vec!["/usr/bin/clevo-fancontrol".to_string()]);
        assert!(EcCommand::from_command_line("   ").is_none());
    }
}
