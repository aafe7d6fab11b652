// src/control/fan_loop.rs - the periodic read -> smooth -> decide -> apply loop
use super::gate::{ControlState, GateDecision, SuppressReason, TransitionGate};
use super::policy::DutyPolicy;
use super::smoother::Smoother;
use crate::config::{ConfigError, ControlConfig, TempSource};
use crate::ec::{Actuator, EcError, ReadingSource, Sample};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum FanError {
    #[error("no usable EC reading: {0}")]
    Reading(#[from] EcError),
    #[error("failed to apply duty {duty}: {source}")]
    Actuation {
        duty: u8,
        #[source]
        source: EcError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied { from: u8, to: u8 },
    /// What would have been applied; nothing was written.
    DryRun { from: u8, to: u8 },
    Suppressed(SuppressReason),
}

/// Everything one tick observed and decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub sample: Sample,
    pub smoothed: i32,
    pub recommendation: Option<u8>,
    pub outcome: TickOutcome,
}

/// Single-task control loop. One tick finishes before the next starts.
pub struct FanLoop<S, A> {
    source: S,
    actuator: A,
    smoother: Smoother,
    policy: DutyPolicy,
    gate: TransitionGate,
    state: ControlState,
    temp_source: TempSource,
    period: Duration,
    dry_run: bool,
}

impl<S: ReadingSource, A: Actuator> FanLoop<S, A> {
    pub fn new(source: S, actuator: A, config: &ControlConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            source,
            actuator,
            smoother: Smoother::for_window(config.mavg_window_s, config.period_s)?,
            policy: DutyPolicy::from(config.policy),
            gate: TransitionGate::new(config.zero_holdoff()),
            state: ControlState::new(Instant::now()),
            temp_source: config.temp_source,
            period: config.period(),
            dry_run: config.dry_run,
        })
    }

    /// Replace the control state, e.g. to pin the zero-transition clock.
    pub fn with_state(mut self, state: ControlState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn smoother(&self) -> &Smoother {
        &self.smoother
    }

    pub fn policy(&self) -> DutyPolicy {
        self.policy
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub async fn tick(&mut self) -> Result<Tick, FanError> {
        self.tick_at(Instant::now()).await
    }

    /// One full tick evaluated against `now`.
    ///
    /// A failed or invalid reading returns `FanError::Reading` before any
    /// state is touched. A failed actuation returns `FanError::Actuation` and
    /// leaves the control state as it was.
    pub async fn tick_at(&mut self, now: Instant) -> Result<Tick, FanError> {
        tracing::debug!("Evaluating...");
        let reading = self.source.read().await?;
        let sample = Sample::from_reading(&reading, self.temp_source)?;

        let smoothed = self.smoother.push(sample.temperature);
        // The EC's own duty is ground truth, not what we last commanded.
        let recommendation = self.policy.recommend(smoothed, sample.duty);
        let decision = self.gate.evaluate(sample.duty, recommendation, &self.state, now);

        let outcome = match decision {
            GateDecision::Suppress(reason) => {
                match reason {
                    SuppressReason::ZeroHoldoff { remaining } => tracing::debug!(
                        "Zero-duty transition {} -> {:?} held for another {:?}",
                        sample.duty,
                        recommendation,
                        remaining
                    ),
                    _ => tracing::debug!(
                        "calculated duty the same, won't apply: {} ~ {:?}",
                        sample.duty,
                        recommendation
                    ),
                }
                TickOutcome::Suppressed(reason)
            }
            GateDecision::Apply { duty, .. } if self.dry_run => {
                tracing::info!(
                    "dry-run: new duty {} (current {}, smoothed {}C)",
                    duty,
                    sample.duty,
                    smoothed
                );
                TickOutcome::DryRun { from: sample.duty, to: duty }
            }
            GateDecision::Apply { duty, zero_transition } => {
                tracing::info!(
                    "Applying {} samples, d_t {}C, d: {}, current_duty {}{}",
                    self.smoother.len(),
                    smoothed,
                    duty,
                    sample.duty,
                    if zero_transition { " (zero transition)" } else { "" }
                );
                self.actuator
                    .apply_duty(duty)
                    .await
                    .map_err(|source| FanError::Actuation { duty, source })?;
                self.state.record_applied(decision, now);
                TickOutcome::Applied { from: sample.duty, to: duty }
            }
        };

        Ok(Tick { sample, smoothed, recommendation, outcome })
    }

    /// Tick forever at the configured period. Errors are logged, never fatal.
    pub async fn run(&mut self) {
        tracing::info!(
            "Entering fan-loop: period {:?}, window {} samples, policy {}, dry_run {}",
            self.period,
            self.smoother.capacity(),
            self.policy.name(),
            self.dry_run
        );
        loop {
            if let Err(e) = self.tick().await {
                match &e {
                    FanError::Reading(EcError::DutyOutOfRange(_)) => {
                        tracing::info!("glitch in ec results, continuing: {}", e)
                    }
                    FanError::Reading(_) => tracing::warn!("{}", e),
                    FanError::Actuation { .. } => tracing::error!("{}", e),
                }
            }
            tokio::time::sleep(self.period).await;
        }
    }

    /// Apply a final duty when the daemon stops. Skipped in dry-run.
    /// `exit_duty` is expected to be within 0..=100 (`Config::validate`).
    pub async fn shutdown(&mut self, exit_duty: Option<u8>) -> Result<(), FanError> {
        let Some(duty) = exit_duty else {
            return Ok(());
        };
        if self.dry_run {
            tracing::info!("dry-run: exit duty {}", duty);
            return Ok(());
        }
        tracing::info!("Resetting fan duty to {} on exit", duty);
        self.actuator
            .apply_duty(duty)
            .await
            .map_err(|source| FanError::Actuation { duty, source })
    }
}
