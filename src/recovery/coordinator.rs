//! Recovery Coordinator
//!
//! Owns the lifecycle state machine and the current surface handle, and
//! executes the recovery sequence: discard the old surface, request a
//! replacement from the factory, re-home host state, verify health, with
//! bounded retries and exponential backoff.
//!
//! Exactly one recovery sequence may be in flight process-wide. Triggers
//! arriving while one runs are coalesced onto it: they receive the
//! in-flight sequence's outcome and never queue a second run. Lifecycle
//! state is mutated only while holding the in-flight ticket, which is what
//! makes the transition history strictly ordered.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::core::config::RecoveryConfig;
use crate::core::error::{RecoveryError, Result};
use crate::diagnostics::DiagnosticsHub;
use crate::events::{CrashReason, EventBus, RecoveryEvent};
use crate::probe::HealthProbe;
use crate::surface::{HealthStatus, StateRestore, SurfaceFactory, SurfaceHandle};

/// Lifecycle state of the monitored surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// Surface is believed healthy
    Healthy,
    /// A degradation was confirmed; recovery is about to start
    Degraded,
    /// A recovery sequence is running
    Recovering,
    /// All attempts failed; terminal until a manual retry
    RecoveryFailed,
}

impl LifecycleState {
    /// Whether `from -> to` is a legal edge of the lifecycle machine.
    ///
    /// Degraded always precedes Recovering on the crash path; manual
    /// recovery enters Recovering directly from Healthy or RecoveryFailed.
    pub fn can_transition(from: LifecycleState, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (from, to),
            (Healthy, Degraded)
                | (Healthy, Recovering)
                | (Degraded, Recovering)
                | (Recovering, Healthy)
                | (Recovering, RecoveryFailed)
                | (RecoveryFailed, Recovering)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Healthy => write!(f, "healthy"),
            LifecycleState::Degraded => write!(f, "degraded"),
            LifecycleState::Recovering => write!(f, "recovering"),
            LifecycleState::RecoveryFailed => write!(f, "recoveryFailed"),
        }
    }
}

/// One recorded state transition. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionRecord {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Success detail for a completed recovery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Attempts the sequence used, including the successful one
    pub attempts: u32,
}

/// Outcome of one recovery sequence, shared with coalesced triggers.
pub type SequenceOutcome = std::result::Result<RecoveryStats, RecoveryError>;

/// Either ownership of the single in-flight sequence, or a subscription to
/// the one already running.
enum Ticket {
    Owner(watch::Sender<Option<SequenceOutcome>>),
    Joiner(watch::Receiver<Option<SequenceOutcome>>),
}

pub struct RecoveryCoordinator {
    config: RecoveryConfig,
    factory: Arc<dyn SurfaceFactory>,
    restore: Arc<dyn StateRestore>,
    bus: Arc<EventBus>,
    diagnostics: Arc<DiagnosticsHub>,
    probe: HealthProbe,
    /// Exclusively owned; replaced, never mutated, on recovery
    surface: RwLock<Option<SurfaceHandle>>,
    state: Mutex<LifecycleState>,
    history: Mutex<VecDeque<TransitionRecord>>,
    /// `Some` while a sequence is in flight; guards ownership atomically
    in_flight: Mutex<Option<watch::Receiver<Option<SequenceOutcome>>>>,
}

impl RecoveryCoordinator {
    pub fn new(
        config: RecoveryConfig,
        factory: Arc<dyn SurfaceFactory>,
        restore: Arc<dyn StateRestore>,
        bus: Arc<EventBus>,
        diagnostics: Arc<DiagnosticsHub>,
    ) -> Self {
        let probe = HealthProbe::new(config.probe_timeout());
        Self {
            config,
            factory,
            restore,
            bus,
            diagnostics,
            probe,
            surface: RwLock::new(None),
            state: Mutex::new(LifecycleState::Healthy),
            history: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Recent transitions, oldest first. Bounded by `history_capacity`.
    pub fn transition_history(&self) -> Vec<TransitionRecord> {
        self.history.lock().iter().cloned().collect()
    }

    /// Install the surface to monitor, replacing any previous one.
    pub async fn attach_surface(&self, surface: SurfaceHandle) {
        let previous = self.surface.write().await.replace(surface);
        if let Some(old) = previous {
            self.factory.destroy_surface(old).await;
        }
    }

    /// Borrow the current surface for the duration of one probe call.
    pub async fn current_surface(&self) -> Option<SurfaceHandle> {
        self.surface.read().await.clone()
    }

    /// Point-in-time health query, independent of the state machine.
    /// Never errors; a missing surface reports `Terminated`.
    pub async fn check_health(&self) -> HealthStatus {
        let surface = self.current_surface().await;
        self.probe.check(surface.as_ref()).await
    }

    /// Confirmed degradation signal from the monitor.
    ///
    /// Only acted on while Healthy: while Recovering the episode is already
    /// being handled, and RecoveryFailed stays terminal until a manual
    /// retry. Returns the sequence outcome when a recovery actually ran.
    pub async fn on_degradation(&self, reason: CrashReason) -> Option<SequenceOutcome> {
        let ticket = match self.claim_for_degradation() {
            Some(ticket) => ticket,
            None => {
                tracing::debug!(
                    "Degradation signal ({}) dropped in state {}",
                    reason,
                    self.state()
                );
                return None;
            }
        };

        match ticket {
            Ticket::Joiner(rx) => Some(Self::join(rx).await),
            Ticket::Owner(tx) => {
                self.transition(LifecycleState::Degraded, reason.to_string());
                self.bus.emit(&RecoveryEvent::Crashed { reason });
                Some(self.run_owned_sequence(tx).await)
            }
        }
    }

    /// Manually trigger recovery.
    ///
    /// Legal from Healthy (forced recovery), RecoveryFailed (retry) and,
    /// by coalescing, while Recovering: the call then returns the outcome
    /// of the in-flight sequence instead of starting another.
    pub async fn recover(&self) -> SequenceOutcome {
        match self.claim() {
            Ticket::Joiner(rx) => Self::join(rx).await,
            Ticket::Owner(tx) => self.run_owned_sequence(tx).await,
        }
    }

    /// Diagnostic end-to-end exercise of the pipeline with a synthetic
    /// crash reason. From Healthy it walks the full crash path, including
    /// the `crashed` event; from RecoveryFailed it behaves like `recover`.
    pub async fn test_recovery(&self) -> SequenceOutcome {
        match self.claim() {
            Ticket::Joiner(rx) => Self::join(rx).await,
            Ticket::Owner(tx) => {
                if self.state() == LifecycleState::Healthy {
                    self.transition(LifecycleState::Degraded, CrashReason::Simulated.to_string());
                    self.bus.emit(&RecoveryEvent::Crashed {
                        reason: CrashReason::Simulated,
                    });
                }
                self.run_owned_sequence(tx).await
            }
        }
    }

    /// Atomically become the owner of a new sequence, or a joiner of the
    /// one in flight.
    fn claim(&self) -> Ticket {
        let mut slot = self.in_flight.lock();
        match slot.as_ref() {
            Some(rx) => Ticket::Joiner(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                *slot = Some(rx);
                Ticket::Owner(tx)
            }
        }
    }

    /// `claim` variant for degradation signals: the state check happens
    /// under the slot lock, so a sequence that completes in RecoveryFailed
    /// concurrently with the signal cannot slip through as a fresh owner.
    /// Ownership is only handed out while Healthy.
    fn claim_for_degradation(&self) -> Option<Ticket> {
        let mut slot = self.in_flight.lock();
        if *self.state.lock() != LifecycleState::Healthy {
            return None;
        }
        match slot.as_ref() {
            Some(rx) => Some(Ticket::Joiner(rx.clone())),
            None => {
                let (tx, rx) = watch::channel(None);
                *slot = Some(rx);
                Some(Ticket::Owner(tx))
            }
        }
    }

    /// Wait for the in-flight sequence to publish its outcome.
    async fn join(mut rx: watch::Receiver<Option<SequenceOutcome>>) -> SequenceOutcome {
        tracing::debug!("Recovery already in flight, coalescing onto it");
        match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or(Err(RecoveryError::Interrupted)),
            // Owner dropped without publishing
            Err(_) => Err(RecoveryError::Interrupted),
        }
    }

    /// Run the sequence as the exclusive owner, then publish the outcome
    /// and release the ticket.
    async fn run_owned_sequence(
        &self,
        tx: watch::Sender<Option<SequenceOutcome>>,
    ) -> SequenceOutcome {
        self.transition(LifecycleState::Recovering, "recovery sequence starting");
        self.bus.emit(&RecoveryEvent::WillRecover);

        let outcome = self.run_sequence().await;

        match &outcome {
            Ok(stats) => {
                self.transition(
                    LifecycleState::Healthy,
                    format!("recovered after {} attempt(s)", stats.attempts),
                );
                self.bus.emit(&RecoveryEvent::DidRecover);
            }
            Err(err) => {
                self.transition(LifecycleState::RecoveryFailed, err.to_string());
                self.bus.emit(&RecoveryEvent::RecoveryFailed {
                    error: err.to_string(),
                });
            }
        }

        // Release before publishing so a post-outcome trigger starts a
        // fresh sequence instead of joining a finished one.
        *self.in_flight.lock() = None;
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    /// The recovery sequence proper: snapshot, discard, then bounded
    /// create/restore/verify attempts with exponential backoff. Once
    /// started it runs to completion; it is not cancelable mid-sequence.
    async fn run_sequence(&self) -> SequenceOutcome {
        // Capture host state from the old surface before discarding it.
        let old_surface = self.surface.write().await.take();
        let prior_state = match &old_surface {
            Some(surface) => self.restore.snapshot(surface).await,
            None => None,
        };
        if let Some(old) = old_surface {
            self.factory.destroy_surface(old).await;
        }

        let mut last_error = RecoveryError::Verification {
            status: HealthStatus::Terminated,
        };

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                let delay = self.config.backoff_delay(attempt - 1);
                tracing::debug!(
                    "Backing off {}ms before attempt {}/{}",
                    delay.as_millis(),
                    attempt,
                    self.config.max_attempts
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt_replacement(prior_state.as_ref()).await {
                Ok(()) => {
                    tracing::info!(
                        "Surface replaced and verified on attempt {}/{}",
                        attempt,
                        self.config.max_attempts
                    );
                    return Ok(RecoveryStats { attempts: attempt });
                }
                Err(err) => {
                    tracing::warn!(
                        "Recovery attempt {}/{} failed: {}",
                        attempt,
                        self.config.max_attempts,
                        err
                    );
                    self.diagnostics.send(&format!(
                        "recovery attempt {}/{} failed: {}",
                        attempt, self.config.max_attempts, err
                    ));
                    if !err.is_retryable() {
                        last_error = err;
                        break;
                    }
                    last_error = err;
                }
            }
        }

        Err(RecoveryError::Exhausted {
            attempts: self.config.max_attempts,
            last_error: last_error.to_string(),
        })
    }

    /// One attempt: create a replacement, re-home host state, verify.
    /// On verification failure the half-built surface is destroyed so the
    /// next attempt starts clean.
    async fn attempt_replacement(
        &self,
        prior_state: Option<&crate::surface::SurfaceState>,
    ) -> Result<()> {
        let replacement = self.factory.create_surface().await?;

        if let Err(err) = self.restore.restore(&replacement, prior_state).await {
            self.factory.destroy_surface(replacement).await;
            return Err(err.into());
        }

        let status = self.probe.check(Some(&replacement)).await;
        if status.is_failure() {
            self.factory.destroy_surface(replacement).await;
            return Err(RecoveryError::Verification { status });
        }

        *self.surface.write().await = Some(replacement);
        Ok(())
    }

    #[cfg(test)]
    fn force_state(&self, state: LifecycleState) {
        *self.state.lock() = state;
    }

    /// Apply a transition and append its record. Only ever called by the
    /// in-flight ticket owner, so transitions cannot interleave. An edge
    /// outside the table is a bug; it is logged and refused rather than
    /// applied.
    fn transition(&self, to: LifecycleState, reason: impl Into<String>) {
        let reason = reason.into();
        let record = {
            let mut state = self.state.lock();
            let from = *state;
            if !LifecycleState::can_transition(from, to) {
                tracing::error!("Refusing illegal transition {} -> {} ({})", from, to, reason);
                return;
            }
            *state = to;
            TransitionRecord {
                from,
                to,
                reason,
                timestamp: Utc::now(),
            }
        };

        tracing::info!(
            "Lifecycle {} -> {}: {}",
            record.from,
            record.to,
            record.reason
        );

        let mut history = self.history.lock();
        while history.len() >= self.config.history_capacity {
            history.pop_front();
        }
        history.push_back(record);
    }
}
