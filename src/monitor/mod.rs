//! Surface Monitor
//!
//! One interval-driven background task probes the current surface and
//! debounces failures: a degradation is only signaled after N consecutive
//! non-Healthy probes, so a single scheduling blip never triggers a
//! recovery. Each tick also publishes a status snapshot on a broadcast
//! channel for hosts that want continuous updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::core::config::RecoveryConfig;
use crate::events::CrashReason;
use crate::probe::HealthProbe;
use crate::recovery::{LifecycleState, RecoveryCoordinator};
use crate::surface::HealthStatus;

/// Per-tick snapshot published to status subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    /// Monotonic tick counter since monitoring started
    pub tick: u64,
    /// Probe result for this tick
    pub health: HealthStatus,
    /// Coordinator state at the time of the tick
    pub lifecycle: LifecycleState,
    /// Consecutive failed probes so far in the current window
    pub consecutive_failures: u32,
    pub timestamp: DateTime<Utc>,
}

/// Periodic health monitor driving the recovery coordinator.
pub struct Monitor {
    config: RecoveryConfig,
    coordinator: Arc<RecoveryCoordinator>,
    probe: HealthProbe,
    running: AtomicBool,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    status_tx: broadcast::Sender<MonitorStatus>,
}

impl Monitor {
    pub fn new(config: RecoveryConfig, coordinator: Arc<RecoveryCoordinator>) -> Self {
        let probe = HealthProbe::new(config.probe_timeout());
        let (status_tx, _) = broadcast::channel(config.status_channel_capacity);
        Self {
            config,
            coordinator,
            probe,
            running: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
            status_tx,
        }
    }

    /// Whether the polling loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the polling loop. Idempotent: if already running this only
    /// hands back another status subscription. The returned receiver gets
    /// one `MonitorStatus` per tick until `stop`; slow subscribers lose
    /// the oldest snapshots rather than blocking the loop.
    pub fn start_monitoring(&self) -> broadcast::Receiver<MonitorStatus> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("start_monitoring called while already running");
            return self.status_tx.subscribe();
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let receiver = self.status_tx.subscribe();

        let config = self.config.clone();
        let coordinator = Arc::clone(&self.coordinator);
        let probe = self.probe.clone();
        let status_tx = self.status_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.poll_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut tick: u64 = 0;
            let mut consecutive_failures: u32 = 0;
            let mut episode_signaled = false;

            tracing::info!(
                "Monitoring started (interval {}ms, debounce {})",
                config.poll_interval_ms,
                config.debounce_threshold
            );

            loop {
                tokio::select! {
                    // Shutdown wins over the next scheduled tick
                    biased;
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = interval.tick() => {
                        tick += 1;

                        let surface = coordinator.current_surface().await;
                        let health = probe.check(surface.as_ref()).await;
                        let lifecycle = coordinator.state();

                        if health.is_failure() {
                            consecutive_failures += 1;
                        } else {
                            consecutive_failures = 0;
                            if lifecycle == LifecycleState::Healthy {
                                // Episode resolved; arm for the next one
                                episode_signaled = false;
                            }
                        }

                        let _ = status_tx.send(MonitorStatus {
                            tick,
                            health,
                            lifecycle,
                            consecutive_failures,
                            timestamp: Utc::now(),
                        });

                        let confirmed = consecutive_failures >= config.debounce_threshold;
                        if confirmed
                            && !episode_signaled
                            && lifecycle == LifecycleState::Healthy
                        {
                            episode_signaled = true;
                            consecutive_failures = 0;

                            let reason = match health {
                                HealthStatus::Terminated => CrashReason::ProcessTerminated,
                                _ => CrashReason::HealthCheckFailed,
                            };
                            tracing::warn!(
                                "Degradation confirmed after {} consecutive failures ({})",
                                config.debounce_threshold,
                                reason
                            );

                            // Recovery runs to completion off the polling
                            // path; ticks keep observing while it does.
                            let coordinator = Arc::clone(&coordinator);
                            tokio::spawn(async move {
                                coordinator.on_degradation(reason).await;
                            });
                        }
                    }
                }
            }

            tracing::info!("Monitoring stopped after {} tick(s)", tick);
        });

        receiver
    }

    /// Subscribe to status snapshots without touching the loop state.
    pub fn status_updates(&self) -> broadcast::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Halt polling before the next tick fires. Safe to call when not
    /// running. An in-flight recovery sequence is not affected.
    ///
    /// The running flag clears here, not in the loop task, so a
    /// `start_monitoring` issued right after `stop` returns spawns a fresh
    /// loop instead of no-oping against one that is about to exit.
    pub async fn stop(&self) {
        let sender = self.shutdown_tx.lock().take();
        if let Some(tx) = sender {
            self.running.store(false, Ordering::SeqCst);
            let _ = tx.send(()).await;
        }
    }
}
