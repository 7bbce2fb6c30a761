//! Recovery Pipeline
//!
//! `RecoveryCoordinator` is the state machine; `RecoveryService` is the
//! host-facing facade that wires it to the monitor, the event bus and the
//! diagnostics hub, mirroring the public operations a hosting application
//! uses: `recover`, `check_health`, `test_recovery`, `start_monitoring`,
//! `stop`, plus observer and diagnostics registration.

pub mod coordinator;


pub use coordinator::{
    LifecycleState, RecoveryCoordinator, RecoveryStats, SequenceOutcome, TransitionRecord,
};

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::core::config::RecoveryConfig;
use crate::core::error::Result;
use crate::diagnostics::{DiagnosticsHub, DiagnosticsSink};
use crate::events::{install_default_listeners, EventBus, ObserverId, RecoveryEvent};
use crate::monitor::{Monitor, MonitorStatus};
use crate::surface::{
    HealthStatus, NullStateRestore, StateRestore, SurfaceFactory, SurfaceHandle,
};

/// Host-facing entry point for crash detection and recovery.
pub struct RecoveryService {
    coordinator: Arc<RecoveryCoordinator>,
    monitor: Monitor,
    bus: Arc<EventBus>,
    diagnostics: Arc<DiagnosticsHub>,
    default_listener: ObserverId,
}

impl RecoveryService {
    /// Build a service with the default restore hook (nothing carried
    /// across replacements).
    pub fn new(config: RecoveryConfig, factory: Arc<dyn SurfaceFactory>) -> Result<Self> {
        RecoveryServiceBuilder::new(factory).config(config).build()
    }

    /// Builder with every knob exposed.
    pub fn builder(factory: Arc<dyn SurfaceFactory>) -> RecoveryServiceBuilder {
        RecoveryServiceBuilder::new(factory)
    }

    /// Install the surface to monitor. Replaces (and destroys) any
    /// previously attached surface.
    pub async fn attach_surface(&self, surface: SurfaceHandle) {
        self.coordinator.attach_surface(surface).await;
    }

    /// Manually trigger recovery. Returns the sequence outcome; a call
    /// landing while a sequence is in flight receives that sequence's
    /// outcome instead of starting another.
    pub async fn recover(&self) -> SequenceOutcome {
        self.coordinator.recover().await
    }

    /// Point-in-time health query; `true` means Healthy. Never errors,
    /// even with no surface attached.
    pub async fn check_health(&self) -> bool {
        self.coordinator.check_health().await == HealthStatus::Healthy
    }

    /// End-to-end pipeline exercise with a synthetic crash reason.
    pub async fn test_recovery(&self) -> SequenceOutcome {
        self.coordinator.test_recovery().await
    }

    /// Start periodic monitoring; returns a stream of per-tick status
    /// snapshots. Idempotent.
    pub fn start_monitoring(&self) -> broadcast::Receiver<MonitorStatus> {
        self.monitor.start_monitoring()
    }

    /// Stop monitoring before the next tick. Safe when not monitoring.
    pub async fn stop(&self) {
        self.monitor.stop().await;
    }

    /// Whether the monitor loop is running.
    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    /// Register a lifecycle event observer.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&RecoveryEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// Remove an observer (including the default log listener).
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Id of the default log listener installed at construction, so hosts
    /// can remove or replace it.
    pub fn default_listener_id(&self) -> ObserverId {
        self.default_listener
    }

    /// Route diagnostic messages to a host sink.
    pub fn set_diagnostics_sink(&self, sink: Arc<dyn DiagnosticsSink>) {
        self.diagnostics.set_sink(sink);
    }

    /// Drop the diagnostics sink; messages become no-ops.
    pub fn clear_diagnostics_sink(&self) {
        self.diagnostics.clear_sink();
    }

    /// Current lifecycle state.
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.coordinator.state()
    }

    /// Recent lifecycle transitions, oldest first.
    pub fn transition_history(&self) -> Vec<TransitionRecord> {
        self.coordinator.transition_history()
    }
}

/// Builder for [`RecoveryService`].
pub struct RecoveryServiceBuilder {
    config: RecoveryConfig,
    factory: Arc<dyn SurfaceFactory>,
    restore: Arc<dyn StateRestore>,
    diagnostics: Option<Arc<DiagnosticsHub>>,
}

impl RecoveryServiceBuilder {
    pub fn new(factory: Arc<dyn SurfaceFactory>) -> Self {
        Self {
            config: RecoveryConfig::default(),
            factory,
            restore: Arc::new(NullStateRestore),
            diagnostics: None,
        }
    }

    pub fn config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state_restore(mut self, restore: Arc<dyn StateRestore>) -> Self {
        self.restore = restore;
        self
    }

    pub fn diagnostics(mut self, hub: Arc<DiagnosticsHub>) -> Self {
        self.diagnostics = Some(hub);
        self
    }

    pub fn build(self) -> Result<RecoveryService> {
        self.config.validate()?;

        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(DiagnosticsHub::new()));
        let bus = Arc::new(EventBus::new(Arc::clone(&diagnostics)));
        let default_listener = install_default_listeners(&bus);

        let coordinator = Arc::new(RecoveryCoordinator::new(
            self.config.clone(),
            self.factory,
            self.restore,
            Arc::clone(&bus),
            Arc::clone(&diagnostics),
        ));
        let monitor = Monitor::new(self.config, Arc::clone(&coordinator));

        Ok(RecoveryService {
            coordinator,
            monitor,
            bus,
            diagnostics,
            default_listener,
        })
    }
}
