//! Lifecycle Event Bus
//!
//! Delivers phase-transition notifications to registered observers in
//! registration order, synchronously with the transition that produced
//! them. A panicking observer is isolated: the panic is caught, logged and
//! reported to diagnostics, and delivery continues. Subscribing or
//! unsubscribing from inside a callback is allowed; `emit` iterates a
//! snapshot, so mutations take effect on the next emit.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diagnostics::DiagnosticsHub;

/// Why a degradation episode began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrashReason {
    /// The render process is gone
    ProcessTerminated,
    /// The surface stopped answering health checks
    HealthCheckFailed,
    /// Synthetic trigger from `test_recovery`
    Simulated,
}

impl fmt::Display for CrashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashReason::ProcessTerminated => write!(f, "processTerminated"),
            CrashReason::HealthCheckFailed => write!(f, "healthCheckFailed"),
            CrashReason::Simulated => write!(f, "simulated"),
        }
    }
}

/// Lifecycle phase notifications, delivered in strict transition order.
/// Payloads are immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RecoveryEvent {
    /// A degradation was confirmed
    Crashed { reason: CrashReason },
    /// A recovery sequence is about to run
    WillRecover,
    /// The surface is healthy again
    DidRecover,
    /// The sequence exhausted its attempts
    RecoveryFailed { error: String },
}

impl RecoveryEvent {
    /// Event name as the host sees it (matches the serialized tag).
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryEvent::Crashed { .. } => "crashed",
            RecoveryEvent::WillRecover => "willRecover",
            RecoveryEvent::DidRecover => "didRecover",
            RecoveryEvent::RecoveryFailed { .. } => "recoveryFailed",
        }
    }
}

/// Identifier for a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(Uuid);

impl ObserverId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Callback = Arc<dyn Fn(&RecoveryEvent) + Send + Sync>;

struct Registration {
    id: ObserverId,
    callback: Callback,
}

/// Registration-ordered observer list with isolated delivery.
pub struct EventBus {
    observers: Mutex<Vec<Registration>>,
    diagnostics: Arc<DiagnosticsHub>,
}

impl EventBus {
    pub fn new(diagnostics: Arc<DiagnosticsHub>) -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            diagnostics,
        }
    }

    /// Register an observer. Returns the id used to remove it later.
    /// The same callback may be registered more than once.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&RecoveryEvent) + Send + Sync + 'static,
    {
        let id = ObserverId::generate();
        self.observers.lock().push(Registration {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove an observer. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|reg| reg.id != id);
        observers.len() != before
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Deliver an event to every observer registered at the start of this
    /// emit, in registration order. Observer panics are caught and logged;
    /// remaining observers still receive the event.
    pub fn emit(&self, event: &RecoveryEvent) {
        // Snapshot outside the lock so callbacks may re-enter
        // subscribe/unsubscribe without deadlocking.
        let snapshot: Vec<(ObserverId, Callback)> = self
            .observers
            .lock()
            .iter()
            .map(|reg| (reg.id, Arc::clone(&reg.callback)))
            .collect();

        tracing::trace!(
            "Emitting {} to {} observer(s)",
            event.name(),
            snapshot.len()
        );

        for (id, callback) in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if let Err(payload) = outcome {
                let detail = panic_message(&payload);
                tracing::warn!(
                    "Observer {} panicked during {}: {}",
                    id,
                    event.name(),
                    detail
                );
                self.diagnostics
                    .send(&format!("observer {} failed on {}: {}", id, event.name(), detail));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Install the default lifecycle log observer.
///
/// This replaces the auto-registered console listeners a host page would
/// otherwise carry: one removable observer, installed at service startup,
/// logging each phase at its conventional level.
pub fn install_default_listeners(bus: &EventBus) -> ObserverId {
    bus.subscribe(|event| match event {
        RecoveryEvent::Crashed { reason } => {
            tracing::warn!("WebView crashed: {}", reason);
        }
        RecoveryEvent::WillRecover => {
            tracing::info!("WebView recovery starting");
        }
        RecoveryEvent::DidRecover => {
            tracing::info!("WebView recovered successfully");
        }
        RecoveryEvent::RecoveryFailed { error } => {
            tracing::error!("WebView recovery failed: {}", error);
        }
    })
}
