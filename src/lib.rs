//! webview-recovery - crash detection and recovery for embedded web surfaces
//!
//! This crate provides the supervision core for a hosted web-rendering
//! surface (a WebView-like process):
//! - Bounded liveness probing with timeout classification
//! - Periodic monitoring with debounce against transient jitter
//! - A serialized crash-recovery state machine with bounded, backed-off
//!   retries
//! - Ordered lifecycle event delivery with observer isolation
//! - Host-pluggable diagnostics forwarding
//!
//! The surface itself is opaque: hosts supply a [`surface::SurfaceFactory`]
//! that builds replacements and a [`surface::StateRestore`] hook that
//! re-homes listeners and state after one, then drive everything through
//! [`recovery::RecoveryService`].

pub mod core;
pub mod diagnostics;
pub mod events;
pub mod monitor;
pub mod probe;
pub mod recovery;
pub mod surface;

// Re-export commonly used items
pub use crate::core::config::RecoveryConfig;
pub use crate::core::error::{RecoveryError, Result};
pub use diagnostics::{DiagnosticsHub, DiagnosticsSink, TracingSink};
pub use events::{CrashReason, EventBus, ObserverId, RecoveryEvent};
pub use monitor::{Monitor, MonitorStatus};
pub use probe::HealthProbe;
pub use recovery::{
    LifecycleState, RecoveryCoordinator, RecoveryService, RecoveryServiceBuilder, RecoveryStats,
    SequenceOutcome, TransitionRecord,
};
pub use surface::{
    HealthStatus, NullStateRestore, RenderSurface, StateRestore, SurfaceFactory,
    SurfaceFactoryError, SurfaceHandle, SurfaceState, SurfaceTerminated,
};
