//! Render Surface Interfaces
//!
//! The render surface itself (the embedded web-content process) is outside
//! this crate: the host platform owns its creation and teardown. This module
//! defines the contracts the recovery core consumes: an opaque handle that
//! can be pinged, a factory that can replace it, and a restore hook for
//! re-attaching host state after replacement.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a single liveness check against a render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    /// Surface responded promptly
    Healthy,
    /// Surface did not respond within the probe timeout
    Unresponsive,
    /// Surface process is gone (or no surface is attached)
    Terminated,
}

impl HealthStatus {
    /// Whether this status counts as a failed probe
    pub fn is_failure(&self) -> bool {
        !matches!(self, HealthStatus::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unresponsive => write!(f, "unresponsive"),
            HealthStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Error returned by a surface when its backing process no longer exists.
#[derive(Error, Debug, Clone)]
#[error("render surface terminated: {reason}")]
pub struct SurfaceTerminated {
    pub reason: String,
}

impl SurfaceTerminated {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Contract for the opaque render surface handle.
///
/// A healthy surface answers `ping` promptly. A surface whose backing
/// process is gone returns `SurfaceTerminated`. A hung surface simply never
/// answers; the probe's timeout classifies that case.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Issue a liveness query. Must not be called without an enclosing
    /// timeout; a frozen surface may never return.
    async fn ping(&self) -> Result<(), SurfaceTerminated>;
}

/// Opaque, shared reference to the current render surface.
///
/// Exclusively owned by the recovery coordinator; lent out for the duration
/// of a single probe call only.
pub type SurfaceHandle = Arc<dyn RenderSurface>;

/// Host-captured surface state, carried across a surface replacement.
///
/// Opaque to the recovery core; the host decides what it snapshots (URL,
/// scroll position, session data).
pub type SurfaceState = serde_json::Value;

/// Error raised by the surface factory when a replacement cannot be built.
#[derive(Error, Debug, Clone)]
#[error("surface factory failed: {reason}")]
pub struct SurfaceFactoryError {
    pub reason: String,
}

impl SurfaceFactoryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Creates and destroys render surfaces. Implemented by the host platform.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    /// Build a fresh render surface.
    async fn create_surface(&self) -> Result<SurfaceHandle, SurfaceFactoryError>;

    /// Tear down a surface. Called with the last reference the coordinator
    /// holds; must tolerate surfaces that are already dead.
    async fn destroy_surface(&self, surface: SurfaceHandle);
}

/// Error raised by the restore hook.
#[derive(Error, Debug, Clone)]
#[error("state restore failed: {reason}")]
pub struct RestoreError {
    pub reason: String,
}

impl RestoreError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Re-attaches host-owned listeners and state onto a replacement surface.
#[async_trait]
pub trait StateRestore: Send + Sync {
    /// Capture whatever the host wants carried over, from the surface that
    /// is about to be discarded. The surface may already be dead; return
    /// `None` when nothing can be captured.
    async fn snapshot(&self, surface: &SurfaceHandle) -> Option<SurfaceState>;

    /// Re-home listeners and prior state onto the replacement surface.
    async fn restore(
        &self,
        surface: &SurfaceHandle,
        prior: Option<&SurfaceState>,
    ) -> Result<(), RestoreError>;
}

/// Restore hook that carries nothing across a replacement.
#[derive(Debug, Default)]
pub struct NullStateRestore;

#[async_trait]
impl StateRestore for NullStateRestore {
    async fn snapshot(&self, _surface: &SurfaceHandle) -> Option<SurfaceState> {
        None
    }

    async fn restore(
        &self,
        _surface: &SurfaceHandle,
        _prior: Option<&SurfaceState>,
    ) -> Result<(), RestoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AliveSurface;

    #[async_trait]
    impl RenderSurface for AliveSurface {
        async fn ping(&self) -> Result<(), SurfaceTerminated> {
            Ok(())
        }
    }

    #[test]
    fn health_status_failure_classification() {
        assert!(!HealthStatus::Healthy.is_failure());
        assert!(HealthStatus::Unresponsive.is_failure());
        assert!(HealthStatus::Terminated.is_failure());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Unresponsive.to_string(), "unresponsive");
    }

    #[tokio::test]
    async fn null_restore_is_a_no_op() {
        let restore = NullStateRestore;
        let surface: SurfaceHandle = Arc::new(AliveSurface);

        assert!(restore.snapshot(&surface).await.is_none());
        assert!(restore.restore(&surface, None).await.is_ok());
    }
}
