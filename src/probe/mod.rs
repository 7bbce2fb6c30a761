//! Health Probe
//!
//! A single point-in-time liveness check against the render surface. The
//! probe is time-boxed internally: callers get an answer within the
//! configured timeout no matter how wedged the surface is. Absence of a
//! surface is a detection result (`Terminated`), never an error.

use std::time::Duration;

use crate::surface::{HealthStatus, SurfaceHandle};

/// Issues bounded liveness checks.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    timeout: Duration,
}

impl HealthProbe {
    /// Create a probe with the given time box.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The probe's time box.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check the surface once.
    ///
    /// - `None` (no surface attached) is `Terminated`
    /// - a ping error is `Terminated`
    /// - a ping that outlives the time box is `Unresponsive`
    /// - a prompt reply is `Healthy`
    pub async fn check(&self, surface: Option<&SurfaceHandle>) -> HealthStatus {
        let Some(surface) = surface else {
            return HealthStatus::Terminated;
        };

        match tokio::time::timeout(self.timeout, surface.ping()).await {
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(err)) => {
                tracing::debug!("Probe found surface terminated: {}", err);
                HealthStatus::Terminated
            }
            Err(_) => {
                tracing::debug!(
                    "Probe timed out after {}ms",
                    self.timeout.as_millis()
                );
                HealthStatus::Unresponsive
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::surface::{RenderSurface, SurfaceTerminated};

    struct AliveSurface;

    #[async_trait]
    impl RenderSurface for AliveSurface {
        async fn ping(&self) -> Result<(), SurfaceTerminated> {
            Ok(())
        }
    }

    struct DeadSurface;

    #[async_trait]
    impl RenderSurface for DeadSurface {
        async fn ping(&self) -> Result<(), SurfaceTerminated> {
            Err(SurfaceTerminated::new("content process exited"))
        }
    }

    struct FrozenSurface;

    #[async_trait]
    impl RenderSurface for FrozenSurface {
        async fn ping(&self) -> Result<(), SurfaceTerminated> {
            // Never answers; the probe's time box must classify this
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn healthy_surface_reports_healthy() {
        let probe = HealthProbe::new(Duration::from_millis(100));
        let surface: SurfaceHandle = Arc::new(AliveSurface);
        assert_eq!(probe.check(Some(&surface)).await, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn dead_surface_reports_terminated() {
        let probe = HealthProbe::new(Duration::from_millis(100));
        let surface: SurfaceHandle = Arc::new(DeadSurface);
        assert_eq!(probe.check(Some(&surface)).await, HealthStatus::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn frozen_surface_reports_unresponsive() {
        let probe = HealthProbe::new(Duration::from_millis(2000));
        let surface: SurfaceHandle = Arc::new(FrozenSurface);
        assert_eq!(
            probe.check(Some(&surface)).await,
            HealthStatus::Unresponsive
        );
    }

    #[tokio::test]
    async fn missing_surface_reports_terminated() {
        let probe = HealthProbe::new(Duration::from_millis(100));
        assert_eq!(probe.check(None).await, HealthStatus::Terminated);
    }
}
