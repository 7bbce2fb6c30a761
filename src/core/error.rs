//! Error types for webview-recovery
//!
//! Detection failures are never errors: a probe that times out or finds no
//! surface folds into `HealthStatus`. Errors here cover the recovery
//! sequence itself and configuration. Observer failures are isolated by the
//! event bus and only logged. Nothing in this crate propagates a panic to
//! the host.

use thiserror::Error;

use crate::surface::{HealthStatus, RestoreError, SurfaceFactoryError};

/// Result type alias for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Errors raised by the recovery pipeline.
///
/// `Clone` so a coalesced trigger can receive the in-flight sequence's
/// outcome over a watch channel.
#[derive(Error, Debug, Clone)]
pub enum RecoveryError {
    /// A single attempt failed to build a replacement surface
    #[error("surface creation failed: {reason}")]
    SurfaceCreation { reason: String },

    /// A single attempt failed to re-home host state onto the new surface
    #[error("state restore failed: {reason}")]
    StateRestore { reason: String },

    /// The replacement surface failed its post-recovery health check
    #[error("post-recovery verification failed: surface is {status}")]
    Verification { status: HealthStatus },

    /// All attempts failed; terminal until a manual retry
    #[error("recovery exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The in-flight sequence was dropped without producing an outcome
    #[error("recovery interrupted before completion")]
    Interrupted,

    /// Invalid configuration value
    #[error("invalid config value: {field} = {value}")]
    Config { field: String, value: String },
}

impl RecoveryError {
    /// Whether the attempt loop should retry after this error.
    ///
    /// Only per-attempt failures are retryable; exhaustion and config
    /// errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecoveryError::SurfaceCreation { .. }
                | RecoveryError::StateRestore { .. }
                | RecoveryError::Verification { .. }
        )
    }
}

impl From<SurfaceFactoryError> for RecoveryError {
    fn from(err: SurfaceFactoryError) -> Self {
        RecoveryError::SurfaceCreation { reason: err.reason }
    }
}

impl From<RestoreError> for RecoveryError {
    fn from(err: RestoreError) -> Self {
        RecoveryError::StateRestore { reason: err.reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_errors_are_retryable() {
        let err = RecoveryError::SurfaceCreation {
            reason: "out of memory".to_string(),
        };
        assert!(err.is_retryable());

        let err = RecoveryError::Verification {
            status: HealthStatus::Unresponsive,
        };
        assert!(err.is_retryable());

        let err = RecoveryError::StateRestore {
            reason: "navigation rejected".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn terminal_errors_are_not_retryable() {
        let err = RecoveryError::Exhausted {
            attempts: 3,
            last_error: "surface is unresponsive".to_string(),
        };
        assert!(!err.is_retryable());

        let err = RecoveryError::Config {
            field: "max_attempts".to_string(),
            value: "0".to_string(),
        };
        assert!(!err.is_retryable());

        assert!(!RecoveryError::Interrupted.is_retryable());
    }

    #[test]
    fn factory_error_conversion() {
        let err: RecoveryError = SurfaceFactoryError::new("gpu lost").into();
        assert!(matches!(err, RecoveryError::SurfaceCreation { .. }));
        assert!(err.to_string().contains("gpu lost"));
    }

    #[test]
    fn error_display_includes_detail() {
        let err = RecoveryError::Exhausted {
            attempts: 3,
            last_error: "surface is terminated".to_string(),
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains("terminated"));
    }
}
