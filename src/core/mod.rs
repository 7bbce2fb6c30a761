//! Core types shared across the recovery pipeline:
//! configuration and the error taxonomy.

pub mod config;
pub mod error;

pub use config::RecoveryConfig;
pub use error::{RecoveryError, Result};
