//! Service layer for the matchday service
//!
//! This module contains the application state that wires the stores and
//! engines together, plus the health checks used by the probes.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
