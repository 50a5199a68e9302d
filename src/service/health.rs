//! Health checks for the matchday service
//!
//! Readiness and liveness probes plus a detailed check over the stores,
//! the match manager and the suggestion provider configuration.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported through `matchday_health_status`
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: &HealthStatus) -> HealthStatus {
        match (&self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when the component is not healthy, or to describe its mode
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub players_registered: u64,
    pub matches_created: u64,
    pub teams_generated: u64,
    pub matches_finalized: u64,
    pub votes_cast: u64,
    pub settlements_applied: u64,
    pub settlement_conflicts: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(&app_state).await,
            Self::check_match_manager(&app_state),
            Self::check_match_store(&app_state).await,
            Self::check_suggestion_provider(&app_state),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(&check.status));

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(&app_state),
        })
    }

    /// Liveness: the service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness: running, and the manager and stores answer
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let manager = Self::check_match_manager(&app_state).status;
        let store = Self::check_match_store(&app_state).await.status;
        Ok(manager.worst(&store))
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_match_manager(app_state: &AppState) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match app_state.manager().get_stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Match manager stats check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "match_manager".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A lookup of an id that never exists exercises the store read path
    async fn check_match_store(app_state: &AppState) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match app_state.stores().matches.get("__health__").await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Match store check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Match store unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "match_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The provider is optional; when enabled only its configuration is checked
    fn check_suggestion_provider(app_state: &AppState) -> ComponentCheck {
        let settings = &app_state.config().suggestion;

        let (status, message) = match (&settings.enabled, &settings.endpoint) {
            (false, _) => (HealthStatus::Healthy, Some("disabled".to_string())),
            (true, Some(endpoint)) => (HealthStatus::Healthy, Some(endpoint.clone())),
            (true, None) => (
                HealthStatus::Degraded,
                Some("enabled without endpoint, assignments fall back".to_string()),
            ),
        };

        ComponentCheck {
            name: "suggestion_provider".to_string(),
            status,
            message,
            duration_ms: 0,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let uptime_seconds = app_state.uptime().as_secs();

        match app_state.manager().get_stats() {
            Ok(stats) => ServiceStats {
                players_registered: stats.players_registered,
                matches_created: stats.matches_created,
                teams_generated: stats.teams_generated,
                matches_finalized: stats.matches_finalized,
                votes_cast: stats.votes_cast,
                settlements_applied: stats.settlements_applied,
                settlement_conflicts: stats.settlement_conflicts,
                uptime_seconds,
            },
            Err(e) => {
                debug!("Failed to get manager stats for health check: {}", e);
                ServiceStats {
                    uptime_seconds,
                    ..ServiceStats::default()
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
