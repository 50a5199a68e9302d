//! Main application state and service coordination
//!
//! `AppState` wires the stores, the team assignment engine and the match
//! manager together, owns the metrics/health server and the gauge refresh
//! task.
//!
//! The standalone service exposes health and metrics only. The manager is
//! driven through the library API by whatever embeds `AppState`; the binary
//! itself serves no match or vote endpoints.

use crate::config::AppConfig;
use crate::matches::{MatchManager, Stores};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::service::health::HealthCheck;
use crate::storage::{InMemoryMatchStore, InMemoryPlayerStore, InMemoryVoteStore};
use crate::teams::{HttpSuggestionProvider, TeamAssignmentEngine};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    stores: Stores,

    /// Lifecycle façade over the stores and engines
    manager: MatchManager,

    metrics_collector: Arc<MetricsCollector>,

    /// Health and metrics endpoints, present while started
    metrics_service: Mutex<Option<Arc<MetricsService>>>,

    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with in-memory stores
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing matchday service");
        info!(
            "Configuration: service={}, suggestions={}",
            config.service.name, config.suggestion.enabled
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let stores = Stores {
            matches: Arc::new(InMemoryMatchStore::new()),
            players: Arc::new(InMemoryPlayerStore::new()),
            votes: Arc::new(InMemoryVoteStore::new()),
        };

        let engine = Self::build_assignment_engine(&config)?;
        let manager = MatchManager::new(
            stores.clone(),
            engine,
            &config,
            metrics_collector.clone(),
        );

        Ok(Self {
            config,
            stores,
            manager,
            metrics_collector,
            metrics_service: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Assignment engine for the configured suggestion mode
    pub fn build_assignment_engine(
        config: &AppConfig,
    ) -> Result<TeamAssignmentEngine, ServiceError> {
        let settings = &config.suggestion;
        let endpoint = match (&settings.enabled, &settings.endpoint) {
            (true, Some(endpoint)) => endpoint.clone(),
            (true, None) => {
                return Err(ServiceError::Configuration {
                    message: "suggestion provider enabled without an endpoint".to_string(),
                })
            }
            (false, _) => {
                info!("Suggestion provider disabled, using local balancing only");
                return Ok(TeamAssignmentEngine::without_suggestions(
                    config.balance.clone(),
                ));
            }
        };

        let provider =
            HttpSuggestionProvider::new(&endpoint, settings.api_key.clone(), settings.timeout())
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to build suggestion provider: {}", e),
                })?;

        info!(
            "Suggestion provider enabled - endpoint: {}, timeout: {}ms",
            endpoint, settings.timeout_ms
        );
        Ok(TeamAssignmentEngine::new(
            config.balance.clone(),
            settings.clone(),
            Arc::new(provider),
        ))
    }

    /// Start the health server and the background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting matchday service");

        self.set_running(true).await;
        self.start_metrics_service().await?;
        self.start_background_tasks().await;

        info!("✅ Matchday service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of matchday service");

        self.set_running(false).await;

        self.stop_background_tasks().await;

        // Dropping the service breaks the server's reference back to this state
        if let Some(metrics_service) = self.metrics_service.lock().await.take() {
            info!("Stopping metrics service...");
            if let Err(e) = metrics_service.stop().await {
                warn!("Failed to stop metrics service: {}", e);
            } else {
                info!("✅ Metrics service stopped");
            }
        }

        let final_stats =
            self.manager
                .get_stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Matchday service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub(crate) async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn manager(&self) -> MatchManager {
        self.manager.clone()
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_metrics_service(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.health_port;
        info!("Starting metrics and health endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_app_state(self.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(
            self.metrics_collector.clone(),
            health_server,
        ));
        *self.metrics_service.lock().await = Some(metrics_service.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Refresh uptime, manager and health gauges every 60 seconds
    async fn start_background_tasks(self: &Arc<Self>) {
        info!("Starting service metrics task (60s interval)...");
        let app_state = self.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            info!("Service metrics task started");

            while app_state.is_running().await {
                interval.tick().await;

                let metrics_collector = app_state.metrics_collector();
                metrics_collector
                    .service()
                    .uptime_seconds
                    .set(app_state.uptime().as_secs() as i64);

                match app_state.manager.get_stats() {
                    Ok(stats) => metrics_collector.update_from_manager_stats(&stats),
                    Err(e) => warn!("Failed to get manager stats for metrics update: {}", e),
                }

                match HealthCheck::check(app_state.clone()).await {
                    Ok(health) => {
                        metrics_collector.update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            metrics_collector.update_component_health(
                                &check.name,
                                check.status != crate::service::HealthStatus::Unhealthy,
                            );
                        }
                        debug!("Updated service health metrics - status: {}", health.status);
                    }
                    Err(e) => {
                        warn!("Health metrics update failed: {}", e);
                    }
                }
            }

            info!("Service metrics task stopped");
        });

        self.background_tasks.lock().await.push(task);
    }

    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
