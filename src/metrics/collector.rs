//! Metrics collection using Prometheus
//!
//! Counters and histograms for team assignment, votes and settlement, plus
//! service-level health gauges.

use crate::matches::MatchManagerStats;
use crate::storage::UpsertOutcome;
use crate::types::{AssignmentSource, Rating, VoteValue};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchday service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    team_metrics: TeamMetrics,
    vote_metrics: VoteMetrics,
    settlement_metrics: SettlementMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Lifecycle totals mirrored from the match manager
    pub manager_totals: IntGaugeVec,
}

/// Team assignment metrics
#[derive(Clone)]
pub struct TeamMetrics {
    /// Assignments by the path that produced them
    pub assignments_total: IntCounterVec,

    /// Suggestions discarded or failed, by reason
    pub suggestion_failures_total: IntCounterVec,

    /// Swaps applied by the local search per assignment
    pub rebalance_swaps: Histogram,
}

/// Vote metrics
#[derive(Clone)]
pub struct VoteMetrics {
    /// Votes cast by value and whether they created or replaced a record
    pub votes_cast_total: IntCounterVec,
}

/// Settlement metrics
#[derive(Clone)]
pub struct SettlementMetrics {
    /// Settlement attempts by status (applied, resumed, conflict, failed)
    pub settlements_total: IntCounterVec,

    /// Distribution of applied per-player deltas
    pub rating_delta: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Team assignment time
    pub assignment_duration: Histogram,

    /// Settlement time by status
    pub settlement_duration: HistogramVec,

    /// Match manager operation durations
    pub operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let team_metrics = TeamMetrics::new(&registry)?;
        let vote_metrics = VoteMetrics::new(&registry)?;
        let settlement_metrics = SettlementMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            team_metrics,
            vote_metrics,
            settlement_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn teams(&self) -> &TeamMetrics {
        &self.team_metrics
    }

    pub fn votes(&self) -> &VoteMetrics {
        &self.vote_metrics
    }

    pub fn settlement(&self) -> &SettlementMetrics {
        &self.settlement_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Mirror match manager totals into gauges
    pub fn update_from_manager_stats(&self, stats: &MatchManagerStats) {
        let totals = &self.service_metrics.manager_totals;
        totals
            .with_label_values(&["matches_created"])
            .set(stats.matches_created as i64);
        totals
            .with_label_values(&["teams_generated"])
            .set(stats.teams_generated as i64);
        totals
            .with_label_values(&["matches_finalized"])
            .set(stats.matches_finalized as i64);
        totals
            .with_label_values(&["votes_cast"])
            .set(stats.votes_cast as i64);
        totals
            .with_label_values(&["settlements_applied"])
            .set(stats.settlements_applied as i64);
    }

    /// Record a finished team assignment
    pub fn record_team_assignment(
        &self,
        source: AssignmentSource,
        swaps: usize,
        duration: Duration,
    ) {
        self.team_metrics
            .assignments_total
            .with_label_values(&[source.as_str()])
            .inc();

        self.team_metrics.rebalance_swaps.observe(swaps as f64);

        self.performance_metrics
            .assignment_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a suggestion that could not be used
    pub fn record_suggestion_failure(&self, reason: &str) {
        self.team_metrics
            .suggestion_failures_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_vote(&self, value: VoteValue, outcome: UpsertOutcome) {
        self.vote_metrics
            .votes_cast_total
            .with_label_values(&[value.as_str(), outcome.as_str()])
            .inc();
    }

    /// Record a settlement attempt
    pub fn record_settlement(&self, status: &str, duration: Duration) {
        self.settlement_metrics
            .settlements_total
            .with_label_values(&[status])
            .inc();

        self.performance_metrics
            .settlement_duration
            .with_label_values(&[status])
            .observe(duration.as_secs_f64());
    }

    pub fn record_rating_delta(&self, delta: Rating) {
        self.settlement_metrics.rating_delta.observe(delta as f64);
    }

    /// Record match manager operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("matchday_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "matchday_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("matchday_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let manager_totals = IntGaugeVec::new(
            Opts::new("matchday_manager_totals", "Match manager lifecycle totals"),
            &["counter"],
        )?;
        registry.register(Box::new(manager_totals.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            manager_totals,
        })
    }
}

impl TeamMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let assignments_total = IntCounterVec::new(
            Opts::new("matchday_team_assignments_total", "Team assignments by path"),
            &["source"],
        )?;
        registry.register(Box::new(assignments_total.clone()))?;

        let suggestion_failures_total = IntCounterVec::new(
            Opts::new(
                "matchday_suggestion_failures_total",
                "Team suggestions failed or discarded",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(suggestion_failures_total.clone()))?;

        let rebalance_swaps = Histogram::with_opts(
            HistogramOpts::new(
                "matchday_rebalance_swaps",
                "Local-search swaps per assignment",
            )
            .buckets(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
        )?;
        registry.register(Box::new(rebalance_swaps.clone()))?;

        Ok(Self {
            assignments_total,
            suggestion_failures_total,
            rebalance_swaps,
        })
    }
}

impl VoteMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let votes_cast_total = IntCounterVec::new(
            Opts::new("matchday_votes_cast_total", "Feedback votes cast"),
            &["value", "outcome"],
        )?;
        registry.register(Box::new(votes_cast_total.clone()))?;

        Ok(Self { votes_cast_total })
    }
}

impl SettlementMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let settlements_total = IntCounterVec::new(
            Opts::new("matchday_settlements_total", "Rating settlement attempts"),
            &["status"],
        )?;
        registry.register(Box::new(settlements_total.clone()))?;

        let rating_delta = Histogram::with_opts(
            HistogramOpts::new("matchday_rating_delta", "Applied per-player rating delta")
                .buckets(vec![-40.0, -20.0, -10.0, -5.0, 0.0, 5.0, 10.0, 20.0, 40.0]),
        )?;
        registry.register(Box::new(rating_delta.clone()))?;

        Ok(Self {
            settlements_total,
            rating_delta,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let assignment_duration = Histogram::with_opts(
            HistogramOpts::new(
                "matchday_assignment_duration_seconds",
                "Team assignment time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(assignment_duration.clone()))?;

        let settlement_duration = HistogramVec::new(
            HistogramOpts::new(
                "matchday_settlement_duration_seconds",
                "Rating settlement time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["status"],
        )?;
        registry.register(Box::new(settlement_duration.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "matchday_operation_duration_seconds",
                "Match manager operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            assignment_duration,
            settlement_duration,
            operation_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    fn render(collector: &MetricsCollector) -> String {
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&collector.registry().gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_assignment_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_team_assignment(AssignmentSource::Suggested, 2, Duration::from_micros(80));
        collector.record_team_assignment(AssignmentSource::Shuffled, 0, Duration::from_micros(20));
        collector.record_suggestion_failure("timeout");

        assert_eq!(
            collector
                .teams()
                .assignments_total
                .with_label_values(&["suggested"])
                .get(),
            1
        );
        assert_eq!(collector.teams().rebalance_swaps.get_sample_count(), 2);
        assert!(render(&collector).contains("matchday_suggestion_failures_total"));
    }

    #[test]
    fn test_vote_and_settlement_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_vote(VoteValue::Up, UpsertOutcome::Created);
        collector.record_vote(VoteValue::Up, UpsertOutcome::Updated);
        collector.record_settlement("applied", Duration::from_millis(2));
        collector.record_settlement("conflict", Duration::from_millis(1));
        collector.record_rating_delta(14);

        assert_eq!(
            collector
                .votes()
                .votes_cast_total
                .with_label_values(&["up", "updated"])
                .get(),
            1
        );
        assert_eq!(
            collector
                .settlement()
                .settlements_total
                .with_label_values(&["conflict"])
                .get(),
            1
        );
        assert_eq!(collector.settlement().rating_delta.get_sample_sum(), 14.0);
    }

    #[test]
    fn test_manager_stats_mirrored() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let stats = MatchManagerStats {
            matches_created: 3,
            votes_cast: 7,
            ..MatchManagerStats::default()
        };

        collector.update_from_manager_stats(&stats);
        collector.update_from_manager_stats(&stats);

        assert_eq!(
            collector
                .service()
                .manager_totals
                .with_label_values(&["matches_created"])
                .get(),
            3
        );
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("match_store", true);
        assert_eq!(collector.service().health_status.get(), 2);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
