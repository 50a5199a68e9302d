//! Main entry point for the matchday service
//!
//! Runs the health/metrics shell, validates configuration, or performs a
//! one-shot offline team balance over a roster file. Matches, votes and
//! settlements are driven through the library API, not through this binary.

use anyhow::{Context, Result};
use clap::Parser;
use matchday::config::{validate_config, AppConfig};
use matchday::service::{AppState, HealthCheck, HealthStatus};
use matchday::teams::parse_roster;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Matchday - balanced teams, peer feedback and rating settlement
#[derive(Parser)]
#[command(
    name = "matchday",
    version,
    about = "Team balancing, peer feedback and rating settlement for pickup matches",
    long_about = "Matchday splits the players of a pickup match into two balanced sides, \
                 optionally asking an external provider for a suggestion, records peer \
                 feedback votes after the match and settles each player's rating exactly once. \
                 The binary serves health and metrics endpoints and runs offline \
                 --balance jobs; match management is a library API."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "PORT", help = "Override health/metrics server port")]
    health_port: Option<u16>,

    #[arg(long, value_name = "URL", help = "Enable the suggestion provider at this URL")]
    suggestion_endpoint: Option<String>,

    #[arg(long, help = "Disable the suggestion provider")]
    no_suggestions: bool,

    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,

    /// Balance a roster file and print the assignment as JSON
    #[arg(
        long,
        value_name = "FILE",
        help = "Balance the players of a JSON roster file and exit"
    )]
    balance: Option<PathBuf>,

    #[arg(long, value_name = "SEED", help = "Seed for --balance (random if omitted)")]
    seed: Option<u32>,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = Arc::new(AppState::new(config).await?);

    match HealthCheck::check(app_state).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            for check in &health.checks {
                println!(
                    "  {}: {}{}",
                    check.name,
                    check.status,
                    check
                        .message
                        .as_ref()
                        .map(|m| format!(" ({})", m))
                        .unwrap_or_default()
                );
            }

            // A fresh process is never running; only store or manager failures count
            let ready = health
                .checks
                .iter()
                .filter(|c| c.name != "service_running")
                .all(|c| c.status != HealthStatus::Unhealthy);
            std::process::exit(if ready { 0 } else { 1 });
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run the assignment engine once over a roster file
async fn run_balance(config: &AppConfig, roster: &Path, seed: Option<u32>) -> Result<()> {
    let raw = std::fs::read_to_string(roster)
        .with_context(|| format!("Failed to read roster {}", roster.display()))?;
    let participants = parse_roster(&raw, &config.rating)?;
    info!(
        "Balancing {} players from {}",
        participants.len(),
        roster.display()
    );

    let engine = AppState::build_assignment_engine(config)?;
    let outcome = engine.assign(&participants, seed).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log a health summary every 30 seconds
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} matches, {} settlements",
                    health.status, health.stats.matches_created, health.stats.settlements_applied
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Matchday Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   Suggestions: {}",
        match (&config.suggestion.enabled, &config.suggestion.endpoint) {
            (true, Some(endpoint)) => endpoint.as_str(),
            _ => "disabled",
        }
    );
    info!(
        "   Swap iterations: {}, threshold: max({}, {}×total)",
        config.balance.max_swap_iterations,
        config.balance.min_threshold,
        config.balance.threshold_ratio
    );
    info!(
        "   Rating: default {}, floor {}, max delta {}",
        config.rating.default_rating, config.rating.rating_floor, config.rating.max_delta
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }

    if let Some(endpoint) = &args.suggestion_endpoint {
        config.suggestion.enabled = true;
        config.suggestion.endpoint = Some(endpoint.clone());
    }

    if args.no_suggestions {
        config.suggestion.enabled = false;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if let Some(roster) = &args.balance {
        return run_balance(&config, roster, args.seed).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            health_check_task(app_state).await;
        })
    };

    info!("✅ Matchday service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    info!("🛑 Matchday service stopped");
    Ok(())
}
