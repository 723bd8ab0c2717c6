//! Haulscope CLI
//!
//! Runs the analytics API and a couple of operational checks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use haulscope::analytics::{DataAvailability, OrgDirectory, Relation, Source};
use haulscope::api::{AppState, HttpServer};
use haulscope::auth::JwtVerifier;
use haulscope::config::LoggingConfig;
use haulscope::db::Database;
use haulscope::service::AnalyticsService;
use haulscope::Config;

/// Haulscope - role-scoped haulage analytics
#[derive(Parser)]
#[command(name = "haulscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "HAULSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the analytics API
    Serve {
        /// Address to bind, overrides server.host
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show which relations currently exist
    Relations,

    /// Check database connectivity
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Relations => run_relations(config, cli.format).await,
        Commands::Health => run_health(config, cli.format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},tower_http=info")));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.metrics.enabled {
        let listen: SocketAddr = config
            .metrics
            .listen
            .parse()
            .with_context(|| format!("invalid metrics.listen address {}", config.metrics.listen))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(listen)
            .install()
            .context("failed to start the Prometheus exporter")?;
        info!(addr = %listen, "Prometheus exporter listening");
    }

    let db = Database::lazy(&config.database)?;
    if let Err(e) = db.health_check().await {
        warn!(error = %e, "Database is not reachable yet, reports will fail until it is");
    }

    let availability: Arc<dyn DataAvailability> = db.availability.clone();
    let directory: Arc<dyn OrgDirectory> = Arc::new(db.directory());
    let source = Source::new(db.postgres.pool().clone(), availability);

    let state = AppState {
        analytics: Arc::new(AnalyticsService::new(source, directory, &config.analytics)),
        verifier: Arc::new(JwtVerifier::new(&config.auth)?),
        postgres: db.postgres.clone(),
    };

    info!(
        addr = %config.server.bind_addr(),
        default_range_days = config.analytics.default_range_days,
        max_range_days = config.analytics.max_range_days,
        "Starting Haulscope"
    );

    HttpServer::new(state, config.server.request_timeout)
        .serve(&config.server.bind_addr(), shutdown_signal())
        .await?;

    Ok(())
}

async fn run_relations(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let db = Database::new(&config.database)
        .await
        .context("failed to connect to the database")?;

    let mut rows = Vec::with_capacity(Relation::ALL.len());
    for relation in Relation::ALL {
        rows.push((relation, db.availability.exists(relation).await));
    }

    match format {
        OutputFormat::Json => {
            let body: Vec<_> = rows
                .iter()
                .map(|(relation, exists)| {
                    json!({
                        "relation": relation.table_name(),
                        "rollup": relation.is_rollup(),
                        "exists": exists,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            for (relation, exists) in rows {
                let kind = if relation.is_rollup() { "rollup" } else { "table" };
                let state = if exists { "present" } else { "missing" };
                println!("{:<24} {:<7} {}", relation.table_name(), kind, state);
            }
        }
    }

    Ok(())
}

async fn run_health(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let db = Database::new(&config.database).await;
    let database = match &db {
        Ok(db) => db.health_check().await.is_ok(),
        Err(_) => false,
    };

    match format {
        OutputFormat::Json => {
            let body = json!({
                "status": if database { "ok" } else { "degraded" },
                "version": env!("CARGO_PKG_VERSION"),
                "database": database,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            println!("Haulscope {}", env!("CARGO_PKG_VERSION"));
            println!("  database: {}", if database { "ok" } else { "unreachable" });
        }
    }

    if let Err(e) = db {
        anyhow::bail!("database check failed: {e}");
    }
    if !database {
        anyhow::bail!("database did not answer");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, finishing in-flight requests");
}
