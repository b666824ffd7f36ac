//! vz-grafana HTTP Server
//!
//! Serves the Grafana SimpleJson datasource API on top of a volkszaehler
//! middleware.
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration file
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` flag
//! 2. `VZ_GRAFANA_CONFIG` environment variable (path to TOML file)
//! 3. `./application.toml` in current directory
//! 4. Default configuration

use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{debug, info, warn};
use vz_grafana::{
    config::Config,
    entity::EntityCache,
    query::QueryEngine,
    server::{build_router, AppState},
    Backend, VolkszaehlerClient,
};

// =============================================================================
// CLI Definition
// =============================================================================

/// vz-grafana - Grafana datasource for the volkszaehler middleware
#[derive(Parser)]
#[command(name = "vz-grafana")]
#[command(version)]
#[command(about = "Grafana SimpleJson datasource for the volkszaehler middleware", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides VZ_GRAFANA_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// volkszaehler middleware URL
    #[arg(short, long, global = true)]
    api: Option<String>,

    /// Middleware request timeout in seconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Override listen address (e.g., 0.0.0.0:8000)
    #[arg(short, long, global = true)]
    listen: Option<String>,

    /// Log request, response and middleware bodies
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> Result<(Config, Option<PathBuf>), Box<dyn std::error::Error>> {
    let (mut config, source) = Config::load(cli.config.as_deref())?;

    if let Some(api) = &cli.api {
        config.backend.url = api.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.backend.timeout_secs = timeout;
    }
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen.clone();
    }
    if cli.verbose {
        config.server.verbose = true;
    }

    config.validate()?;
    Ok((config, source))
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (config, source) = load_config(cli)?;

    println!("Configuration is valid!");
    match source {
        Some(path) => println!("  Source: {}", path.display()),
        None => println!("  Source: defaults"),
    }
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.server.listen_addr);
    println!("  Log level: {}", config.server.log_level);
    println!("  Verbose: {}", config.server.verbose);
    println!();
    println!("Backend Settings:");
    println!("  URL: {}", config.backend.url);
    println!("  Timeout: {} s", config.backend.timeout_secs);
    println!("  Endpoint detection: {}", config.backend.detect_endpoint);
    println!();
    println!("Query Settings:");
    println!(
        "  Max concurrent targets: {}",
        config.query.max_concurrent_targets
    );
    println!();
    println!("Entity Cache:");
    println!("  Refresh on startup: {}", config.cache.refresh_on_startup);
    println!(
        "  Refresh interval: {} s",
        config.cache.refresh_interval_secs
    );

    Ok(())
}

// =============================================================================
// Server
// =============================================================================

/// Graceful shutdown signal handler
///
/// Signal registration failures are logged and the corresponding branch
/// waits forever; the server then has to be killed forcefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Periodically refresh the entity cache in the background
fn spawn_cache_refresh(cache: Arc<EntityCache>, backend: Arc<dyn Backend>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick

        loop {
            interval.tick().await;
            let entities = cache.refresh(backend.as_ref()).await;
            debug!(entities = entities.len(), "Background entity refresh");
        }
    });
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli),
        Some(Commands::Start) | None => {
            // Continue with server startup below
        },
    }

    let (config, source) = load_config(&cli)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting vz-grafana v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        source = ?source,
        listen_addr = %config.server.listen_addr,
        api = %config.backend.url,
        "Configuration loaded"
    );

    // Backend client
    let mut client = VolkszaehlerClient::new(config.client_config())?;
    if config.backend.detect_endpoint {
        client.detect_endpoint().await;
    }
    let backend: Arc<dyn Backend> = Arc::new(client);

    // Entity cache
    let cache = Arc::new(EntityCache::new());
    if config.cache.refresh_on_startup {
        let entities = cache.refresh(backend.as_ref()).await;
        info!(entities = entities.len(), "Entity cache populated");
    }
    if config.cache.refresh_interval_secs > 0 {
        spawn_cache_refresh(
            cache.clone(),
            backend.clone(),
            Duration::from_secs(config.cache.refresh_interval_secs),
        );
        debug!(
            interval_secs = config.cache.refresh_interval_secs,
            "Background entity refresh enabled"
        );
    }

    // Query engine and router
    let engine = QueryEngine::new(backend, cache, config.engine_config());
    let state = Arc::new(AppState::new(engine, config.server.verbose));
    let app = build_router(state, &config.server.cors_allowed_origins);

    let addr: SocketAddr = config.server.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
