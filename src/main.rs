//! herakles-perf-monitor entry point.
//!
//! Resolves configuration (CLI > config file > defaults), dispatches
//! subcommands, and otherwise runs the sampling loop next to the optional
//! HTTP server until SIGINT/SIGTERM.

use axum::{routing::get, Router};
use clap::Parser;
use herakles_perf_monitor::config::{
    load_config, validate_effective_config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use herakles_perf_monitor::display::{ConsoleDisplay, LogDisplay};
use herakles_perf_monitor::sink::{EventSink, MemorySink, SqliteSink};
use herakles_perf_monitor::source::{
    MemorySource, ProcessSource, ProcfsMemorySource, ProcfsProcessSource, TestDataSource,
};
use herakles_perf_monitor::{Config, HealthStats, MonitorError, Orchestrator};
use prometheus::{Gauge, Registry};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;

mod cli;
mod commands;
mod handlers;
mod metrics;
mod state;

use cli::{Args, Commands, ConfigFormat, LogLevel};
use handlers::{doc_handler, health_handler, metrics_handler, status_handler};
use metrics::{MonitorMetrics, PrometheusDisplay};
use state::AppState;

/// Builds the effective configuration: file (unless --no-config), then CLI
/// overrides.
fn resolve_config(args: &Args) -> Result<Config, MonitorError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // A CLI threshold replaces the shared value and any per-metric override
    if let Some(threshold) = args.threshold {
        config.threshold_percent = Some(threshold);
        config.cpu_threshold_percent = None;
        config.ram_threshold_percent = None;
    }
    if let Some(interval) = args.interval {
        config.tick_interval_seconds = Some(interval);
    }
    if let Some(n) = args.top_n {
        config.top_n = Some(n);
    }
    if let Some(name) = &args.device_name {
        config.device_name = Some(name.clone());
    }
    if let Some(path) = &args.database {
        config.database_path = Some(path.clone());
    }

    // Feature flags
    if args.dry_run {
        config.dry_run = Some(true);
    }
    if args.console {
        config.enable_console = Some(true);
    }
    if args.disable_http {
        config.enable_http = Some(false);
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(log_level_name(level).to_string());
    }

    Ok(config)
}

fn log_level_name(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Off => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = commands::config::render_config(config, format, false)?;
    println!("{output}");
    Ok(())
}

fn setup_logging(config: &Config) {
    let log_level = match config.log_level.as_deref().unwrap_or("info") {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", log_level);
}

/// Resolves config and exits with code 1 when it does not validate.
fn resolve_valid_config(args: &Args) -> Config {
    let config = match resolve_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    config
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Logs how the sampling task ended. Returns false when it panicked, failed
/// to close the sink, or stopped without being asked to.
fn check_sampling_end(
    result: Result<Result<(), MonitorError>, JoinError>,
    stop_requested: bool,
) -> bool {
    match result {
        Ok(Ok(())) if stop_requested => {
            debug!("Sampling loop finished");
            true
        }
        Ok(Ok(())) => {
            error!("Sampling loop stopped unexpectedly");
            false
        }
        Ok(Err(e)) => {
            error!("Failed to close event store: {}", e);
            false
        }
        Err(e) => {
            error!("Sampling task failed: {}", e);
            false
        }
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = resolve_valid_config(&args);
        setup_logging(&config);

        return match command {
            Commands::Check {
                proc,
                database,
                all,
            } => commands::command_check(*proc, *database, *all, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => commands::command_config(output.clone(), format.clone(), *commented),
            Commands::Sample {
                iterations,
                verbose,
            } => commands::command_sample(
                *iterations,
                *verbose,
                &config,
                args.test_data_file.as_deref(),
            ),
            Commands::Export { format, limit } => {
                Ok(commands::command_export(format.clone(), *limit, &config)?)
            }
            Commands::GenerateTestdata {
                output,
                frames,
                processes,
                logical_cores,
            } => Ok(commands::command_generate_testdata(
                output.clone(),
                *frames,
                *processes,
                *logical_cores,
            )?),
        };
    }

    // Load configuration for main monitor mode
    let config = resolve_valid_config(&args);
    setup_logging(&config);

    info!("Starting herakles-perf-monitor");

    let settings = config.monitor_settings();

    let http_addr = if config.enable_http.unwrap_or(true) {
        let bind_ip: IpAddr = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).parse()?;
        Some(SocketAddr::new(bind_ip, config.port.unwrap_or(DEFAULT_PORT)))
    } else {
        None
    };

    // Open the event store before sampling anything; failing here is fatal.
    let sink: Box<dyn EventSink> = if config.dry_run.unwrap_or(false) {
        warn!("Dry run: events are kept in memory and discarded at exit");
        Box::new(MemorySink::new())
    } else {
        let path = config.database_path();
        match SqliteSink::open(&path, config.sink_busy_timeout()) {
            Ok(sink) => Box::new(sink) as Box<dyn EventSink>,
            Err(e) => {
                error!("Cannot start without event store: {}", e);
                return Err(e.into());
            }
        }
    };

    // Pick sample sources
    let (processes, memory): (Box<dyn ProcessSource>, Box<dyn MemorySource>) =
        match &args.test_data_file {
            Some(path) => {
                info!("Replaying test data from {}", path.display());
                let source = Arc::new(TestDataSource::from_file(path)?);
                (
                    Box::new(source.clone()) as Box<dyn ProcessSource>,
                    Box::new(source) as Box<dyn MemorySource>,
                )
            }
            None => (
                Box::new(ProcfsProcessSource::default()) as Box<dyn ProcessSource>,
                Box::new(ProcfsMemorySource) as Box<dyn MemorySource>,
            ),
        };

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = MonitorMetrics::new(&registry)?;
    let scrape_duration = Gauge::new(
        "herakles_perf_scrape_duration_seconds",
        "Time spent serving /metrics request",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;
    debug!("All metrics registered successfully");

    let health_stats = Arc::new(HealthStats::new());
    let latest_frame = Arc::new(RwLock::new(None));

    let mut orchestrator = Orchestrator::new(settings.clone(), processes, memory, sink)
        .with_stats(health_stats.clone())
        .with_display(Box::new(LogDisplay))
        .with_display(Box::new(PrometheusDisplay::new(
            metrics.clone(),
            latest_frame.clone(),
        )));
    if config.enable_console.unwrap_or(false) {
        orchestrator = orchestrator.with_display(Box::new(ConsoleDisplay::stdout()));
    }

    let state = Arc::new(AppState {
        registry,
        metrics,
        scrape_duration,
        settings,
        health_stats,
        latest_frame,
    });

    // Bind before the loop starts so a bind failure leaves nothing running
    let server = if let Some(addr) = http_addr {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/doc", get(doc_handler))
            .with_state(state.clone());

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind {}: {}", addr, e);
                if let Err(close_err) = orchestrator.close() {
                    error!("Failed to close event store: {}", close_err);
                }
                return Err(e.into());
            }
        };
        info!("herakles-perf-monitor listening on http://{}", addr);
        Some((listener, app))
    } else {
        info!("HTTP server disabled");
        None
    };

    // Start the sampling loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sampling_task = tokio::spawn(orchestrator.run(shutdown_rx));

    let serve = async move {
        match server {
            Some((listener, app)) => axum::serve(listener, app).await,
            None => std::future::pending().await,
        }
    };

    let mut server_error = None;
    let mut loop_result = None;
    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                server_error = Some(e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
        result = &mut sampling_task => {
            loop_result = Some(result);
        }
    }

    let stop_requested = loop_result.is_none();
    let loop_result = match loop_result {
        Some(result) => result,
        None => {
            // Let the current tick finish, then close the sink
            let _ = shutdown_tx.send(true);
            sampling_task.await
        }
    };
    let sampling_ok = check_sampling_end(loop_result, stop_requested);

    if let Some(e) = server_error {
        return Err(e.into());
    }
    if !sampling_ok {
        // A server without a sampling loop would keep reporting a stale frame
        std::process::exit(1);
    }

    info!("herakles-perf-monitor stopped gracefully");
    Ok(())
}
