//! routeopt - last-mile route optimization service
//!
//! Serves `POST /optimize` over HTTP, or runs a single request from a file.

mod cli;
mod config;
mod defaults;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::cli::{Cli, Command};
use crate::config::{Config, LogFormat};
use crate::handlers::AppState;
use crate::services::optimizer::RouteOptimizer;
use crate::types::OptimizationRequest;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    let config = Config::from_env()?;

    // stdout carries the result of a one-off optimization
    let log_to_stderr = matches!(command, Command::Optimize { .. });
    let _guard = init_logging(&config, log_to_stderr);

    match command {
        Command::Serve => serve(config).await,
        Command::Optimize { input, pretty } => optimize_file(&config, &input, pretty).await,
    }
}

/// Console plus daily-rotated file logging
fn init_logging(config: &Config, log_to_stderr: bool) -> WorkerGuard {
    std::fs::create_dir_all(&config.logs_dir).ok();

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.logs_dir, "routeopt.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let writer = if log_to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    let console = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,routeopt=debug".into()),
        ))
        .with(console)
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting routeopt v{}...", env!("CARGO_PKG_VERSION"));

    let optimizer = RouteOptimizer::from_config(&config).context("failed to initialize optimizer")?;
    info!(
        "Pipeline ready: geocoder={}, routing={}, solver={}",
        optimizer.resolver().backend_name(),
        optimizer.routing_name(),
        optimizer.solver_name()
    );

    let app = handlers::build_router(Arc::new(AppState::new(optimizer)), &config.allowed_origins);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("Listening on {} (CORS origins: {:?})", address, config.allowed_origins);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}

async fn optimize_file(config: &Config, input: &Path, pretty: bool) -> Result<()> {
    let raw = if input == Path::new("-") {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("failed to read request from stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read {}", input.display()))?
    };

    let request: OptimizationRequest = serde_json::from_str(&raw).context("invalid optimization request")?;
    let optimizer = RouteOptimizer::from_config(config).context("failed to initialize optimizer")?;

    let (output, outcome) = match optimizer.optimize(request).await {
        Ok(response) => (serde_json::to_value(&response)?, Ok(())),
        Err(e) => {
            let body = e.to_response();
            let code = body.code.as_str();
            (serde_json::to_value(&body)?, Err(anyhow::anyhow!("optimization failed: {}", code)))
        }
    };

    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);

    outcome
}
