// src/main.rs
use anyhow::{Context, Result};
use axum::http::StatusCode as AxumStatusCode;
use axum::response::{Html, IntoResponse};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use thiserror::Error;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod fiscal_calendar;
mod forecast_message;
mod loader;
mod render;
mod time_entries;
mod utilization;
mod web;

use config::Config;
use loader::{LoadError, ReportInputs};
use utilization::{ForecastMethod, UtilizationError};
use web::{AppState, ReportView};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),
    #[error("Failed to load report inputs: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Utilization(#[from] UtilizationError),
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': '{value}'")]
    InvalidParameter { name: &'static str, value: String },
    #[error("Target utilization must be between 0 and 100, got {0}")]
    InvalidTarget(u32),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        error!("Error occurred: {}", self);
        let (status_code, error_message) = match &self {
            AppError::Utilization(UtilizationError::MissingData { .. }) => {
                (AxumStatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Utilization(UtilizationError::InvalidMethod(_))
            | AppError::MissingParameter(_)
            | AppError::InvalidParameter { .. }
            | AppError::InvalidTarget(_) => (AxumStatusCode::BAD_REQUEST, self.to_string()),
            AppError::Utilization(UtilizationError::InvalidCapacity { .. }) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                format!("Fiscal calendar data is invalid: {}", self),
            ),
            AppError::Config(_) | AppError::TlsConfig(_) | AppError::InvalidAddress(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error.".to_string(),
            ),
            AppError::Load(_) | AppError::Io(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server data loading error. Check logs.".to_string(),
            ),
        };
        (
            status_code,
            Html(format!(
                "<h1>Error</h1><p>{}</p>",
                web::escape_html(&error_message)
            )),
        )
            .into_response()
    }
}

// --- Command Line ---

#[derive(Parser, Debug)]
#[command(name = "utilization", version, about = "Billable-hours utilization forecast")]
struct Cli {
    /// Time entry export (CSV), overrides UTILIZATION_HOURS_REPORT_PATH
    #[arg(long, global = true)]
    hours: Option<PathBuf>,
    /// Activity classification table (CSV)
    #[arg(long, global = true)]
    activities: Option<PathBuf>,
    /// Fiscal date table (CSV)
    #[arg(long, global = true)]
    dates: Option<PathBuf>,
    /// Employee roster (CSV)
    #[arg(long, global = true)]
    names: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the interactive report
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print one employee's utilization report
    Report {
        #[arg(long)]
        name: String,
        /// "Month to Date", "Last Month" or "Year to Date"
        #[arg(long, default_value = "Month to Date")]
        method: String,
        /// Target utilization in percent (0 = no target)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        target: Option<u32>,
        /// Also write the chart as SVG
        #[arg(long)]
        svg: Option<PathBuf>,
        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List employees in the roster
    Employees,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.hours {
            config.hours_report_path = path.clone();
        }
        if let Some(path) = &self.activities {
            config.activities_path = path.clone();
        }
        if let Some(path) = &self.dates {
            config.dates_path = path.clone();
        }
        if let Some(path) = &self.names {
            config.names_path = path.clone();
        }
        if let Command::Serve { host, port } = &self.command {
            if let Some(host) = host {
                config.server_host = host.clone();
            }
            if let Some(port) = port {
                config.server_port = *port;
            }
        }
    }
}

fn init_tracing(level: Level) -> Result<()> {
    // RUST_LOG wins over the configured level when present
    let result = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
        Err(_) => tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };
    result.context("Setting tracing subscriber failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().map_err(AppError::from)?;
    init_tracing(config.tracing_level())?;
    info!("Tracing subscriber initialized.");

    cli.apply_overrides(&mut config);
    if config.default_target > 100 {
        return Err(AppError::InvalidTarget(config.default_target).into());
    }

    let inputs = ReportInputs::load(&config.input_paths())
        .map_err(AppError::from)
        .context("Loading report inputs failed")?;

    match cli.command {
        Command::Serve { .. } => serve(&config, inputs).await,
        Command::Report {
            name,
            method,
            target,
            svg,
            json,
        } => {
            let method: ForecastMethod = method.parse().map_err(AppError::from)?;
            let target = target.unwrap_or(config.default_target);
            print_report(&inputs, &name, method, target, svg, json)
        }
        Command::Employees => {
            for name in inputs.roster.names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn print_report(
    inputs: &ReportInputs,
    name: &str,
    method: ForecastMethod,
    target: u32,
    svg: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let view = ReportView::build(inputs, name, method, target).map_err(AppError::from)?;

    if let Some(path) = svg {
        std::fs::write(&path, render::chart_svg(&view.report, target))
            .map_err(AppError::from)
            .with_context(|| format!("Writing chart to {}", path.display()))?;
        info!("Chart written to {}", path.display());
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("Serializing report failed")?
        );
        return Ok(());
    }

    println!(
        "Utilization report for {} ({}, current month {})\n",
        view.report.employee, view.report.method, view.report.current_month
    );
    print!("{}", render::text_table(&view.report));
    println!(
        "\nPredicted utilization: {}%",
        view.predicted_utilization.round_dp(1)
    );
    if !view.report.unclassified_activities.is_empty() {
        warn!(
            "Excluded unclassified activities: {}",
            view.report.unclassified_activities.join(", ")
        );
    }
    if let Some(text) = &view.message_text {
        println!("{}", text);
    }
    Ok(())
}

async fn serve(config: &Config, inputs: ReportInputs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .map_err(|e| AppError::InvalidAddress(format!("{}", e)))?;
    let app = web::router(AppState::new(inputs, config.default_target));
    info!("Application state initialized.");

    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = load_tls_config(cert_path, key_path).await?;
            info!("TLS configuration loaded.");
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!("Starting server on http://{}", addr);
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }
    }
    Ok(())
}

async fn load_tls_config(cert_path: &str, key_path: &str) -> Result<RustlsConfig, AppError> {
    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e)))
}
