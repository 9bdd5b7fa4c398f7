//! ob - Offload breakdown CLI
//!
//! CLI entry point for generating breakdowns and reconciling usage.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use offload_breakdown::backend::{AiBackendClient, ClientIdentity, NetworkAiBackendClient};
use offload_breakdown::cli::{Cli, Command, OutputFormat};
use offload_breakdown::config::Config;
use offload_breakdown::consent::InMemoryConsentStore;
use offload_breakdown::generator::SentenceSplitGenerator;
use offload_breakdown::service::BreakdownService;
use offload_breakdown::session::InMemorySessionTokenStore;
use offload_breakdown::transport::HttpTransport;
use offload_breakdown::types::{BreakdownResult, BreakdownStep};
use offload_breakdown::usage::{FileUsageCounterStore, UsageCounterStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("offload")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("ob.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

/// Wired-up collaborators for one CLI invocation
struct App {
    client: Arc<NetworkAiBackendClient>,
    usage: Arc<FileUsageCounterStore>,
    service: BreakdownService,
}

impl App {
    fn build(config: &Config, cloud_override: Option<bool>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let install_id = config.resolve_install_id()?;
        let identity = ClientIdentity::new(&install_id, env!("CARGO_PKG_VERSION"), &config.backend.platform);

        let transport = HttpTransport::new(&config.backend.base_url, Duration::from_millis(config.backend.timeout_ms))
            .context("Failed to create HTTP transport")?;
        info!(base_url = %transport.base_url(), "App::build: backend transport ready");
        let cloud_ai_enabled = cloud_override.unwrap_or(config.cloud_ai_enabled);
        let consent = Arc::new(InMemoryConsentStore::new(cloud_ai_enabled));
        let usage = Arc::new(
            FileUsageCounterStore::open(config.storage.usage_path()).context("Failed to open usage counters")?,
        );

        let client = Arc::new(NetworkAiBackendClient::new(
            Arc::new(transport),
            Arc::new(InMemorySessionTokenStore::new()),
            consent.clone(),
            identity,
        ));
        let service = BreakdownService::new(
            client.clone(),
            consent,
            usage.clone(),
            Arc::new(SentenceSplitGenerator),
            install_id,
        );

        debug!(%cloud_ai_enabled, "App::build: ready");
        Ok(Self { client, usage, service })
    }
}

fn print_steps(steps: &[BreakdownStep], depth: usize) {
    for step in steps {
        println!("{}- {}", "  ".repeat(depth), step.title);
        print_steps(&step.substeps, depth + 1);
    }
}

fn print_result(result: &BreakdownResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            let source = result.source.to_string();
            println!("{} {}", "source:".bold(), source.cyan());
            if let Some(usage) = result.usage {
                println!(
                    "{} {} in / {} out",
                    "tokens:".bold(),
                    usage.input_tokens,
                    usage.output_tokens
                );
            }
            let total: usize = result.steps.iter().map(BreakdownStep::count).sum();
            println!("{} {}", "steps:".bold(), total);
            print_steps(&result.steps, 0);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!(
        "ob loaded config: base_url={}, cloud_ai_enabled={}",
        config.backend.base_url, config.cloud_ai_enabled
    );

    let app = App::build(&config, cli.command.cloud_override())?;

    // Dispatch command
    match cli.command {
        Command::Breakdown {
            text,
            granularity,
            hints,
            templates,
            format,
            ..
        } => {
            let result = app
                .service
                .generate_breakdown(&text, granularity, &hints, &templates)
                .await
                .context("Breakdown failed")?;
            print_result(&result, &format)
        }
        Command::Reconcile { feature, format } => {
            let response = app
                .service
                .reconcile_usage(&feature)
                .await
                .context("Usage reconciliation failed")?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Text => {
                    println!("{} {}", "feature:".bold(), feature);
                    println!("{} {}", "server count:".bold(), response.server_count);
                    println!("{} {}", "remaining:".bold(), response.effective_remaining);
                    println!("{} {}", "merged count:".bold(), app.usage.merged_count(&feature));
                }
            }
            Ok(())
        }
        Command::Session => {
            let identity = app.client.identity().clone();
            let response = app
                .client
                .create_anonymous_session(identity.session_request())
                .await
                .context("Session creation failed")?;
            println!("{} {}", "session expires:".bold(), response.expires_at.to_rfc3339());
            Ok(())
        }
        Command::Usage { feature } => {
            println!("{} {}", "feature:".bold(), feature);
            println!("local:  {}", app.usage.local_count(&feature));
            println!("server: {}", app.usage.server_count(&feature));
            println!("merged: {}", app.usage.merged_count(&feature));
            println!("{} {}", "file:".bold(), app.usage.path().display());
            Ok(())
        }
        Command::Health => {
            let health = app.client.health().await.context("Health check failed")?;
            println!(
                "{} {} ({} {}, {})",
                "status:".bold(),
                health.status.green(),
                health.service,
                health.version,
                health.environment
            );
            Ok(())
        }
    }
}
