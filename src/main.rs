use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use lookout::config::Config;
use lookout::detectors::warmup::load_detectors;
use lookout::moderation::aggregate::SignalAggregator;
use lookout::moderation::orchestrator::Orchestrator;
use lookout::moderation::policy::PolicyEngine;
use lookout::moderation::service::ModerationService;

/// Lookout: fail-closed image moderation.
///
/// Decides whether an image may be published by combining violence, weapon
/// and explicit-content detectors. Anything uncertain is rejected.
#[derive(Parser)]
#[command(name = "lookout", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the moderation HTTP API (models load in the background)
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on (default: 5000)
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Moderate a local image with in-process models
    Analyze {
        /// Path to the image file
        image: PathBuf,

        /// Print the decision as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Moderate an image through a running `lookout serve`
    Check {
        /// Path to the image file
        image: PathBuf,

        /// Server base URL (default: LOOKOUT_SERVER_URL or http://localhost:5000)
        #[arg(long)]
        server: Option<String>,

        /// Readiness polls before giving up, 2s apart (default: 30)
        #[arg(long, default_value = "30")]
        wait: u32,
    },

    /// Show installed models and the active policy thresholds
    Status,

    /// Download the hosted ONNX models
    DownloadModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lookout=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            if !lookout::detectors::download::model_presence(&config.model_dir).any() {
                tracing::warn!(
                    model_dir = %config.model_dir.display(),
                    "No models on disk; every request will fail closed. Run `lookout download-model`."
                );
            }

            let orchestrator = Orchestrator::new(Default::default(), config.detector_timeout);
            let service = build_service(&config, orchestrator.clone());
            lookout::detectors::warmup::launch_warmup(config.model_dir.clone(), orchestrator);

            lookout::web::run_server(config, service, port, &bind).await?;
        }

        Commands::Analyze { image, json } => {
            let config = Config::load()?;
            config.require_models()?;

            let model_dir = config.model_dir.clone();
            let set = tokio::task::spawn_blocking(move || load_detectors(&model_dir))
                .await
                .context("Model loading panicked")?;
            info!(loaded = set.loaded, configured = set.detectors.len(), "Detectors ready");

            let orchestrator = Orchestrator::with_detectors(set.detectors, config.detector_timeout);
            let service = build_service(&config, orchestrator);
            let report = service.moderate(&image).await;

            if json {
                let out = serde_json::json!({
                    "image": image.display().to_string(),
                    "decision": report.decision,
                    "characteristics": report.characteristics,
                    "elapsed_ms": report.elapsed.as_millis() as u64,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                lookout::output::terminal::display_report(
                    &image.display().to_string(),
                    &report,
                    &config.thresholds,
                );
            }

            if !report.decision.is_admitted {
                std::process::exit(1);
            }
        }

        Commands::Check {
            image,
            server,
            wait,
        } => {
            let config = Config::load()?;
            let url = server.unwrap_or(config.server_url);
            let client = lookout::client::ModerationClient::new(&url)?;

            println!("Waiting for {url}...");
            let result = if client.wait_for_ready(wait).await {
                client.analyze(&image).await
            } else {
                lookout::client::AnalysisResult::fail_closed("moderation server not ready")
            };

            lookout::output::terminal::display_remote_result(&image.display().to_string(), &result);

            if !result.es_apto {
                std::process::exit(1);
            }
        }

        Commands::Status => {
            let config = Config::load()?;
            lookout::status::show(&config);
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX models...");
            println!("  Destination: {}", model_dir.display());

            lookout::detectors::download::download_models(model_dir).await?;

            println!("\n{}", "Models downloaded successfully.".bold());
            println!("You can now run `lookout analyze <image>` or `lookout serve`.");
        }
    }

    Ok(())
}

/// Compose the moderation pipeline from config.
fn build_service(config: &Config, orchestrator: Orchestrator) -> ModerationService {
    ModerationService::new(
        orchestrator,
        SignalAggregator::new(config.noise_floors.clone()),
        PolicyEngine::new(config.thresholds.clone()),
    )
}
