use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{config::load_settings_from, load_settings, TutorialBackend, WorkflowController};
use desktop::{run_tutorial, LocalBackend, LocalBackendConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Runs the draw, train, review and predict tutorial against a local backend")]
struct Args {
    /// Directory that receives the `drawings/` folder.
    #[arg(long, default_value = "tutorial-data")]
    data_dir: PathBuf,
    /// Settings file; defaults to `tutorial.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 2_000)]
    train_duration_ms: u64,
    /// Make the simulated training run report an error.
    #[arg(long)]
    fail_training: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path, |key| std::env::var(key).ok())?,
        None => load_settings()?,
    };
    let train_duration = Duration::from_millis(args.train_duration_ms);
    let backend = Arc::new(LocalBackend::new(
        LocalBackendConfig {
            data_dir: args.data_dir.clone(),
            train_duration,
            fail_training: args.fail_training,
        },
        settings.label_catalog()?,
    ));
    info!(dir = %backend.drawings_dir().display(), "local backend ready");

    let backend: Arc<dyn TutorialBackend> = backend;
    let controller = WorkflowController::new(backend, settings)?;

    let outcome = run_tutorial(&controller, train_duration * 4 + Duration::from_secs(5)).await;
    let view = controller.snapshot().await;
    controller.shutdown().await;
    info!(
        view = %serde_json::to_string(&view).context("failed to encode workflow view")?,
        "tutorial finished"
    );

    if let Err(err) = &outcome {
        error!("tutorial stopped early: {err:#}");
    }
    outcome.map(|_| ())
}
