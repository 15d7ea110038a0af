//! HTTP front end for tts-audiobook.
//!
//! ```text
//! tts-audiobook-server --engine-cmd piper \
//!     --engine-arg --model --engine-arg '{voice}.onnx' \
//!     --engine-arg --output_file --engine-arg -
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tts_audiobook::{
    server::{create_router, spawn_sweeper, AppState},
    version_string, AudiobookConfig, AudiobookService, CommandEngine, JsonSettingsStore,
};

#[derive(Debug, Parser)]
#[command(name = "tts-audiobook-server", version, about = "Long-form text to audiobook WAV over HTTP")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// JSON pipeline config; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON settings file holding the output folder.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// TTS program run once per chunk (text on stdin, WAV on stdout).
    #[arg(long)]
    engine_cmd: PathBuf,

    /// Argument for the TTS program; `{voice}` and `{speed}` are substituted.
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tts_audiobook=debug,tower_http=debug"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tts-audiobook").join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = match &args.config {
        Some(path) => AudiobookConfig::from_file(path)?,
        None => AudiobookConfig::default(),
    };
    let settings = JsonSettingsStore::new(args.settings.clone().unwrap_or_else(default_settings_path));

    let engine = CommandEngine::new(args.engine_cmd.clone(), args.engine_args.clone())
        .with_sample_rate(config.sample_rate);
    let sweep_every = config.sweep_interval();
    let service = Arc::new(
        AudiobookService::from_settings(Arc::new(engine), &settings, config)
            .context("Failed to initialise audiobook service")?,
    );

    spawn_sweeper(Arc::clone(&service), sweep_every);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        version = %version_string(),
        engine = %args.engine_cmd.display(),
        output_dir = %service.output_dir().display(),
        settings = %settings.path().display(),
        "tts-audiobook server listening"
    );

    let app = create_router(AppState { service });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}
