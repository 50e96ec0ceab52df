use anyhow::{Context, Result};
use clap::Parser;
use obra_assist::{config, create_router, AppState, AssistantClient, Config, Ledger, VoiceAssistant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Voice-first project manager for a painting contractor
#[derive(Parser)]
#[command(name = "obra-assist")]
#[command(about = "Voice assistant and project ledger for painting jobs", long_about = None)]
struct Cli {
    /// Configuration file path (without extension)
    #[arg(short, long, default_value = "config/obra-assist")]
    config: String,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut cfg = Config::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let api_key = config::gemini_api_key();
    if api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; voice and assistant features are disabled");
    }

    let ledger = Ledger::load(&cfg.store.data_path)?;
    let voice = VoiceAssistant::from_config(cfg.voice.clone(), api_key.clone());
    let assistant = api_key.map(|key| AssistantClient::new(&cfg.assistant, key));

    let state = AppState::new(ledger, voice, assistant);
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
