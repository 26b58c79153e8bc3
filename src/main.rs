use anyhow::Result;
use clap::Parser;
use deepspeak_voice::http::{create_router, AppState};
use deepspeak_voice::{ApiClient, Config, Platform};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "deepspeak-voice", about = "Voice capture and transcription orchestrator")]
struct Args {
    /// Config file base name (without extension)
    #[arg(long, default_value = "config/deepspeak-voice")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config {} not loaded ({}); using defaults", args.config, e);
            Config::default()
        }
    };

    info!("DeepSpeak Voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Backend API: {}", cfg.api.base_url);

    let platform = Platform::loopback();
    let api = Arc::new(ApiClient::new(&cfg.api));

    let bind = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(cfg, platform, api);
    let router = create_router(state);

    info!("HTTP server listening on {}", bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
