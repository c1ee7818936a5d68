//! Clonebot - Entry Point
//!
//! Wires the store, bridge transport, transcriber and generation backends
//! into the reply engine and serves the bridge webhook.

use clonebot::custom_api::CustomApiClient;
use clonebot::engine::EngineDeps;
use clonebot::gemini::GeminiBackend;
use clonebot::transcription::WhisperServer;
use clonebot::{
    BridgeConfig, BridgeTransport, Config, ConversationStore, MemoryStore, RedisStore, ReplyEngine,
    ReplyGenerator, SystemClock, WebhookServer,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let json_logs = args.iter().any(|a| a == "--json-logs");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Clonebot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: clonebot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --json-logs        Log JSON to stderr");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  BRIDGE_ACCOUNT_ID      Account the automation speaks for (required)");
        println!("  BRIDGE_URL             Messaging sidecar (default: http://localhost:8081)");
        println!("  LISTEN_ADDR            Webhook address (default: 0.0.0.0:8090)");
        println!("  REDIS_URL              Conversation store (default: in-process)");
        println!("  TRANSCRIBE_URL         Whisper server (default: http://localhost:5000)");
        println!("  GOOGLE_API_KEY[_1..50] Gemini credentials, tried in order");
        println!("  GEMINI_MODEL           Model id (default: gemini-2.5-flash)");
        println!("  CUSTOM_API_URL         Keyless endpoint for model mode 2");
        println!("  COMMAND_PREFIX         Operator command prefix (default: .)");
        println!("  AUTOREPLY_*            Engine timing overrides");
        return Ok(());
    }

    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Clonebot v{}", env!("CARGO_PKG_VERSION"));
    let config = Config::from_env()?;

    let store: Arc<dyn ConversationStore> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis conversation store");
            Arc::new(RedisStore::connect(url).await?)
        }
        None => {
            warn!("REDIS_URL not set - conversation state is in-process and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let transport = Arc::new(BridgeTransport::new(BridgeConfig::new(
        &config.bridge_url,
        &config.account_id,
    ))?);
    let transcriber = Arc::new(WhisperServer::new(
        &config.transcribe_url,
        Duration::from_secs(60),
    )?);
    let backend = Arc::new(GeminiBackend::new(
        &config.gemini_model,
        config.generation_timeout,
    )?);

    info!(
        "{} generation credential(s), model {}",
        config.credentials.len(),
        config.gemini_model
    );
    let mut generator = ReplyGenerator::new(store.clone(), backend, config.credentials.clone());
    if let Some(url) = &config.custom_api_url {
        info!("Custom API available for model mode 2");
        generator = generator.with_custom_endpoint(Arc::new(CustomApiClient::new(
            url,
            config.generation_timeout,
        )?));
    }

    let engine = ReplyEngine::new(
        config.engine.clone(),
        EngineDeps {
            store,
            transport,
            transcriber,
            generator,
            clock: Arc::new(SystemClock),
        },
    );

    WebhookServer::new(config.listen_addr, engine).run().await
}
