// Main entry point for the featured image service

use std::sync::Arc;

use anyhow::{Context, Result};
use featured_image::kernel::{
    DiagnosticLog, GeminiImageGenerator, GenerationQueue, GenerationWorker, LocalMediaStore,
    MemoryPostStore, NonceService, ServerDeps,
};
use featured_image::server::{build_app, AppState};
use featured_image::{Config, Settings, SettingsStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (also reads .env) before logging so the diagnostic
    // layer can see the debug setting.
    let config = Config::from_env().context("Failed to load configuration")?;
    let settings = Arc::new(SettingsStore::new(Settings::from_env()));
    let diagnostic_log = Arc::new(DiagnosticLog::new(config.log_file(), settings.clone()));

    // Initialize logging. RUST_LOG only filters the console; the diagnostic
    // file follows the `debug` setting.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,featured_image=debug,gemini_client=debug".into());
    let (diagnostic_layer, _diagnostic_guard) = diagnostic_log.layer();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(diagnostic_layer)
        .init();

    tracing::info!("Starting featured image service");
    tracing::info!(config = ?config, "Configuration loaded");

    let post_store = MemoryPostStore::open(config.posts_file(), config.admin_operators.clone())
        .await
        .context("Failed to open post store")?;
    let media_store = LocalMediaStore::new(config.media_dir());
    let image_generator =
        GeminiImageGenerator::new(config.gemini_base_url.clone(), config.gemini_timeout);
    let (queue, receiver) = GenerationQueue::new();

    let deps = ServerDeps::new(
        Arc::new(post_store),
        Arc::new(media_store),
        Arc::new(image_generator),
        settings,
        Arc::new(queue),
    );

    // Start the generation worker
    let shutdown = CancellationToken::new();
    let worker = GenerationWorker::new(deps.clone(), receiver);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let app = build_app(AppState {
        deps,
        nonces: Arc::new(NonceService::new(config.nonce_secret.clone())),
        diagnostic_log,
        operator_tokens: Arc::new(config.operator_tokens.clone()),
        admin_operators: Arc::new(config.admin_operators.clone()),
        webhook_secret: config.webhook_secret.clone(),
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
            signal.cancel();
        })
        .await
        .context("Server error")?;

    // In-flight runs finish before exit
    shutdown.cancel();
    worker_handle
        .await
        .context("Generation worker panicked")?
        .context("Generation worker failed")?;

    Ok(())
}
