use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use offload::config::WorkerConfig;
use offload::dispatch::{Dispatcher, HandlerDeps};
use offload::exporter::FileExporter;
use offload::notify::LogNotifier;
use offload::push::HttpPushGateway;
use offload::queue::{JobQueue, MemoryQueue};
use offload::retry::RetryCoordinator;
use offload::store::{Database, LibSqlBackend};
use offload::worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, optionally teeing into a rolling daily log file.
    // The appender guard must stay alive for the process lifetime.
    let _log_guard = match std::env::var("OFFLOAD_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "offload.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_target(false)
                .init();
            None
        }
    };

    // Configuration from environment, falling back to defaults.
    let mut config = WorkerConfig::default();
    if let Ok(v) = std::env::var("OFFLOAD_BATCH_SIZE") {
        if let Ok(v) = v.parse() {
            config.batch_size = v;
        }
    }
    if let Ok(v) = std::env::var("OFFLOAD_TIME_BUDGET_SECS") {
        if let Ok(v) = v.parse() {
            config.batch_time_budget = Duration::from_secs(v);
        }
    }
    if let Ok(v) = std::env::var("OFFLOAD_MAX_PUSH_ATTEMPTS") {
        if let Ok(v) = v.parse() {
            config.max_push_attempts = v;
        }
    }
    if let Ok(v) = std::env::var("OFFLOAD_EXPORT_DIR") {
        config.export_dir = PathBuf::from(v);
    }

    let db_path =
        std::env::var("OFFLOAD_DB_PATH").unwrap_or_else(|_| "./data/offload.db".to_string());
    let push_url = std::env::var("OFFLOAD_PUSH_URL")
        .unwrap_or_else(|_| "http://localhost:9090".to_string());

    eprintln!("⚙️  Offload worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", db_path);
    eprintln!("   Push gateway: {}", push_url);
    eprintln!(
        "   Batch: {} records / {}s budget",
        config.batch_size,
        config.batch_time_budget.as_secs()
    );

    // ── Store ───────────────────────────────────────────────────────────
    let store: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open database at {db_path}: {e}"))?,
    );

    // ── Queue & dispatch ────────────────────────────────────────────────
    let queue = MemoryQueue::new();
    let queue_dyn: Arc<dyn JobQueue> = queue.clone();
    let retry = Arc::new(RetryCoordinator::new(
        queue_dyn.clone(),
        config.max_push_attempts,
    ));

    let deps = HandlerDeps {
        store: store.clone(),
        queue: queue_dyn,
        retry,
        notifier: Arc::new(LogNotifier),
        exporter: Arc::new(FileExporter::new(store.clone(), config.export_dir.clone())),
        push: Arc::new(HttpPushGateway::new(push_url)),
        config,
    };
    let dispatcher = Arc::new(Dispatcher::new(deps));

    let worker_handle = worker::spawn(queue, dispatcher);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    worker_handle.abort();

    Ok(())
}
