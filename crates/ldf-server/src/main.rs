//! `ldf-server` binary: parses CLI/env config, opens the sqlite pool,
//! applies the embedded schema, wires `AppState`, and serves the router
//! alongside the download worker pool and rate-limit sweeper.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ldf_download::{spawn_worker_pool, JobRepo};
use ldf_server::state::AppState;
use ldf_storage::{LocalFsBackend, S3Backend, S3Config, StorageBackend};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::signal;

const SCHEMA: &str = include_str!("../migrations/schema.sql");

/// LDF control plane server.
#[derive(Parser, Debug)]
#[command(name = "ldf-server", version)]
struct Args {
    /// Path to the sqlite database file.
    #[arg(long, env = "LDF_DATABASE_PATH", default_value = "ldf.db")]
    database_path: PathBuf,

    /// Root directory for local object storage. Ignored when `--storage` is `s3`.
    #[arg(long, env = "LDF_STORAGE_PATH", default_value = "ldf-storage")]
    storage_path: PathBuf,

    /// `local` or `s3`.
    #[arg(long, env = "LDF_STORAGE_KIND", default_value = "local")]
    storage_kind: String,

    #[arg(long, env = "LDF_S3_ENDPOINT", default_value = "")]
    s3_endpoint: String,
    #[arg(long, env = "LDF_S3_BUCKET", default_value = "")]
    s3_bucket: String,
    #[arg(long, env = "LDF_S3_REGION", default_value = "")]
    s3_region: String,
    #[arg(long, env = "LDF_S3_ACCESS_KEY", default_value = "")]
    s3_access_key: String,
    #[arg(long, env = "LDF_S3_SECRET_KEY", default_value = "")]
    s3_secret_key: String,
    #[arg(long, env = "LDF_S3_PUBLIC_URL")]
    s3_public_url: Option<String>,

    /// Path to the persisted master key used for sensitive-setting encryption.
    #[arg(long, env = "LDF_MASTER_KEY_PATH", default_value = "ldf-master.key")]
    master_key_path: PathBuf,

    /// Bind address for the HTTP listener.
    #[arg(long, env = "LDF_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Number of concurrent download workers.
    #[arg(long, env = "LDF_DOWNLOAD_WORKERS", default_value_t = 4)]
    download_workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&format!("sqlite://{}?mode=rwc", args.database_path.display()))
        .await?;
    sqlx::query(SCHEMA).execute(&pool).await?;

    let storage: Arc<dyn StorageBackend> = if args.storage_kind == "s3" {
        Arc::new(S3Backend::new(S3Config {
            endpoint: args.s3_endpoint,
            bucket: args.s3_bucket,
            region: args.s3_region,
            access_key_id: args.s3_access_key,
            secret_access_key: args.s3_secret_key,
            public_base_url: args.s3_public_url,
        }))
    } else {
        Arc::new(LocalFsBackend::new(args.storage_path))
    };

    let master_key = ldf_settings::load_or_create_master_key(&args.master_key_path)?;

    let state = Arc::new(AppState::new(pool.clone(), storage.clone(), master_key));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = ldf_access::spawn_sweeper(state.rate_limiters.clone(), shutdown_rx.clone());

    let job_repo: Arc<dyn JobRepo> = state.job_repo.clone();
    let mut workers = spawn_worker_pool(
        job_repo,
        storage.clone(),
        state.http_client.clone(),
        state.cancellations.clone(),
        state.retry_config.clone(),
        args.download_workers,
    );

    let app = ldf_server::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(bind = %args.bind, "ldf-server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await.ok();
    workers.abort_all();
    while workers.join_next().await.is_some() {}

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
