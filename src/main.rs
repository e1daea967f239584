use clap::Parser;
use dotenvy::dotenv;
use estate_media::config::{ServerConfig, StorageConfig, UploadConfig};
use estate_media::infrastructure::storage;
use estate_media::services::media_service::MediaService;
use estate_media::services::staging::StagingArea;
use estate_media::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "estate_media=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Estate Media...");

    let upload_config = UploadConfig::from_env();
    let storage_config = StorageConfig::from_env()?;
    let mut server_config = ServerConfig::from_env();
    if let Some(port) = args.port {
        server_config.port = port;
    }

    info!(
        "🛡️  Upload Config: Max Size={}MB, Max Files={}, Staging={}",
        upload_config.max_file_size / 1024 / 1024,
        upload_config.max_files,
        upload_config.staging_dir.display()
    );

    StagingArea::new(&upload_config.staging_dir)
        .ensure_dir()
        .await?;

    let store = storage::setup_storage(&storage_config).await?;
    let media = Arc::new(MediaService::new(store));

    let state = AppState {
        media,
        config: upload_config,
        storage: storage_config,
    };

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
