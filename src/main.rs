use prompthub::AppState;
use prompthub_core::{CoreConfig, FileStore, KeyValueStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the PromptHub server.
///
/// # Environment Variables
/// - `PROMPTHUB_ADDR`: listen address (default: "0.0.0.0:8787")
/// - `PROMPT_DATA_DIR`: directory for prompt and tag storage (default: "/prompt_data")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prompthub=info".parse()?)
                .add_directive("prompthub_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("PROMPTHUB_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".into());
    let data_dir = std::env::var("PROMPT_DATA_DIR").unwrap_or_else(|_| "/prompt_data".into());

    tracing::info!("++ Starting PromptHub on {}", addr);
    tracing::info!("++ Prompt data dir: {}", data_dir);

    let cfg = Arc::new(CoreConfig::new(PathBuf::from(data_dir)));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(cfg));
    let app = prompthub::app(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
