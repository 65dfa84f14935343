//! HTTP server entry point.

use clap::Parser;
use datadock::api::{self, AppState};
use datadock::config::Config;
use datadock::fetch::HttpSourceFetcher;
use datadock::llm::OpenAiClient;
use datadock::warehouse::EmbeddedWarehouse;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "datadock-server", about = "Tabular ingestion and NL query service")]
struct Args {
    /// Address to bind, e.g. 0.0.0.0:8080 (overrides DATADOCK_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Warehouse data directory (overrides DATADOCK_DATA_DIR)
    #[arg(long)]
    data_dir: Option<String>,

    /// Upload staging directory (overrides DATADOCK_UPLOAD_DIR)
    #[arg(long)]
    upload_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir.into();
    }
    if let Some(dir) = args.upload_dir {
        config.upload_dir = dir.into();
    }

    let fetcher = HttpSourceFetcher::new(&config.fetch)?;
    let state = AppState {
        warehouse: Arc::new(EmbeddedWarehouse::new(config.data_dir.clone())),
        llm: Arc::new(OpenAiClient::new(&config.llm)),
        fetcher: Arc::new(fetcher),
        config: Arc::new(config),
    };

    let bind_addr = state.config.bind_addr.clone();
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
