//! vsmq – the vector store service.
//!
//!   $ vsmq --config vsmq.toml
//!
//! Drains the work queue on a `vsmq-broker`, runs each request against the
//! in-memory vector store and publishes the responses.
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use vsmq::config::Config;
use vsmq::core::TcpConnector;
use vsmq::logging::init_logging;
use vsmq::store::{MemoryVectorStore, VectorStore};
use vsmq::util::shutdown_signal;
use vsmq::VectorStoreService;

#[derive(Debug, Parser)]
#[command(name = "vsmq", version, about = "Vector store service over a message queue")]
struct Cli {
    /// Path to config TOML (env VSMQ_CONFIG is used when absent)
    #[arg(short, long)]
    config: Option<String>,
}

async fn run(config: Config) -> anyhow::Result<()> {
    let connector = TcpConnector::new(config.queue.addr.clone())
        .with_max_frame_bytes(config.broker.max_frame_bytes);
    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new(config.store.embedding_dimensions));

    let service = VectorStoreService::start(&connector, &config, store).await?;
    info!(queue_addr = %config.queue.addr, "Vector store service running");

    shutdown_signal().await;
    service.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let config: Config = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[FATAL] Failed to load config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "Service failed");
        eprintln!("[FATAL] Service crashed: {e:#}");
        process::exit(1);
    }
}
