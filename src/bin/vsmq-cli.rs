//! CLI client for the vector store service.
//!
//! Sends one request through the queue service, waits for the correlated
//! response and prints it as JSON.

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use vsmq::client::{ResponseWaiter, VectorStoreClient};
use vsmq::config::Config;
use vsmq::core::{Message, Response, TcpConnector};

/// Command-line interface for vsmq.
#[derive(Debug, Parser)]
#[command(name = "vsmq-cli", version, about = "vsmq CLI: send vector store requests")]
pub struct Cli {
    /// Address of the queue service; overrides `queue.addr`
    #[arg(short, long)]
    pub addr: Option<String>,

    /// How long to wait for the response, in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Path to config TOML (env VSMQ_CONFIG is used when absent)
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a collection
    Create {
        collection: String,
    },

    /// Add documents given as KEY=TEXT pairs
    Add {
        collection: String,
        #[arg(required = true, value_parser = parse_pair)]
        items: Vec<(String, String)>,
    },

    /// Search a collection
    Search {
        collection: String,
        query: String,
        #[arg(short, long)]
        n_results: Option<usize>,
    },

    /// Delete a collection
    Delete {
        collection: String,
    },

    /// List collections
    List,

    /// Check whether a collection exists
    Exists {
        collection: String,
    },

    /// Send a raw JSON message
    Send {
        /// JSON object, e.g. '{"action":"list_collections"}'
        json: String,
    },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=TEXT, got `{s}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(addr) = cli.addr {
        config.queue.addr = addr;
    }
    let timeout = cli
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.queue.response_timeout());

    let connector = TcpConnector::new(config.queue.addr.clone())
        .with_max_frame_bytes(config.broker.max_frame_bytes);
    let waiter = ResponseWaiter::connect(&connector, &config.queue.work_queue, &config.queue.response_queue)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", config.queue.addr, e))?
        .with_poll_timeout(config.queue.poll_timeout());
    let client = VectorStoreClient::new(waiter, timeout);

    let response: Response = match cli.command {
        Command::Create { collection } => client.create_collection(&collection).await?,
        Command::Add { collection, items } => client.add_data(&collection, items).await?,
        Command::Search {
            collection,
            query,
            n_results,
        } => client.search(&collection, &query, n_results).await?,
        Command::Delete { collection } => client.delete_collection(&collection).await?,
        Command::List => client.list_collections().await?,
        Command::Exists { collection } => client.collection_exists(&collection).await?,
        Command::Send { json } => {
            let message: Message = match serde_json::from_str::<Value>(&json)? {
                Value::Object(message) => message,
                _ => anyhow::bail!("message must be a JSON object"),
            };
            client.send(message).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        std::process::exit(2);
    }
    Ok(())
}
