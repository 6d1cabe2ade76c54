//! vsmq-broker – the queue service.
//
//  $ vsmq-broker --config vsmq.toml
//  $ vsmq-broker --addr 0.0.0.0:7379
use clap::Parser;
use tracing::info;

use vsmq::config::Config;
use vsmq::logging::init_logging;
use vsmq::start_broker;
use vsmq::util::cancel_on_signal;

#[derive(Debug, Parser)]
#[command(name = "vsmq-broker", version, about = "vsmq queue service")]
struct Cli {
    /// Path to config TOML (env VSMQ_CONFIG is used when absent)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address; overrides `broker.bind_addr`
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(addr) = cli.addr {
        config.broker.bind_addr = addr;
    }

    let shutdown = cancel_on_signal();
    info!(bind_addr = %config.broker.bind_addr, "Starting vsmq broker");
    start_broker(&config.broker.bind_addr, shutdown, config.broker.max_frame_bytes).await
}
