mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use mediabridge_core::{logging, Config};

use server::MediaBridgeServer;

#[derive(Parser, Debug)]
#[command(name = "mediabridge")]
#[command(about = "WebRTC SFU signaling server", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, env = "MEDIABRIDGE_CONFIG")]
    config: Option<String>,

    /// HTTP listen host (overrides the config file)
    #[arg(long, env = "MEDIABRIDGE_HOST")]
    host: Option<String>,

    /// HTTP listen port (overrides the config file)
    #[arg(long, env = "MEDIABRIDGE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("MediaBridge server starting...");
    info!("HTTP address: {}", config.server.address());
    info!(
        "Router codecs: {}",
        config
            .router
            .codecs
            .iter()
            .map(|c| c.mime_type.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // 3. Build the signaling service and serve
    let server = MediaBridgeServer::new(config);
    server.start().await
}
