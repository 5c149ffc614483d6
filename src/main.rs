//! rgs-core server binary

use clap::Parser;
use rgs_core::api::ApiServer;
use rgs_core::config::{ConfigLoader, StorageBackendKind};
use rgs_core::RgsFactory;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rgs-core")]
#[command(about = "Slot round settlement server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// API server host
    #[arg(long)]
    host: Option<String>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend: memory or rocksdb
    #[arg(long)]
    storage: Option<StorageBackendKind>,

    /// RocksDB data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rgs_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    // CLI flags win over file and environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.storage {
        config.storage.backend = backend;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = Some(dir);
    }
    ConfigLoader::validate(&config)?;

    if let Some(path) = args.write_config {
        loader.save(&config, &path)?;
        info!(path = %path.display(), "Configuration written");
        return Ok(());
    }

    let services = RgsFactory::build(&config)?;
    ApiServer::new(config.server.clone(), services).run().await
}
