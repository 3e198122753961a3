use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tileworld::{
    config::WorldLoader,
    map::TileMap,
    store::{ClusterStore, JsonFileStore, MemoryClusterStore},
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "tileworld cluster engine runner")]
struct Cli {
    /// Path to the world YAML file
    #[arg(long, default_value = "worlds/tiny_valley.yaml")]
    world: PathBuf,

    /// Override the chunk task count
    #[arg(long)]
    workers: Option<usize>,

    /// Override the per-chunk timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Persist clusters as JSON under this directory (in-memory when omitted)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Serve the browser UI after clustering
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = WorldLoader::new(".");
    let world = loader.load(&cli.world)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&world.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut clustering = world.clustering.clone();
    if let Some(workers) = cli.workers {
        clustering.workers = Some(workers);
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        clustering.chunk_timeout_secs = timeout_secs;
    }

    let store: Arc<dyn ClusterStore> = match &cli.store_dir {
        Some(dir) => Arc::new(JsonFileStore::new(dir)?),
        None => Arc::new(MemoryClusterStore::new()),
    };

    let grid = world.build_grid()?;
    let mut map = TileMap::new(grid, &clustering, store);
    let source = match map.initialize(&world.tile_set_id).await {
        Ok(source) => source,
        Err(err) => bail!("world '{}' is not playable: {err}", world.name),
    };

    let clusters = map.engine().clusters();
    println!(
        "World '{}' ({}x{}): {} clusters ({:?})",
        world.name,
        map.grid().width(),
        map.grid().height(),
        clusters.len(),
        source
    );
    for (kind, count) in clusters.counts() {
        if count > 0 {
            println!("  {:<12} {count}", kind.name());
        }
    }

    if cli.serve {
        web::run(WebServerConfig {
            map,
            host: cli.host,
            port: cli.port,
        })
        .await?;
    }
    Ok(())
}
