#![deny(clippy::mod_module_files)]
use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

mod cache;
mod config;
mod endpoints;
mod error;
mod protocol;
mod relay;
mod state;
mod storage;

use cache::StateCache;
use config::RelayConfig;
use protocol::Outcome;
use relay::RelayService;
use storage::FilesystemStore;

/// State relay between the AR lens runtime and the photo-booth host page.
///
/// Speaks one JSON frame per line on stdin/stdout; logs go to stderr so
/// stdout stays a clean protocol channel. Exits after a camera_switch frame
/// so the supervisor can relaunch it, which stands in for the forced page
/// reload of the browser build.
#[derive(Parser, Debug)]
#[command(name = "bayou-relay", version)]
struct Args {
    /// Directory for the session and durable store files (overrides config)
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = RelayConfig::load()?;
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    let storage_dir = config.ensure_storage_dir()?;
    tracing::debug!("using storage directory {:?}", storage_dir);

    if !config.api_spec_id.is_empty() {
        tracing::info!(spec = %config.api_spec_id, "remote API provider registered");
    }

    let session = FilesystemStore::open(storage_dir.join("session.json"))?;
    let durable = FilesystemStore::open(storage_dir.join("store.json"))?;
    let cache = StateCache::new(session, durable);

    let mut relay = RelayService::start(cache);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let outcome = protocol::serve(&mut relay, stdin.lock(), &mut stdout)?;
    relay.shutdown();

    match outcome {
        Outcome::Reload => tracing::info!("exiting for camera-switch reload"),
        Outcome::Shutdown => tracing::debug!("input closed, shutting down"),
    }

    Ok(())
}
