//! readaloud-rs: transcript fetch service for spoken content playback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use readaloud_rs::api::{serve, ApiState};
use readaloud_rs::cache::TranscriptCache;
use readaloud_rs::config::Config;
use readaloud_rs::content::ContentLibrary;
use readaloud_rs::rate_limit::RateLimiter;
use readaloud_rs::resolver::Resolver;
use readaloud_rs::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "readaloud-rs", about = "Transcript fetch service for spoken content playback")]
struct Args {
    /// Path to readaloud.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the JSON content library (overrides config)
    #[arg(long)]
    content: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("readaloud-rs starting");

    let config = Config::load(args.config.as_deref());
    if config.server.security_token.is_empty() {
        warn!("No security token configured — only empty-token requests will pass");
    }

    let library_path = args
        .content
        .unwrap_or_else(|| PathBuf::from(&config.content.library_path));
    let library = Arc::new(ContentLibrary::load(&library_path));
    if library.is_empty() {
        warn!("Content library is empty — all fetches will return 404");
    }

    let transient = Arc::new(MemoryStore::new());
    let state = ApiState {
        store: library,
        cache: Arc::new(TranscriptCache::new(
            transient.clone(),
            Duration::from_secs(config.cache.ttl_secs),
        )),
        limiter: Arc::new(RateLimiter::new(transient.clone(), &config.rate_limit)),
        resolver: Arc::new(Resolver::new(config.resolver.clone())),
        transient,
        security_token: Arc::new(config.server.security_token.clone()),
    };

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{port}", config.server.bind);
    serve(state, &addr).await?;

    Ok(())
}
