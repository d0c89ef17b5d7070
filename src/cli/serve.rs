//! `serve` command handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use llm_cache::cache::{Cache, CachePolicy};
use llm_cache::config::{Config, Provider};
use llm_cache::proxy::sweep::start_periodic_sweep;
use llm_cache::proxy::{start_server, AppState, HttpUpstream};
use llm_cache::store::Store;

/// How often the background task physically removes expired rows.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub(crate) async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    provider: Option<String>,
    target_url: Option<String>,
    ttl: Option<u64>,
    max_entries: Option<usize>,
    cache_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load().with_context(|| "Failed to load configuration")?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(name) = provider {
        config.upstream.provider = Provider::parse(&name)?;
    }
    if let Some(url) = target_url {
        config.upstream.target_url = Some(url);
    }
    if let Some(secs) = ttl {
        config.ttl_seconds = Some(secs);
    }
    if let Some(max) = max_entries {
        config.max_entries = Some(max);
    }
    if let Some(path) = cache_path {
        config.storage_path = path;
    }

    let store = Store::open(&config.storage_path)
        .with_context(|| format!("Failed to open cache at {:?}", config.storage_path))?;
    let cache = Cache::new(
        store,
        CachePolicy {
            default_ttl: config.ttl_seconds.map(Duration::from_secs),
            max_entries: config.max_entries,
        },
    )?;

    let upstream = Arc::new(HttpUpstream::new(&config.upstream));
    let state = AppState::new(cache.clone(), upstream);
    let sweeper = start_periodic_sweep(cache, SWEEP_INTERVAL);

    println!(
        "Starting cache proxy on {}:{}",
        config.server.host, config.server.port
    );
    println!("Upstream: {}", config.upstream.endpoint_url());
    println!("Cache:    {:?}", config.storage_path);
    if let Some(ttl) = config.ttl_seconds {
        println!("TTL:      {ttl}s");
    }
    if let Some(max) = config.max_entries {
        println!("Capacity: {max} entries");
    }
    println!();
    println!("Configure your client to use:");
    println!(
        "  OPENAI_BASE_URL=http://{}:{}/v1",
        config.server.host, config.server.port
    );
    println!();

    let result = start_server(&config.server, state)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"));
    sweeper.abort();
    result
}
