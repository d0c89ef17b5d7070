//! Command-line interface: argument definitions and dispatch.

mod admin;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "llm-cache",
    version,
    about = "Local caching proxy for LLM API responses"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the cache proxy server.
    Serve {
        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(long, short)]
        port: Option<u16>,
        /// Upstream provider (openai, anthropic).
        #[arg(long)]
        provider: Option<String>,
        /// Target API base URL (overrides the provider default).
        #[arg(long)]
        target_url: Option<String>,
        /// Default TTL for cached entries, in seconds.
        #[arg(long)]
        ttl: Option<u64>,
        /// Maximum number of cached entries.
        #[arg(long)]
        max_entries: Option<usize>,
        /// Path to the cache database.
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
    /// Show cache statistics.
    Stats {
        /// Path to the cache database.
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
    /// Clear the cache.
    Clear {
        /// Only clear entries older than this many days.
        #[arg(long)]
        older_than: Option<u64>,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
        /// Path to the cache database.
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
    /// Export the cache to a snapshot file.
    Export {
        /// Destination snapshot file.
        output: PathBuf,
        /// Path to the cache database.
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
    /// Import a snapshot file into the cache (merge, overwrite-wins).
    Import {
        /// Source snapshot file.
        input: PathBuf,
        /// Path to the cache database.
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            provider,
            target_url,
            ttl,
            max_entries,
            cache_path,
        } => {
            serve::cmd_serve(host, port, provider, target_url, ttl, max_entries, cache_path).await
        }
        Commands::Stats { cache_path } => admin::cmd_stats(cache_path),
        Commands::Clear {
            older_than,
            yes,
            cache_path,
        } => admin::cmd_clear(older_than, yes, cache_path),
        Commands::Export { output, cache_path } => admin::cmd_export(&output, cache_path),
        Commands::Import { input, cache_path } => admin::cmd_import(&input, cache_path),
    }
}
