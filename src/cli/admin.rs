//! `stats`, `clear`, `export`, and `import` command handlers.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use llm_cache::cache::{Cache, CachePolicy};
use llm_cache::config::Config;
use llm_cache::store::Store;

/// Open the cache for an administrative command, honoring a `--cache-path`
/// override. Policy fields are irrelevant here: admin commands never write
/// new entries.
fn open_cache(cache_path: Option<PathBuf>) -> Result<(Cache, PathBuf)> {
    let mut config = Config::load().with_context(|| "Failed to load configuration")?;
    if let Some(path) = cache_path {
        config.storage_path = path;
    }
    let store = Store::open(&config.storage_path)
        .with_context(|| format!("Failed to open cache at {:?}", config.storage_path))?;
    let cache = Cache::new(store, CachePolicy::default())?;
    Ok((cache, config.storage_path))
}

pub(crate) fn cmd_stats(cache_path: Option<PathBuf>) -> Result<()> {
    let (cache, path) = open_cache(cache_path)?;
    let stats = cache.stats()?;

    println!("Cache Statistics");
    println!("================");
    println!("  Path:     {path:?}");
    println!("  Entries:  {}", stats.entry_count);
    println!(
        "  Size:     {:.2} MB (payloads {:.2} MB)",
        stats.db_size_bytes as f64 / (1024.0 * 1024.0),
        stats.total_size_bytes as f64 / (1024.0 * 1024.0),
    );
    println!("  Hits:     {}", stats.hit_count);
    println!("  Misses:   {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate * 100.0);

    if !stats.by_model.is_empty() {
        println!();
        println!("Entries by Model");
        println!("----------------");
        for (model, count) in &stats.by_model {
            println!("  {model}: {count}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_clear(
    older_than_days: Option<u64>,
    yes: bool,
    cache_path: Option<PathBuf>,
) -> Result<()> {
    if !yes && !confirm("Are you sure you want to clear the cache?")? {
        println!("Aborted.");
        return Ok(());
    }

    let (cache, _) = open_cache(cache_path)?;
    let older_than = older_than_days.map(|days| Duration::from_secs(days * 86400));
    let removed = cache.clear(older_than)?;

    match older_than_days {
        Some(days) => println!("Cleared {removed} entries older than {days} days"),
        None => println!("Cache cleared ({removed} entries removed)"),
    }
    Ok(())
}

pub(crate) fn cmd_export(output: &Path, cache_path: Option<PathBuf>) -> Result<()> {
    let (cache, _) = open_cache(cache_path)?;
    cache
        .export(output)
        .with_context(|| format!("Failed to export cache to {output:?}"))?;
    println!("Exported cache to {output:?}");
    Ok(())
}

pub(crate) fn cmd_import(input: &Path, cache_path: Option<PathBuf>) -> Result<()> {
    let (cache, _) = open_cache(cache_path)?;
    let report = cache
        .import(input)
        .with_context(|| format!("Failed to import cache from {input:?}"))?;
    println!(
        "Imported {} entries from {input:?} ({} added, {} overwritten)",
        report.added + report.overwritten,
        report.added,
        report.overwritten
    );
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
