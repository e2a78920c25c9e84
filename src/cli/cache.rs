//! CLI `cache` subcommands. These never load the embedding model.

use anyhow::Result;

use mnemos::config::MnemosConfig;
use mnemos::embedding::cache::EmbeddingCache;
use mnemos::embedding::store::SqliteEmbeddingStore;

fn open_cache(config: &MnemosConfig) -> Result<EmbeddingCache> {
    let durable = SqliteEmbeddingStore::open(config.resolved_db_path())?;
    Ok(EmbeddingCache::new(
        config.embedding.model.clone(),
        &config.cache,
        Some(Box::new(durable)),
    ))
}

pub fn stats(config: &MnemosConfig) -> Result<()> {
    let stats = open_cache(config)?.stats();

    println!("Embedding Cache");
    println!("{}", "=".repeat(40));
    println!("  Entries:             {}", stats.entry_count);
    println!("  Approx. size:        {}", format_bytes(stats.approx_bytes));
    println!("  TTL:                 {} days", config.cache.ttl_days);
    if let Some(oldest) = stats.oldest_entry {
        println!("  Oldest entry:        {}", oldest.to_rfc3339());
    }
    if let Some(newest) = stats.newest_entry {
        println!("  Newest entry:        {}", newest.to_rfc3339());
    }
    Ok(())
}

pub fn prune(config: &MnemosConfig) -> Result<()> {
    let removed = open_cache(config)?.prune();
    println!("Pruned {removed} entries older than {} days.", config.cache.ttl_days);
    Ok(())
}

pub fn clear(config: &MnemosConfig) -> Result<()> {
    open_cache(config)?.clear();
    println!("Embedding cache cleared.");
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
