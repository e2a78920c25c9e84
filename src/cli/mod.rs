pub mod cache;
pub mod check;
pub mod health;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use mnemos::config::MnemosConfig;
use mnemos::db;
use mnemos::embedding::store::SqliteEmbeddingStore;
use mnemos::ConsistencyEngine;

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Open the record database and build an engine whose durable cache tier
/// lives in the same file.
pub fn open_engine(config: &MnemosConfig) -> Result<(ConsistencyEngine, Connection)> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;

    if let Some(stored) = db::migrations::get_embedding_model(&conn)? {
        if stored != config.embedding.model {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.model,
                "embedding model mismatch; stored memories were embedded with a different model"
            );
        }
    }

    let embedder = mnemos::embedding::create_provider(&config.embedding)
        .context("failed to load embedding model (try `mnemos model download`)")?;
    let reasoner = mnemos::reasoning::create_provider(&config.reasoning)?;
    let durable = SqliteEmbeddingStore::open(&db_path)?;

    let engine = ConsistencyEngine::new(config, embedder, reasoner, Some(Box::new(durable)));
    Ok((engine, conn))
}

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &mnemos::config::EmbeddingConfig) -> Result<()> {
    let cache_dir = mnemos::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (name, url) in [("model.onnx", MODEL_URL), ("tokenizer.json", TOKENIZER_URL)] {
        let dest = cache_dir.join(name);
        if dest.exists() {
            eprintln!("{name} already exists at {}", dest.display());
            continue;
        }
        eprintln!("Downloading {name}...");
        download_file(url, &dest).await?;
        eprintln!("Saved to {}", dest.display());
    }

    eprintln!("Model download complete.");
    Ok(())
}

/// Download a file with a progress bar. Writes to a temp file and renames so
/// an interrupted download never leaves a truncated model behind.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .context("invalid progress template")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk).await.context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
