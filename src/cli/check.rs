//! CLI `check` and `add` commands.

use anyhow::Result;
use serde::Serialize;

use mnemos::config::MnemosConfig;
use mnemos::db::migrations;
use mnemos::memory::store;
use mnemos::memory::types::DetectionReport;

/// Subject id used for text that is not stored yet.
const PENDING_ID: &str = "pending";

#[derive(Serialize)]
struct AddOutcome {
    stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    report: DetectionReport,
}

/// Check `text` against every stored memory and print the report as JSON.
pub async fn check(config: &MnemosConfig, text: &str) -> Result<()> {
    let (engine, conn) = super::open_engine(config)?;
    let existing = store::list_memories(&conn)?;

    let report = engine.check(PENDING_ID, text, &existing).await?;
    engine.shutdown();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Check `text`, then store it unless duplicates were found (or `force`).
pub async fn add(config: &MnemosConfig, text: &str, force: bool) -> Result<()> {
    let (engine, conn) = super::open_engine(config)?;
    let existing = store::list_memories(&conn)?;

    let embedding = engine.embed(text).await?;
    let report = engine
        .detect_with_embedding(PENDING_ID, text, &embedding, &existing)
        .await;
    engine.shutdown();

    let stored = force || report.duplicates.is_empty();
    let id = if stored {
        let id = store::insert_memory(&conn, text, Some(&embedding))?;
        migrations::set_embedding_model(&conn, &config.embedding.model)?;
        Some(id)
    } else {
        eprintln!("Not stored: near-duplicate of an existing memory (use --force to store anyway).");
        None
    };

    if !report.contradictions.is_empty() {
        eprintln!(
            "Warning: contradicts {} existing memor{}.",
            report.contradictions.len(),
            if report.contradictions.len() == 1 { "y" } else { "ies" }
        );
    }

    let outcome = AddOutcome { stored, id, report };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
