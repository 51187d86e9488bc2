//! Offline maintenance for the note search index.
//!
//! Both commands expect the API server to be stopped: the index directory
//! takes a single writer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use scribe_core::rebuild::{rebuild_index, repair_index};
use scribe_db::Database;
use scribe_search::NoteIndex;

#[derive(Parser, Debug)]
#[command(name = "scribe-indexer", version)]
#[command(about = "Rebuild or repair the scribe search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Note store (SQLite file)
    #[arg(long, global = true, env = "SCRIBE_DB_PATH", default_value = "data/notes.sqlite3")]
    db: PathBuf,

    /// Search index directory
    #[arg(long, global = true, env = "SCRIBE_INDEX_PATH", default_value = "data/notes.index")]
    index: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a fresh index from every stored note and swap it into place
    Rebuild,
    /// Re-index notes whose live index update never completed (index must exist)
    Repair,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let db = Database::open(&cli.db)?;

    match cli.command {
        Commands::Rebuild => {
            let report = rebuild_index(&db, &cli.index)?;
            info!(
                "Rebuilt {} with {} documents ({} outbox entries cleared)",
                cli.index.display(),
                report.documents,
                report.outbox_cleared
            );
        }
        Commands::Repair => {
            let index = NoteIndex::open(&cli.index)?;
            let report = repair_index(&db, &index)?;
            info!("Repaired {}: {} notes re-indexed", cli.index.display(), report.reindexed);
        }
    }

    Ok(())
}
