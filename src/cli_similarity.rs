//! Similarity Database Tool
//!
//! Loads artists and embeddings into a similarity database, runs the
//! in-process calculator and queries similar artists from the command line.

use anyhow::{bail, Context, Result};
use artist_similarity_server::calculator::{
    CalculationRequest, LocalSimilarityCalculator, SimilarityCalculator,
};
use artist_similarity_server::similarity::{
    RefreshMode, SimilarityService, SimilarityServiceOptions,
};
use artist_similarity_server::similarity_store::{
    ArticleEmbedding, Artist, SimilarityStore, SqliteSimilarityStore, WIKIPEDIA_SOURCE,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cli-similarity")]
#[command(about = "Manage and query an artist similarity database")]
struct Args {
    /// Path to the similarity SQLite database file
    #[arg(long, value_name = "DB_PATH")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import artists and embeddings from a JSON file
    Import {
        #[arg(value_name = "JSON_PATH")]
        path: PathBuf,
    },
    /// Recompute similarities for one artist or for a batch of artists
    Calculate {
        /// Only recompute this artist
        #[arg(long, conflicts_with = "limit")]
        artist_id: Option<String>,

        /// Number of artists to recompute, oldest first
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Print the artists most similar to the given one
    Similar {
        artist_id: String,

        /// Recompute even if stored similarities are fresh
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print database statistics
    Stats,
}

fn default_source() -> String {
    WIKIPEDIA_SOURCE.to_string()
}

#[derive(Deserialize, Debug)]
struct ImportEmbedding {
    artist_id: String,
    #[serde(default = "default_source")]
    source: String,
    embedding: Vec<f32>,
}

#[derive(Deserialize, Debug, Default)]
struct ImportFile {
    #[serde(default)]
    artists: Vec<Artist>,
    #[serde(default)]
    embeddings: Vec<ImportEmbedding>,
}

fn import(store: &SqliteSimilarityStore, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file {:?}", path))?;
    let file: ImportFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import file {:?}", path))?;

    info!(
        "Importing {} artists and {} embeddings...",
        file.artists.len(),
        file.embeddings.len()
    );

    // Artists go first, embeddings reference them.
    for artist in &file.artists {
        store.upsert_artist(artist)?;
    }

    let mut skipped = 0;
    for item in file.embeddings {
        if item.embedding.is_empty() {
            warn!("Skipping empty embedding of {}", item.artist_id);
            skipped += 1;
            continue;
        }
        let embedding = ArticleEmbedding {
            artist_id: item.artist_id,
            source: item.source,
            embedding: item.embedding,
        };
        if let Err(e) = store.upsert_embedding(&embedding) {
            warn!("Skipping embedding of {}: {:#}", embedding.artist_id, e);
            skipped += 1;
        }
    }

    info!("Import done, {} embeddings skipped", skipped);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = Arc::new(SqliteSimilarityStore::new(&args.db_path)?);
    let options = SimilarityServiceOptions::default();
    let calculator = Arc::new(LocalSimilarityCalculator::new(
        store.clone(),
        options.lookup.match_threshold,
        options.lookup.match_count,
    ));

    match args.command {
        Command::Import { path } => import(&store, &path)?,
        Command::Calculate { artist_id, limit } => {
            if limit == 0 {
                bail!("--limit must be greater than 0");
            }
            let request = match artist_id {
                Some(id) => CalculationRequest::for_artist(id),
                None => CalculationRequest::Batch { limit },
            };
            let outcome = calculator.calculate(&request).await?;
            info!("Calculation {}", outcome.as_str());
        }
        Command::Similar { artist_id, force } => {
            let service = SimilarityService::new(store.clone(), calculator, options);
            let mode = if force {
                RefreshMode::Force
            } else {
                RefreshMode::IfStale
            };
            let artists = service.similar_artists(&artist_id, mode).await?;
            if artists.is_empty() {
                println!("No similar artists found for {}", artist_id);
            }
            for artist in artists {
                println!(
                    "{:.3}  {:<24} {}",
                    artist.similarity_score,
                    artist.artist_id,
                    artist.name.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Stats => {
            let stats = store.get_stats()?;
            println!("Artists:            {}", stats.artists);
            println!("Embeddings:         {}", stats.embeddings);
            println!("Similarity records: {}", stats.similarity_records);
        }
    }

    Ok(())
}
