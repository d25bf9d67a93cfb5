//! Test fixture creation
//!
//! Builds a small similarity database: four embedded artists and one
//! artist without an embedding.

use super::constants::*;
use anyhow::Result;
use artist_similarity_server::similarity_store::{
    ArticleEmbedding, Artist, SimilarityStore, SqliteSimilarityStore, WIKIPEDIA_SOURCE,
};
use std::path::PathBuf;
use tempfile::TempDir;

struct FixtureArtist {
    id: &'static str,
    name: &'static str,
    genres: &'static [&'static str],
    popularity: i64,
    embedding: Option<[f32; 3]>,
}

const FIXTURE_ARTISTS: &[FixtureArtist] = &[
    FixtureArtist {
        id: RADIOHEAD_ID,
        name: "Radiohead",
        genres: &["alternative rock", "art rock"],
        popularity: 80,
        embedding: Some([1.0, 0.1, 0.0]),
    },
    FixtureArtist {
        id: MUSE_ID,
        name: "Muse",
        genres: &["alternative rock", "space rock"],
        popularity: 75,
        embedding: Some([0.95, 0.2, 0.0]),
    },
    FixtureArtist {
        id: COLDPLAY_ID,
        name: "Coldplay",
        genres: &["alternative rock", "pop rock"],
        popularity: 85,
        embedding: Some([0.9, 0.3, 0.05]),
    },
    FixtureArtist {
        id: BACH_ID,
        name: "Johann Sebastian Bach",
        genres: &["baroque"],
        popularity: 60,
        embedding: Some([0.0, 0.0, 1.0]),
    },
    FixtureArtist {
        id: UNEMBEDDED_ID,
        name: "Nobody Wrote About Us",
        genres: &[],
        popularity: 1,
        embedding: None,
    },
];

/// Creates a temporary similarity database populated with the fixture artists.
///
/// Returns the TempDir (which must be kept alive) and the database path.
pub fn create_test_store() -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("similarity.db");
    let store = SqliteSimilarityStore::new(&db_path)?;

    for fixture in FIXTURE_ARTISTS {
        store.upsert_artist(&Artist {
            id: fixture.id.to_string(),
            name: fixture.name.to_string(),
            genre: fixture.genres.first().map(|g| g.to_string()),
            popularity: Some(fixture.popularity),
            image: Some(format!("https://images.test/{}.jpg", fixture.id)),
            genres: fixture.genres.iter().map(|g| g.to_string()).collect(),
        })?;
        if let Some(embedding) = fixture.embedding {
            store.upsert_embedding(&ArticleEmbedding {
                artist_id: fixture.id.to_string(),
                source: WIKIPEDIA_SOURCE.to_string(),
                embedding: embedding.to_vec(),
            })?;
        }
    }

    Ok((temp_dir, db_path))
}
