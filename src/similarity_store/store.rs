//! SQLite-backed similarity store implementation.
//!
//! Embeddings are kept as little-endian `f32` blobs and the nearest-neighbor
//! search is an exhaustive cosine scan over the requested source.

use super::models::{
    ArticleEmbedding, Artist, NeighborMatch, SimilarityMetadata, SimilarityRecord,
    SimilarityStats,
};
use super::schema::SIMILARITY_VERSIONED_SCHEMAS;
use super::trait_def::SimilarityStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Max number of ids bound in a single `IN (...)` query.
const ATTRIBUTES_CHUNK_SIZE: usize = 500;

/// SQLite-backed similarity store.
#[derive(Clone)]
pub struct SqliteSimilarityStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = SIMILARITY_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &SIMILARITY_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating similarity db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    if db_version < BASE_DB_VERSION as i64 {
        bail!(
            "Similarity database version {} does not contain base db version {}",
            db_version,
            BASE_DB_VERSION
        );
    }
    let mut current_version = (db_version - BASE_DB_VERSION as i64) as usize;
    if current_version > latest_version {
        bail!(
            "Similarity database version {} is too new (max supported: {})",
            current_version,
            latest_version
        );
    }

    SIMILARITY_VERSIONED_SCHEMAS[current_version]
        .validate(conn)
        .context("Similarity database schema validation failed")?;

    if current_version == latest_version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in SIMILARITY_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating similarity db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
        }
        current_version = schema.version;
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

impl SqliteSimilarityStore {
    /// Open (or create) the similarity database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open similarity database")?;

        migrate_if_needed(&mut write_conn)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on similarity write connection")?;
        write_conn
            .pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open similarity database for reading")?;

        let stats = Self::count_rows(&read_conn)?;
        info!(
            "Similarity store ready: {} artists, {} embeddings, {} similarity records",
            stats.artists, stats.embeddings, stats.similarity_records
        );

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    fn count_rows(conn: &Connection) -> Result<SimilarityStats> {
        let artists: usize = conn.query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))?;
        let embeddings: usize =
            conn.query_row("SELECT COUNT(*) FROM article_embeddings", [], |r| r.get(0))?;
        let similarity_records: usize =
            conn.query_row("SELECT COUNT(*) FROM artist_similarities", [], |r| r.get(0))?;
        Ok(SimilarityStats {
            artists,
            embeddings,
            similarity_records,
        })
    }
}

pub(crate) fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub(crate) fn decode_embedding(blob: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    if blob.len() != dimensions * std::mem::size_of::<f32>() {
        bail!(
            "Invalid embedding blob: expected {} bytes, got {}",
            dimensions * std::mem::size_of::<f32>(),
            blob.len()
        );
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity in f64, `None` for mismatched or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}

/// Best score first, then artist id ascending.
pub(crate) fn compare_neighbors(a: &NeighborMatch, b: &NeighborMatch) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.artist_id.cmp(&b.artist_id))
}

// Helper: Vec<String> to JSON, NULL when empty
fn genres_to_json(genres: &[String]) -> Result<Option<String>> {
    if genres.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(genres)?))
}

// Helper: JSON array or NULL to Vec<String>
fn parse_genres(s: Option<String>) -> Vec<String> {
    s.map(|json| {
        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Malformed genres array in similarity db: {}: {}", json, e);
            Vec::new()
        })
    })
    .unwrap_or_default()
}

fn millis_to_datetime(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(4, millis)
    })
}

impl SimilarityStore for SqliteSimilarityStore {
    fn get_attributes(&self, artist_ids: &[String]) -> Result<Vec<Artist>> {
        let conn = self.read_conn.lock().unwrap();
        let mut artists = Vec::with_capacity(artist_ids.len());

        for chunk in artist_ids.chunks(ATTRIBUTES_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT id, name, genre, popularity, image, genres
                 FROM artists WHERE id IN ({})",
                placeholders
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok(Artist {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    genre: row.get(2)?,
                    popularity: row.get(3)?,
                    image: row.get(4)?,
                    genres: parse_genres(row.get(5)?),
                })
            })?;
            for artist in rows {
                artists.push(artist?);
            }
        }

        Ok(artists)
    }

    fn upsert_artist(&self, artist: &Artist) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO artists (id, name, genre, popularity, image, genres)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                genre = excluded.genre,
                popularity = excluded.popularity,
                image = excluded.image,
                genres = excluded.genres",
            params![
                artist.id,
                artist.name,
                artist.genre,
                artist.popularity,
                artist.image,
                genres_to_json(&artist.genres)?,
            ],
        )?;
        Ok(())
    }

    fn get_embedding(&self, artist_id: &str, source: &str) -> Result<Option<ArticleEmbedding>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT dimensions, embedding FROM article_embeddings
             WHERE artist_id = ?1 AND source = ?2",
        )?;
        let row: Option<(usize, Vec<u8>)> = stmt
            .query_row(params![artist_id, source], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        match row {
            None => Ok(None),
            Some((dimensions, blob)) => Ok(Some(ArticleEmbedding {
                artist_id: artist_id.to_string(),
                source: source.to_string(),
                embedding: decode_embedding(&blob, dimensions)
                    .with_context(|| format!("Corrupted embedding for artist {}", artist_id))?,
            })),
        }
    }

    fn upsert_embedding(&self, embedding: &ArticleEmbedding) -> Result<()> {
        if embedding.embedding.is_empty() {
            bail!("Refusing to store an empty embedding for {}", embedding.artist_id);
        }
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO article_embeddings (artist_id, source, dimensions, embedding)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(artist_id, source) DO UPDATE SET
                dimensions = excluded.dimensions,
                embedding = excluded.embedding",
            params![
                embedding.artist_id,
                embedding.source,
                embedding.embedding.len(),
                encode_embedding(&embedding.embedding),
            ],
        )?;
        Ok(())
    }

    fn find_nearest(
        &self,
        query: &[f32],
        source: &str,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<NeighborMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT artist_id, embedding FROM article_embeddings
             WHERE source = ?1 AND dimensions = ?2",
        )?;
        let rows = stmt.query_map(params![source, query.len()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (artist_id, blob) = row?;
            let candidate = match decode_embedding(&blob, query.len()) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Skipping embedding of {}: {}", artist_id, e);
                    continue;
                }
            };
            if let Some(similarity) = cosine_similarity(query, &candidate) {
                if similarity >= threshold {
                    matches.push(NeighborMatch {
                        artist_id,
                        similarity,
                    });
                }
            }
        }

        matches.sort_by(compare_neighbors);
        matches.truncate(limit);
        Ok(matches)
    }

    fn get_embedded_artist_ids(&self, source: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT artist_id FROM article_embeddings WHERE source = ?1
             ORDER BY artist_id LIMIT ?2",
        )?;
        // A negative LIMIT means no limit in SQLite.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let ids = stmt
            .query_map(params![source, limit], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn last_computed_at(&self, artist1_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.read_conn.lock().unwrap();
        // Records written by an external calculator carry no marker.
        let millis: Option<i64> = conn.query_row(
            "SELECT MAX(at) FROM (
                SELECT computed_at AS at FROM similarity_computations WHERE artist_id = ?1
                UNION ALL
                SELECT MAX(computed_at) AS at FROM artist_similarities WHERE artist1_id = ?1
             )",
            params![artist1_id],
            |r| r.get(0),
        )?;
        match millis {
            Some(ms) => Ok(Some(millis_to_datetime(ms)?)),
            None => Ok(None),
        }
    }

    fn get_similarities(&self, artist1_id: &str) -> Result<Vec<SimilarityRecord>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT artist1_id, artist2_id, similarity_score, metadata, computed_at
             FROM artist_similarities WHERE artist1_id = ?1
             ORDER BY similarity_score DESC, artist2_id ASC",
        )?;
        let rows = stmt.query_map(params![artist1_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                millis_to_datetime(row.get(4)?)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (artist1_id, artist2_id, similarity_score, metadata, computed_at) = row?;
            let metadata: SimilarityMetadata = serde_json::from_str(&metadata)
                .with_context(|| format!("Malformed metadata for {} -> {}", artist1_id, artist2_id))?;
            records.push(SimilarityRecord {
                artist1_id,
                artist2_id,
                similarity_score,
                metadata,
                computed_at,
            });
        }
        Ok(records)
    }

    fn replace_similarities(
        &self,
        artist1_id: &str,
        records: &[SimilarityRecord],
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        for record in records {
            if record.artist1_id != artist1_id {
                bail!(
                    "Record {} -> {} does not belong to artist {}",
                    record.artist1_id,
                    record.artist2_id,
                    artist1_id
                );
            }
            if record.artist2_id == artist1_id {
                bail!("Artist {} cannot be similar to itself", artist1_id);
            }
            if !(0.0..=1.0).contains(&record.similarity_score) {
                bail!(
                    "Similarity score {} for {} -> {} is outside [0, 1]",
                    record.similarity_score,
                    record.artist1_id,
                    record.artist2_id
                );
            }
        }

        let conn = self.write_conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM artist_similarities WHERE artist1_id = ?1",
            params![artist1_id],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO artist_similarities
                 (artist1_id, artist2_id, similarity_score, metadata, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(artist1_id, artist2_id) DO UPDATE SET
                    similarity_score = excluded.similarity_score,
                    metadata = excluded.metadata,
                    computed_at = excluded.computed_at",
            )?;
            for record in records {
                stmt.execute(params![
                    record.artist1_id,
                    record.artist2_id,
                    record.similarity_score,
                    serde_json::to_string(&record.metadata)?,
                    record.computed_at.timestamp_millis(),
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO similarity_computations (artist_id, computed_at) VALUES (?1, ?2)
             ON CONFLICT(artist_id) DO UPDATE SET computed_at = excluded.computed_at",
            params![artist1_id, computed_at.timestamp_millis()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_stats(&self) -> Result<SimilarityStats> {
        let conn = self.read_conn.lock().unwrap();
        Self::count_rows(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity_store::models::{SimilarityFactors, WIKIPEDIA_SOURCE};
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteSimilarityStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("similarity.db");
        let store = SqliteSimilarityStore::new(&db_path).unwrap();
        (store, tmp)
    }

    fn make_artist(id: &str, name: &str) -> Artist {
        Artist {
            id: id.to_string(),
            name: name.to_string(),
            genre: Some("rock".to_string()),
            popularity: Some(50),
            image: None,
            genres: vec!["rock".to_string(), "indie".to_string()],
        }
    }

    fn add_artist_with_embedding(store: &SqliteSimilarityStore, id: &str, embedding: Vec<f32>) {
        store.upsert_artist(&make_artist(id, id)).unwrap();
        store
            .upsert_embedding(&ArticleEmbedding {
                artist_id: id.to_string(),
                source: WIKIPEDIA_SOURCE.to_string(),
                embedding,
            })
            .unwrap();
    }

    fn make_record(artist1: &str, artist2: &str, score: f64, at: DateTime<Utc>) -> SimilarityRecord {
        SimilarityRecord {
            artist1_id: artist1.to_string(),
            artist2_id: artist2.to_string(),
            similarity_score: score,
            metadata: SimilarityMetadata {
                factors: SimilarityFactors {
                    genre_similarity: 1.0,
                    name_similarity: 0.2,
                    content_similarity: score,
                },
            },
            computed_at: at,
        }
    }

    #[test]
    fn test_reopen_existing_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("similarity.db");
        {
            let store = SqliteSimilarityStore::new(&db_path).unwrap();
            store.upsert_artist(&make_artist("a", "Alpha")).unwrap();
        }
        let store = SqliteSimilarityStore::new(&db_path).unwrap();
        assert_eq!(store.get_stats().unwrap().artists, 1);
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let (store, _tmp) = create_test_store();
        add_artist_with_embedding(&store, "a", vec![0.25, -1.5, 3.0]);

        let embedding = store.get_embedding("a", WIKIPEDIA_SOURCE).unwrap().unwrap();
        assert_eq!(embedding.embedding, vec![0.25, -1.5, 3.0]);
        assert!(store.get_embedding("a", "lastfm").unwrap().is_none());
        assert!(store.get_embedding("missing", WIKIPEDIA_SOURCE).unwrap().is_none());
    }

    #[test]
    fn test_embedding_requires_known_artist() {
        let (store, _tmp) = create_test_store();
        let result = store.upsert_embedding(&ArticleEmbedding {
            artist_id: "ghost".to_string(),
            source: WIKIPEDIA_SOURCE.to_string(),
            embedding: vec![1.0],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_nearest_orders_and_filters() {
        let (store, _tmp) = create_test_store();
        add_artist_with_embedding(&store, "query", vec![1.0, 0.0]);
        add_artist_with_embedding(&store, "close", vec![0.9, 0.1]);
        add_artist_with_embedding(&store, "twin-b", vec![2.0, 0.0]);
        add_artist_with_embedding(&store, "twin-a", vec![3.0, 0.0]);
        add_artist_with_embedding(&store, "far", vec![0.0, 1.0]);

        let matches = store
            .find_nearest(&[1.0, 0.0], WIKIPEDIA_SOURCE, 0.7, 10)
            .unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.artist_id.as_str()).collect();

        // Identical directions tie at 1.0 and are ordered by id.
        assert_eq!(ids, vec!["query", "twin-a", "twin-b", "close"]);
        assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));

        let limited = store
            .find_nearest(&[1.0, 0.0], WIKIPEDIA_SOURCE, 0.7, 2)
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_find_nearest_skips_other_dimensions() {
        let (store, _tmp) = create_test_store();
        add_artist_with_embedding(&store, "a", vec![1.0, 0.0]);
        add_artist_with_embedding(&store, "b", vec![1.0, 0.0, 0.0]);

        let matches = store
            .find_nearest(&[1.0, 0.0], WIKIPEDIA_SOURCE, 0.0, 10)
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].artist_id, "a");
    }

    #[test]
    fn test_get_attributes_batch() {
        let (store, _tmp) = create_test_store();
        store.upsert_artist(&make_artist("a", "Alpha")).unwrap();
        store.upsert_artist(&make_artist("b", "Beta")).unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        let mut artists = store.get_attributes(&ids).unwrap();
        artists.sort_by(|x, y| x.id.cmp(&y.id));

        assert_eq!(artists.len(), 2);
        assert_eq!(artists[0].name, "Alpha");
        assert_eq!(artists[1].genres, vec!["rock", "indie"]);
        assert!(store.get_attributes(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_replace_similarities_and_last_computed_at() {
        let (store, _tmp) = create_test_store();
        for id in ["a", "b", "c"] {
            store.upsert_artist(&make_artist(id, id)).unwrap();
        }
        assert!(store.last_computed_at("a").unwrap().is_none());

        let old = Utc::now() - Duration::days(10);
        store
            .replace_similarities("a", &[make_record("a", "b", 0.8, old)], old)
            .unwrap();
        assert_eq!(
            store.last_computed_at("a").unwrap().unwrap().timestamp_millis(),
            old.timestamp_millis()
        );

        let now = Utc::now();
        store
            .replace_similarities(
                "a",
                &[make_record("a", "c", 0.9, now), make_record("a", "b", 0.75, now)],
                now,
            )
            .unwrap();

        let records = store.get_similarities("a").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].artist2_id, "c");
        assert_eq!(records[1].similarity_score, 0.75);
        assert_eq!(records[0].metadata.factors.genre_similarity, 1.0);
        assert_eq!(
            store.last_computed_at("a").unwrap().unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
        assert!(store.last_computed_at("b").unwrap().is_none());
    }

    #[test]
    fn test_empty_replacement_still_marks_computed() {
        let (store, _tmp) = create_test_store();
        for id in ["a", "b"] {
            store.upsert_artist(&make_artist(id, id)).unwrap();
        }
        let old = Utc::now() - Duration::days(10);
        store
            .replace_similarities("a", &[make_record("a", "b", 0.8, old)], old)
            .unwrap();

        let now = Utc::now();
        store.replace_similarities("a", &[], now).unwrap();

        assert!(store.get_similarities("a").unwrap().is_empty());
        assert_eq!(
            store.last_computed_at("a").unwrap().unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
        assert_eq!(store.get_stats().unwrap().similarity_records, 0);
    }

    #[test]
    fn test_records_without_marker_count_as_computed() {
        let (store, _tmp) = create_test_store();
        for id in ["a", "b"] {
            store.upsert_artist(&make_artist(id, id)).unwrap();
        }
        let at = Utc::now() - Duration::hours(1);
        {
            let conn = store.write_conn.lock().unwrap();
            conn.execute(
                "INSERT INTO artist_similarities
                 (artist1_id, artist2_id, similarity_score, metadata, computed_at)
                 VALUES ('a', 'b', 0.8, '{}', ?1)",
                params![at.timestamp_millis()],
            )
            .unwrap();
        }
        assert_eq!(
            store.last_computed_at("a").unwrap().unwrap().timestamp_millis(),
            at.timestamp_millis()
        );
    }

    #[test]
    fn test_migrates_v0_database_keeping_freshness() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("similarity.db");
        let at = Utc::now() - Duration::days(2);
        {
            let conn = Connection::open(&db_path).unwrap();
            SIMILARITY_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            conn.execute("INSERT INTO artists (id, name) VALUES ('a', 'a'), ('b', 'b')", [])
                .unwrap();
            conn.execute(
                "INSERT INTO artist_similarities
                 (artist1_id, artist2_id, similarity_score, metadata, computed_at)
                 VALUES ('a', 'b', 0.8, '{}', ?1)",
                params![at.timestamp_millis()],
            )
            .unwrap();
        }

        let store = SqliteSimilarityStore::new(&db_path).unwrap();
        let conn = store.read_conn.lock().unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 1);
        let marker: i64 = conn
            .query_row(
                "SELECT computed_at FROM similarity_computations WHERE artist_id = 'a'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(marker, at.timestamp_millis());
    }

    #[test]
    fn test_replace_similarities_rejects_invalid_records() {
        let (store, _tmp) = create_test_store();
        for id in ["a", "b"] {
            store.upsert_artist(&make_artist(id, id)).unwrap();
        }
        let now = Utc::now();

        assert!(store
            .replace_similarities("a", &[make_record("a", "b", 1.2, now)], now)
            .is_err());
        assert!(store
            .replace_similarities("a", &[make_record("a", "a", 0.9, now)], now)
            .is_err());
        assert!(store
            .replace_similarities("a", &[make_record("b", "a", 0.9, now)], now)
            .is_err());
        assert!(store.get_similarities("a").unwrap().is_empty());
        assert!(store.last_computed_at("a").unwrap().is_none());
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
    }
}
