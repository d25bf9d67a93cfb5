//! SQLite schema definitions for the similarity database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};
use anyhow::Result;
use rusqlite::Connection;

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("popularity", &SqlType::Integer),
        sqlite_column!("image", &SqlType::Text),
        sqlite_column!("genres", &SqlType::Text), // JSON array
    ],
    indices: &[],
    unique_constraints: &[],
};

/// One embedding per (artist, source); vectors are little-endian f32 blobs.
const ARTICLE_EMBEDDINGS_TABLE: Table = Table {
    name: "article_embeddings",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("source", &SqlType::Text, non_null = true),
        sqlite_column!("dimensions", &SqlType::Integer, non_null = true),
        sqlite_column!("embedding", &SqlType::Blob, non_null = true),
    ],
    indices: &[("idx_article_embeddings_source", "source")],
    unique_constraints: &[&["artist_id", "source"]],
};

const ARTIST_SIMILARITIES_TABLE: Table = Table {
    name: "artist_similarities",
    columns: &[
        sqlite_column!(
            "artist1_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!(
            "artist2_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("similarity_score", &SqlType::Real, non_null = true),
        sqlite_column!("metadata", &SqlType::Text, non_null = true), // JSON object
        sqlite_column!("computed_at", &SqlType::Integer, non_null = true), // unix millis
    ],
    indices: &[(
        "idx_artist_similarities_computed",
        "artist1_id, computed_at",
    )],
    unique_constraints: &[&["artist1_id", "artist2_id"]],
};

/// When each artist's similarities were last computed, written even when
/// the computation kept no records.
const SIMILARITY_COMPUTATIONS_TABLE: Table = Table {
    name: "similarity_computations",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            is_primary_key = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("computed_at", &SqlType::Integer, non_null = true), // unix millis
    ],
    indices: &[],
    unique_constraints: &[],
};

fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    SIMILARITY_COMPUTATIONS_TABLE.create(conn)?;
    // Artists computed before the marker existed keep their freshness.
    conn.execute(
        "INSERT INTO similarity_computations (artist_id, computed_at)
         SELECT artist1_id, MAX(computed_at) FROM artist_similarities GROUP BY artist1_id",
        [],
    )?;
    Ok(())
}

pub const SIMILARITY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            ARTISTS_TABLE,
            ARTICLE_EMBEDDINGS_TABLE,
            ARTIST_SIMILARITIES_TABLE,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            ARTISTS_TABLE,
            ARTICLE_EMBEDDINGS_TABLE,
            ARTIST_SIMILARITIES_TABLE,
            SIMILARITY_COMPUTATIONS_TABLE,
        ],
        migration: Some(migrate_v0_to_v1),
    },
];
