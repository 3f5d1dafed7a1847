//! SQLite schema for the metadata database.
//!
//! Every enrichable field carries its own `*_updated_at` column so freshness
//! is evaluated per field rather than per entity.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Artists and albums
// =============================================================================

const ARTISTS_TABLE_V1: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("mbid", &SqlType::Text),
        sqlite_column!("mbid_updated_at", &SqlType::Text),
        sqlite_column!("bio", &SqlType::Text),
        sqlite_column!("bio_updated_at", &SqlType::Text),
        sqlite_column!("image_path", &SqlType::Text),
        sqlite_column!("image_updated_at", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const ALBUMS_TABLE_V1: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text),
        sqlite_column!("mbid", &SqlType::Text),
        sqlite_column!("mbid_updated_at", &SqlType::Text),
        sqlite_column!("cover_path", &SqlType::Text),
        sqlite_column!("cover_updated_at", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_albums_artist_id", "artist_id")],
};

pub const METADATA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[ARTISTS_TABLE_V1, ALBUMS_TABLE_V1],
    migration: None,
}];
