//! Persistence port for artist and album enrichment metadata.

mod models;
mod schema;
mod sqlite_metadata_store;

pub use models::*;
pub use schema::METADATA_VERSIONED_SCHEMAS;
pub use sqlite_metadata_store::SqliteMetadataStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub trait MetadataStore: Send + Sync {
    fn get_artist(&self, id: &str) -> Result<Option<ArtistRecord>>;
    fn get_album(&self, id: &str) -> Result<Option<AlbumRecord>>;

    /// Write a single field and stamp it with the current time.
    /// Fails if the artist does not exist.
    fn set_artist_field(&self, id: &str, field: ArtistField, value: &str) -> Result<()>;
    fn set_album_field(&self, id: &str, field: AlbumField, value: &str) -> Result<()>;

    /// Ids of artists with a missing target field, or one written before
    /// `stale_before`. `None` lists every artist. Ordered by creation.
    fn list_artists_needing_enrichment(
        &self,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>>;
    fn list_albums_needing_enrichment(
        &self,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>>;

    fn list_albums_for_artist(&self, artist_id: &str) -> Result<Vec<AlbumRecord>>;

    fn upsert_artist(&self, id: &str, name: &str) -> Result<()>;
    fn upsert_album(&self, id: &str, title: &str, artist_id: Option<&str>) -> Result<()>;
}
