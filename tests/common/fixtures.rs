//! Test fixture creation

use super::constants::*;
use anyhow::Result;
use enrichment_server::metadata_store::{MetadataStore, SqliteMetadataStore};
use tempfile::TempDir;

/// Creates a metadata database with two artists and two albums, none of
/// them enriched yet.
pub fn create_test_store() -> Result<(TempDir, SqliteMetadataStore)> {
    let temp_dir = TempDir::new()?;
    let store = SqliteMetadataStore::new(temp_dir.path().join("metadata.db"))?;

    store.upsert_artist(ARTIST_1_ID, "The Test Band")?;
    store.upsert_artist(FLAKY_ARTIST_ID, "Flaky Artist")?;
    store.upsert_album(ALBUM_1_ID, "First Album", Some(ARTIST_1_ID))?;
    store.upsert_album(ALBUM_2_ID, "Second Album", Some(ARTIST_1_ID))?;

    Ok((temp_dir, store))
}
