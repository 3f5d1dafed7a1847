use super::models::{AlbumField, AlbumRecord, ArtistField, ArtistRecord, FieldValue};
use super::schema::METADATA_VERSIONED_SCHEMAS;
use super::MetadataStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const ALBUM_SELECT: &str = "SELECT al.id, al.title, al.artist_id, ar.name AS artist_name,
        al.mbid, al.mbid_updated_at, al.cover_path, al.cover_updated_at, al.created_at
     FROM albums al LEFT JOIN artists ar ON ar.id = al.artist_id";

pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path.as_ref(), METADATA_VERSIONED_SCHEMAS, "metadata")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Write an artist field with an explicit timestamp.
    pub fn set_artist_field_at(
        &self,
        id: &str,
        field: ArtistField,
        value: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let (value_col, ts_col) = field.columns();
        let conn = self.conn()?;
        let updated = conn.execute(
            &format!(
                "UPDATE artists SET {} = ?1, {} = ?2 WHERE id = ?3",
                value_col, ts_col
            ),
            params![value, format_datetime(&at), id],
        )?;
        if updated == 0 {
            bail!("Artist {} not found", id);
        }
        Ok(())
    }

    /// Write an album field with an explicit timestamp.
    pub fn set_album_field_at(
        &self,
        id: &str,
        field: AlbumField,
        value: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let (value_col, ts_col) = field.columns();
        let conn = self.conn()?;
        let updated = conn.execute(
            &format!(
                "UPDATE albums SET {} = ?1, {} = ?2 WHERE id = ?3",
                value_col, ts_col
            ),
            params![value, format_datetime(&at), id],
        )?;
        if updated == 0 {
            bail!("Album {} not found", id);
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Metadata database mutex poisoned"))
    }

    fn list_ids(&self, sql: &str, stale_before: Option<DateTime<Utc>>) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let threshold = stale_before.map(|t| format_datetime(&t));
        let ids = stmt
            .query_map(params![threshold], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn row_to_artist(row: &rusqlite::Row) -> rusqlite::Result<ArtistRecord> {
        Ok(ArtistRecord {
            id: row.get("id")?,
            name: row.get("name")?,
            mbid: field_value(row, "mbid", "mbid_updated_at")?,
            bio: field_value(row, "bio", "bio_updated_at")?,
            image: field_value(row, "image_path", "image_updated_at")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }

    fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<AlbumRecord> {
        Ok(AlbumRecord {
            id: row.get("id")?,
            title: row.get("title")?,
            artist_id: row.get("artist_id")?,
            artist_name: row.get("artist_name")?,
            mbid: field_value(row, "mbid", "mbid_updated_at")?,
            cover: field_value(row, "cover_path", "cover_updated_at")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }
}

// Fixed-width UTC timestamps so text comparison in SQL matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn field_value(
    row: &rusqlite::Row,
    value_col: &str,
    ts_col: &str,
) -> rusqlite::Result<Option<FieldValue>> {
    let value: Option<String> = row.get(value_col)?;
    let updated_at: Option<String> = row.get(ts_col)?;
    Ok(value.filter(|v| !v.trim().is_empty()).map(|value| FieldValue {
        value,
        // A value without a timestamp is treated as infinitely old.
        updated_at: updated_at
            .as_deref()
            .map(parse_datetime)
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
    }))
}

impl MetadataStore for SqliteMetadataStore {
    fn get_artist(&self, id: &str) -> Result<Option<ArtistRecord>> {
        let conn = self.conn()?;
        let artist = conn
            .query_row(
                "SELECT id, name, mbid, mbid_updated_at, bio, bio_updated_at,
                        image_path, image_updated_at, created_at
                 FROM artists WHERE id = ?1",
                params![id],
                Self::row_to_artist,
            )
            .optional()?;
        Ok(artist)
    }

    fn get_album(&self, id: &str) -> Result<Option<AlbumRecord>> {
        let conn = self.conn()?;
        let album = conn
            .query_row(
                &format!("{} WHERE al.id = ?1", ALBUM_SELECT),
                params![id],
                Self::row_to_album,
            )
            .optional()?;
        Ok(album)
    }

    fn set_artist_field(&self, id: &str, field: ArtistField, value: &str) -> Result<()> {
        self.set_artist_field_at(id, field, value, Utc::now())
    }

    fn set_album_field(&self, id: &str, field: AlbumField, value: &str) -> Result<()> {
        self.set_album_field_at(id, field, value, Utc::now())
    }

    fn list_artists_needing_enrichment(
        &self,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        self.list_ids(
            "SELECT id FROM artists
             WHERE ?1 IS NULL
                OR bio IS NULL OR trim(bio) = '' OR bio_updated_at IS NULL OR bio_updated_at < ?1
                OR image_path IS NULL OR image_updated_at IS NULL OR image_updated_at < ?1
             ORDER BY rowid",
            stale_before,
        )
    }

    fn list_albums_needing_enrichment(
        &self,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        self.list_ids(
            "SELECT id FROM albums
             WHERE ?1 IS NULL
                OR cover_path IS NULL OR cover_updated_at IS NULL OR cover_updated_at < ?1
             ORDER BY rowid",
            stale_before,
        )
    }

    fn list_albums_for_artist(&self, artist_id: &str) -> Result<Vec<AlbumRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE al.artist_id = ?1 ORDER BY al.rowid",
            ALBUM_SELECT
        ))?;
        let albums = stmt
            .query_map(params![artist_id], Self::row_to_album)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }

    fn upsert_artist(&self, id: &str, name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO artists (id, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![id, name, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn upsert_album(&self, id: &str, title: &str, artist_id: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO albums (id, title, artist_id, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, artist_id = excluded.artist_id",
            params![id, title, artist_id, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }
}
