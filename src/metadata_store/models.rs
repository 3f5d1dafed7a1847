use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored metadata value together with the moment it was last written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    /// Canonical MusicBrainz artist id.
    pub mbid: Option<FieldValue>,
    pub bio: Option<FieldValue>,
    /// Local path of the materialized artist image, relative to the media root.
    pub image: Option<FieldValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    pub id: String,
    pub title: String,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    /// Canonical MusicBrainz release-group id.
    pub mbid: Option<FieldValue>,
    /// Local path of the materialized cover, relative to the media root.
    pub cover: Option<FieldValue>,
    pub created_at: DateTime<Utc>,
}

/// Writable enrichment fields of an artist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtistField {
    Mbid,
    Bio,
    Image,
}

impl ArtistField {
    /// (value column, timestamp column)
    pub(crate) fn columns(&self) -> (&'static str, &'static str) {
        match self {
            ArtistField::Mbid => ("mbid", "mbid_updated_at"),
            ArtistField::Bio => ("bio", "bio_updated_at"),
            ArtistField::Image => ("image_path", "image_updated_at"),
        }
    }
}

/// Writable enrichment fields of an album.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumField {
    Mbid,
    Cover,
}

impl AlbumField {
    pub(crate) fn columns(&self) -> (&'static str, &'static str) {
        match self {
            AlbumField::Mbid => ("mbid", "mbid_updated_at"),
            AlbumField::Cover => ("cover_path", "cover_updated_at"),
        }
    }
}
