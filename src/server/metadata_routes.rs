//! Manual enrichment routes.
//!
//! - `POST /artists/{id}/enrich`
//! - `POST /albums/{id}/enrich`
//! - `POST /artists/{id}/albums/enrich`
//!
//! Provider failures still produce 200 with the errors listed in the body.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::enrichment::{EnrichmentError, EnrichmentResult, EnrichmentService};
use crate::server::state::ServerState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistEnrichResponse {
    pub success: bool,
    pub artist_id: String,
    pub bio_updated: bool,
    pub images_updated: bool,
    pub errors: Vec<String>,
    /// Milliseconds.
    pub duration: u64,
}

impl From<EnrichmentResult> for ArtistEnrichResponse {
    fn from(result: EnrichmentResult) -> Self {
        Self {
            success: result.errors.is_empty(),
            artist_id: result.entity_id,
            bio_updated: result.bio_updated,
            images_updated: result.images_updated,
            errors: result.errors,
            duration: result.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumEnrichResponse {
    pub success: bool,
    pub album_id: String,
    pub cover_updated: bool,
    pub errors: Vec<String>,
    pub duration: u64,
}

impl From<EnrichmentResult> for AlbumEnrichResponse {
    fn from(result: EnrichmentResult) -> Self {
        Self {
            success: result.errors.is_empty(),
            album_id: result.entity_id,
            cover_updated: result.cover_updated,
            errors: result.errors,
            duration: result.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn enrichment_error_response(err: EnrichmentError) -> Response {
    match err {
        EnrichmentError::EntityNotFound { .. } => {
            debug!("{}", err);
            error_response(StatusCode::NOT_FOUND, err.to_string())
        }
        EnrichmentError::Store { .. } => {
            error!("{}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn enrich_artist(
    State(service): State<EnrichmentService>,
    Path(id): Path<String>,
    Query(query): Query<EnrichQuery>,
) -> Response {
    match service.enrich_artist(&id, query.force_refresh).await {
        Ok(result) => Json(ArtistEnrichResponse::from(result)).into_response(),
        Err(err) => enrichment_error_response(err),
    }
}

async fn enrich_album(
    State(service): State<EnrichmentService>,
    Path(id): Path<String>,
    Query(query): Query<EnrichQuery>,
) -> Response {
    match service.enrich_album(&id, query.force_refresh).await {
        Ok(result) => Json(AlbumEnrichResponse::from(result)).into_response(),
        Err(err) => enrichment_error_response(err),
    }
}

async fn enrich_artist_albums(
    State(service): State<EnrichmentService>,
    Path(id): Path<String>,
    Query(query): Query<EnrichQuery>,
) -> Response {
    match service.enrich_artist_albums(&id, query.force_refresh).await {
        Ok(batch) => Json(batch).into_response(),
        Err(err) => enrichment_error_response(err),
    }
}

pub fn metadata_routes() -> Router<ServerState> {
    Router::new()
        .route("/artists/{id}/enrich", post(enrich_artist))
        .route("/albums/{id}/enrich", post(enrich_album))
        .route("/artists/{id}/albums/enrich", post(enrich_artist_albums))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EntityType;

    #[test]
    fn artist_response_uses_camel_case() {
        let mut result = EnrichmentResult::new(EntityType::Artist, "artist-123");
        result.bio_updated = true;
        result.duration_ms = 42;

        let json = serde_json::to_value(ArtistEnrichResponse::from(result)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["artistId"], "artist-123");
        assert_eq!(json["bioUpdated"], true);
        assert_eq!(json["imagesUpdated"], false);
        assert_eq!(json["duration"], 42);
        assert!(json["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn errors_clear_success_flag() {
        let mut result = EnrichmentResult::new(EntityType::Album, "album-1");
        result.errors.push("coverartarchive: not found".to_string());

        let response = AlbumEnrichResponse::from(result);

        assert!(!response.success);
        assert_eq!(response.album_id, "album-1");
        assert!(!response.cover_updated);
    }

    #[test]
    fn canonical_id_error_clears_success_of_updated_artist() {
        let mut result = EnrichmentResult::new(EntityType::Artist, "artist-1");
        result.bio_updated = true;
        result.images_updated = true;
        result.errors.push("musicbrainz: no canonical_id found".to_string());

        let response = ArtistEnrichResponse::from(result);

        assert!(!response.success);
        assert!(response.bio_updated);
        assert!(response.images_updated);
        assert_eq!(response.errors.len(), 1);
    }
}
