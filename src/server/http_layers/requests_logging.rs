//! Request logging middleware

use super::super::state::ServerState;
use crate::server::metrics::record_http_request;
use axum::extract::State;
use axum::{
    body::Body,
    http::{header::HeaderMap, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    Path,
    Headers,
    Body,
}

impl Default for RequestsLoggingLevel {
    fn default() -> Self {
        Self::Path
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get("content-length")
        .ok_or("Content-length not set.")?
        .to_str()
        .map_err(|_| "Could not get Content-length string value.")?
        .parse::<usize>()
        .map_err(|_| "Could not parse Content-length numeric value.")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} Headers:", label);
    for (name, value) in headers.iter() {
        info!("    {:?}: {:?}", name, value);
    }
}

/// Logs a small body and hands back an equivalent one, since reading it
/// consumes the original.
async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, axum::Error> {
    match content_length(headers) {
        Err(reason) => {
            info!("  {} Body: {}", label, reason);
            Ok(body)
        }
        Ok(size) if size < MAX_LOGGABLE_BODY_LENGTH => {
            let bytes = axum::body::to_bytes(body, size).await?;
            info!("  {} Body:\n{}", label, String::from_utf8_lossy(&bytes));
            Ok(Body::from(bytes))
        }
        Ok(size) => {
            info!("  {} Body: Too big to log ({} bytes)", label, size);
            Ok(body)
        }
    }
}

/// Collapse entity ids and agent names so the metrics label set stays small.
pub(crate) fn endpoint_label(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let label = match previous {
                "artists" | "albums" if segment != "enrich" => "{id}",
                "agents" => "{name}",
                _ => segment,
            };
            previous = segment;
            label
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn internal_error() -> Response<Body> {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, request.uri());
    }

    let (parts, body) = request.into_parts();
    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", &parts.headers);
    }
    let body = if level >= RequestsLoggingLevel::Body {
        match log_body("Req", &parts.headers, body).await {
            Ok(body) => body,
            Err(err) => {
                error!("Failed to read request body: {:?}", err);
                return internal_error();
            }
        }
    } else {
        body
    };

    let (parts, body) = next.run(Request::from_parts(parts, body)).await.into_parts();
    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", &parts.headers);
    }
    let body = if level >= RequestsLoggingLevel::Body {
        match log_body("Resp", &parts.headers, body).await {
            Ok(body) => body,
            Err(err) => {
                error!("Failed to read response body: {:?}", err);
                return internal_error();
            }
        }
    } else {
        body
    };

    let status = parts.status.as_u16();
    let duration = start.elapsed();
    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status, duration.as_millis());
    }
    record_http_request(&method, &endpoint_label(&path), status, duration);

    Response::from_parts(parts, body)
}
