//! Request forwarding for routed paths

use std::sync::Arc;

use axum::{
    Json,
    body::{Body, HttpBody},
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::ProxyState;

/// Headers that describe a single connection and are never forwarded
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forward a request on a routed path to its upstream
pub(super) async fn forward(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ForwardError> {
    let mut target = state
        .routes
        .resolve(uri.path())
        .ok_or(ForwardError::NoRoute)?;
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    tracing::debug!(%method, path = uri.path(), %target, "forwarding request");

    let mut request = state
        .client
        .request(method, &target)
        .headers(end_to_end(&headers));
    // Bodies are streamed through unbuffered in both directions
    if body.size_hint().exact() != Some(0) {
        request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| {
            tracing::error!(%target, error = %e, "upstream request failed");
            ForwardError::Upstream(e.to_string())
        })?;

    let status = upstream.status();
    let response_headers = end_to_end(upstream.headers());

    tracing::debug!(%target, %status, "upstream responded");

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// Copy headers, leaving out hop-by-hop ones and the body length
fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(*name) && *name != header::CONTENT_LENGTH)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Forwarding errors
#[derive(Debug)]
pub enum ForwardError {
    NoRoute,
    Upstream(String),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NoRoute => (StatusCode::NOT_FOUND, "no_route", "no route for path".to_string()),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_unavailable", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
