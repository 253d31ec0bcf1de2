//! HTTP Middleware
//!
//! Every error response passes through the error boundary on its way out.
//! Outside production the body gains a `stack` field with the error's debug
//! detail.

use crate::error::{ApiError, ErrorReport};
use crate::state::AppState;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::CorsLayer;

/// Finish error responses produced by handlers, extractors and the fallback
pub async fn error_boundary(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let status = response.status();

    if status.is_server_error() {
        tracing::error!(%method, %path, status = status.as_u16(), "{}", report.stack);
    } else {
        tracing::debug!(%method, %path, status = status.as_u16(), "{}", report.message);
    }

    if state.environment.is_production() {
        return response;
    }

    report.render(status, true)
}

/// Credentialed CORS for a single frontend origin; the session cookie is
/// only sent cross-origin when credentials are allowed.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ApiError> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|_| ApiError::Config(format!("CORS_ORIGIN is not a valid origin: {origin}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]))
}
