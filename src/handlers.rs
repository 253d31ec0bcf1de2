//! User HTTP Handlers
//!
//! REST endpoints under `/api/users`, the readiness probe and the 404
//! fallback.

use crate::error::ApiError;
use crate::extractors::{CurrentUser, Payload};
use crate::middleware;
use crate::models::*;
use crate::state::AppState;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tower_http::trace::TraceLayer;

// ============================================
// Route Builder
// ============================================

/// Create the application router
pub fn create_routes(state: AppState) -> Router {
    let users = Router::new()
        .route("/", post(register))
        .route("/auth", post(authenticate))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).put(update_profile));

    Router::new()
        .route("/", get(ready))
        .nest("/api/users", users)
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::error_boundary,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /
pub async fn ready() -> &'static str {
    "Server is ready"
}

/// Any unmatched route
pub async fn not_found(uri: Uri) -> ApiError {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    ApiError::RouteNotFound(target.to_string())
}

// ============================================
// Registration
// ============================================

/// POST /api/users
///
/// Register a new user and start their session
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(req): Payload<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<PublicUser>), ApiError> {
    let (user, issued) = state.auth.register(req).await?;
    let jar = state.auth.session().attach(jar, &issued);

    Ok((StatusCode::CREATED, jar, Json(user)))
}

// ============================================
// Login / Logout
// ============================================

/// POST /api/users/auth
///
/// Authenticate with email and password and start a session
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(req): Payload<AuthRequest>,
) -> Result<(CookieJar, Json<PublicUser>), ApiError> {
    let (user, issued) = state.auth.authenticate(req).await?;
    let jar = state.auth.session().attach(jar, &issued);

    Ok((jar, Json(user)))
}

/// POST /api/users/logout
///
/// Clear the session cookie. Always succeeds, with or without a session.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = state.auth.session().clear(jar);

    (jar, Json(MessageResponse::new("User logged out")))
}

// ============================================
// Profile
// ============================================

/// GET /api/users/profile
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user)
}

/// PUT /api/users/profile
///
/// Update name, email and/or password of the signed-in user
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Payload(req): Payload<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let updated = state.auth.update_profile(user.id, req).await?;

    Ok(Json(updated))
}
