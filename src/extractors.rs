//! Request Extractors
//!
//! `CurrentUser` is the access gate for protected routes: a handler that
//! takes it only runs once the session cookie has resolved to a stored user.

use crate::error::ApiError;
use crate::models::PublicUser;
use crate::state::AppState;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use serde::de::DeserializeOwned;

/// Authenticated user resolved from the session cookie
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = state.auth.session().token(&jar);

        let user = state.auth.resolve_session(token.as_deref()).await?;

        Ok(CurrentUser(user))
    }
}

/// Request body sent either as JSON or as an urlencoded form, picked by
/// `Content-Type`. Rejections render like every other API error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state).await?;
            Ok(Payload(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await?;
            Ok(Payload(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{test_auth_config, Environment};
    use crate::models::{AuthRequest, RegisterRequest};
    use crate::service::AuthService;
    use crate::store::MemoryUserStore;
    use axum::http::{header, Request};
    use std::sync::Arc;

    fn state() -> AppState {
        let store = Arc::new(MemoryUserStore::new());
        let auth = AuthService::new(store, test_auth_config()).unwrap();
        AppState::new(auth, Environment::Test)
    }

    async fn extract(state: &AppState, cookie: Option<&str>) -> Result<CurrentUser, ApiError> {
        let mut builder = Request::builder().uri("/api/users/profile");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn no_cookie_is_missing_token() {
        let err = extract(&state(), None).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));

        let err = extract(&state(), Some("jwt=")).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
    }

    #[tokio::test]
    async fn bad_cookie_is_invalid_token() {
        let err = extract(&state(), Some("jwt=garbage")).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn payload_reads_json_and_forms() {
        let req = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(r#"{"email":"a@x.com","password":"pw"}"#))
            .unwrap();
        let Payload(parsed) = Payload::<AuthRequest>::from_request(req, &()).await.unwrap();
        assert_eq!(parsed.email, "a@x.com");

        let req = Request::builder()
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(axum::body::Body::from("email=a%40x.com&password=pw"))
            .unwrap();
        let Payload(parsed) = Payload::<AuthRequest>::from_request(req, &()).await.unwrap();
        assert_eq!(parsed.email, "a@x.com");
        assert_eq!(parsed.password, "pw");
    }

    #[tokio::test]
    async fn payload_without_content_type_is_bad_request() {
        let req = Request::builder()
            .body(axum::body::Body::from("email=a%40x.com"))
            .unwrap();
        let err = Payload::<AuthRequest>::from_request(req, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn valid_cookie_resolves_user() {
        let state = state();
        let (user, issued) = state
            .auth
            .register(RegisterRequest {
                name: "A".into(),
                email: "a@x.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();

        let cookie = format!("jwt={}", issued.token);
        let CurrentUser(resolved) = extract(&state, Some(&cookie)).await.unwrap();
        assert_eq!(resolved, user);
    }
}
