//! Cookie transport for session tokens.
//!
//! The token lives in an HttpOnly cookie so page scripts can never read it.
//! Logout only overwrites the cookie; there is no server-side session to
//! invalidate.

use crate::config::AuthConfig;
use crate::token::IssuedToken;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

pub struct SessionCarrier {
    cookie_name: String,
    secure: bool,
    max_age: time::Duration,
}

impl SessionCarrier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            secure: config.cookie_secure,
            max_age: time::Duration::seconds(config.token_expiration),
        }
    }

    /// Set the session cookie, expiring together with the token
    pub fn attach(&self, jar: CookieJar, issued: &IssuedToken) -> CookieJar {
        let mut cookie = Cookie::build((self.cookie_name.clone(), issued.token.clone()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(self.max_age)
            .build();

        match OffsetDateTime::from_unix_timestamp(issued.expires_at.timestamp()) {
            Ok(expires) => cookie.set_expires(expires),
            Err(e) => tracing::warn!("Token expiry out of cookie range: {:?}", e),
        }

        jar.add(cookie)
    }

    /// Overwrite the session cookie with an empty, already expired value
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let cookie = Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build();

        jar.add(cookie)
    }

    /// Token carried by the request, if any. An empty cookie counts as none.
    pub fn token(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }
}
