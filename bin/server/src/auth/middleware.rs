//! Authentication extractors for Axum.
//!
//! The signed session cookie carries the authenticated identity; these
//! extractors are the authorization gate in front of `/session/` and the
//! tenant database proxy. A rejected request is answered here and never
//! reaches the proxied backend.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::Key;
use axum_extra::extract::SignedCookieJar;
use keygate_core::{Identity, Origin};
use serde_json::json;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session";

/// Extractor for requiring an authenticated identity.
///
/// The cookie signature is checked by the jar; a missing, unsigned, or
/// tampered cookie all read as anonymous.
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection::InternalError)?;

        let cookie = jar
            .get(SESSION_COOKIE)
            .ok_or(AuthRejection::Unauthorised)?;

        let identity = cookie.value();
        if identity.is_empty() {
            return Err(AuthRejection::Unauthorised);
        }

        Ok(RequireAuth(Identity::from(identity)))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    Unauthorised,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorised => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": true, "reason": "unauthorised"})),
            )
                .into_response(),
            Self::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": true})),
            )
                .into_response(),
        }
    }
}

/// Reads the requesting application's origin from the request headers.
///
/// Requests without an `Origin` header (or with a non-UTF-8 value) scope
/// to the empty origin, which is itself a valid tenant namespace.
#[must_use]
pub fn origin_from_headers(headers: &HeaderMap) -> Origin {
    headers
        .get(axum::http::header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(Origin::from)
        .unwrap_or_else(|| Origin::from(""))
}
