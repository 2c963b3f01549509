//! Routes for login, validation, session access, and logout.
//!
//! Validation failures answer `200` with `{"error": true}` rather than a
//! 4xx status: the browser clients this gateway serves branch on the
//! body, and the generic shape is what keeps "no such token" and "wrong
//! token" indistinguishable on the wire.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::SignedCookieJar;
use keygate_access::{AuthError, SessionView};
use keygate_core::{Identity, Origin};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{
    middleware::{origin_from_headers, RequireAuth, SESSION_COOKIE},
    AppState,
};

/// Query parameters of the validation URL delivered out-of-band.
#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    uid: String,
    token: String,
    host: String,
}

/// Handles a login request: issues and delivers a single-use token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(details): Json<Map<String, Value>>,
) -> Result<Json<Value>, GatewayError> {
    let origin = origin_from_headers(&headers);
    match state.broker.request_login(details, origin).await {
        Ok(()) => Ok(Json(json!({"ok": true}))),
        Err(AuthError::MissingIdentity) => Err(GatewayError::BadRequest),
        Err(e) => Err(GatewayError::Internal(e.to_string())),
    }
}

/// Exchanges a delivered token for an authenticated session cookie.
///
/// GET requests (the user clicking the delivered link) redirect to the
/// requesting application; POST requests get the result as JSON.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(query): Query<ValidateQuery>,
    jar: SignedCookieJar,
) -> Result<Response, GatewayError> {
    let identity = Identity::from(query.uid);
    let origin = Origin::from(query.host);

    match state
        .broker
        .validate_token(&identity, &origin, &query.token)
        .await
    {
        Ok(origin) => {
            let cookie = Cookie::build((SESSION_COOKIE, identity.as_str().to_string()))
                .path("/")
                .http_only(true)
                .secure(state.cookie.secure)
                .same_site(SameSite::Lax)
                .max_age(TimeDuration::days(state.cookie.max_age_days));
            let jar = jar.add(cookie);

            if method == Method::GET {
                Ok((jar, Redirect::to(origin.as_str())).into_response())
            } else {
                Ok((jar, Json(json!({"ok": true, "origin": origin}))).into_response())
            }
        }
        Err(AuthError::Verification) => Ok(Json(json!({"error": true})).into_response()),
        Err(e) => Err(GatewayError::Internal(e.to_string())),
    }
}

/// Returns the authenticated tenant's public session view.
pub async fn session_read(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    headers: HeaderMap,
) -> Result<Json<Value>, GatewayError> {
    let origin = origin_from_headers(&headers);
    let view = state
        .broker
        .read_session(&identity, &origin)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(Json(session_body(view)))
}

/// Merges the request body into the tenant's session and returns the
/// merged public view.
pub async fn session_write(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    headers: HeaderMap,
    Json(attrs): Json<Map<String, Value>>,
) -> Result<Json<Value>, GatewayError> {
    let origin = origin_from_headers(&headers);
    let view = state
        .broker
        .write_session(&identity, &origin, attrs)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(Json(session_body(view)))
}

/// Logs out by clearing the session cookie.
///
/// The tenant's session document is deliberately untouched: a later
/// login for the same (identity, origin) finds its attributes intact.
pub async fn logout(jar: SignedCookieJar) -> impl IntoResponse {
    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (jar.add(remove_session), Json(json!({"ok": true})))
}

/// Builds the public session body: attributes first, then the envelope
/// fields, so a caller-supplied attribute can never mask them.
fn session_body(view: SessionView) -> Value {
    let mut body = view.attrs.into_map();
    body.insert("ok".to_string(), json!(true));
    body.insert("user".to_string(), json!(view.identity));
    body.insert("db".to_string(), json!(view.database_url));
    Value::Object(body)
}

/// Handler-level errors.
#[derive(Debug)]
pub enum GatewayError {
    BadRequest,
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": true}))).into_response()
            }
            Self::Internal(details) => {
                tracing::error!(details, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": true})),
                )
                    .into_response()
            }
        }
    }
}
