//! Router assembly.

use crate::auth::{routes, AppState};
use crate::proxy;
use axum::{
    http::{header, Method},
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds the gateway router over shared state.
///
/// The CORS layer mirrors the request origin and allows credentials:
/// the clients of this gateway are browser applications on *other*
/// origins, authenticating with the session cookie.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH]);

    Router::new()
        .route("/login/", post(routes::login))
        .route("/validate/", get(routes::validate).post(routes::validate))
        .route(
            "/session/",
            get(routes::session_read).post(routes::session_write),
        )
        .route("/logout/", post(routes::logout))
        .route("/db/", any(proxy::tenant_db))
        .route("/db/{*rest}", any(proxy::tenant_db))
        .layer(cors)
        .with_state(state)
}
